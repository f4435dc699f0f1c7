use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 反转全部维的顺序（二维时即矩阵转置）
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transpose;

impl TraitNode for Transpose {
    fn op_name(&self) -> &'static str {
        "Transpose"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        Ok(parents[0].t().as_standard_layout().into_owned())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(upstream.t().as_standard_layout().into_owned())
    }
}
