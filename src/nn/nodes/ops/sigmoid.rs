use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// Sigmoid激活函数节点
///
/// forward: y = 1 / (1 + e^(-x))
/// backward: dy/dx = y(1 - y)
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sigmoid;

impl TraitNode for Sigmoid {
    fn op_name(&self) -> &'static str {
        "Sigmoid"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        Ok(parents[0].mapv(|x| 1.0 / (1.0 + (-x).exp())))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(upstream * &value.mapv(|y| y * (1.0 - y)))
    }
}
