use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// Tanh激活函数节点
///
/// forward: y = tanh(x)
/// backward: dy/dx = 1 - y²
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tanh;

impl TraitNode for Tanh {
    fn op_name(&self) -> &'static str {
        "Tanh"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        Ok(parents[0].mapv(f32::tanh))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(upstream * &value.mapv(|y| 1.0 - y * y))
    }
}
