use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, broadcast_shape, broadcast_to, expect_parents, sum_to_shape};

/// 逐元素乘法（支持广播，如 [batch, hidden] ⊙ [batch, 1] 的掩码）
///
/// forward: c = a ⊙ b
/// backward: ∂L/∂a = g ⊙ b，∂L/∂b = g ⊙ a（再按广播维求和）
#[derive(Debug, Clone, Copy)]
pub(crate) struct Multiply;

impl TraitNode for Multiply {
    fn op_name(&self) -> &'static str {
        "Multiply"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 2)?;
        let shape = broadcast_shape(self.op_name(), parents[0].shape(), parents[1].shape())?;
        let a = broadcast_to(self.op_name(), parents[0], &shape)?;
        let b = broadcast_to(self.op_name(), parents[1], &shape)?;
        Ok(&a * &b)
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let other = broadcast_to(self.op_name(), parents[1 - index], upstream.shape())?;
        Ok(sum_to_shape(upstream * &other, parents[index].shape()))
    }
}
