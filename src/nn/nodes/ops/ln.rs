use ndarray::{ArrayD, Zip};

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 自然对数，输入先截断到`f32::MIN_POSITIVE`，概率下溢时结果仍有限
///
/// forward: y = ln(max(x, ε))
/// backward: dy/dx = 1/x（x < ε 处被截断，梯度为0）
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ln;

impl TraitNode for Ln {
    fn op_name(&self) -> &'static str {
        "Ln"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        Ok(parents[0].mapv(|x| x.max(f32::MIN_POSITIVE).ln()))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(Zip::from(upstream)
            .and(parents[0])
            .map_collect(|&g, &x| if x < f32::MIN_POSITIVE { 0.0 } else { g / x }))
    }
}
