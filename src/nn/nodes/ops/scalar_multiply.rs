use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 乘以常数：c = k · a
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScalarMultiply {
    factor: f32,
}

impl ScalarMultiply {
    pub(crate) const fn new(factor: f32) -> Self {
        Self { factor }
    }
}

impl TraitNode for ScalarMultiply {
    fn op_name(&self) -> &'static str {
        "ScalarMultiply"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        Ok(parents[0] * self.factor)
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(upstream * self.factor)
    }
}
