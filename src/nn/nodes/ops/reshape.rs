use ndarray::ArrayD;

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents, reshaped};

/// 改变形状（元素个数与逻辑顺序不变）
#[derive(Debug, Clone)]
pub(crate) struct Reshape {
    shape: Vec<usize>,
}

impl Reshape {
    pub(crate) const fn new(shape: Vec<usize>) -> Self {
        Self { shape }
    }
}

impl TraitNode for Reshape {
    fn op_name(&self) -> &'static str {
        "Reshape"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        reshaped(parents[0], &self.shape)
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        reshaped(upstream, parents[0].shape())
    }
}
