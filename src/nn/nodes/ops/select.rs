use ndarray::{ArrayD, Axis};

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 取指定维上的第`index`个切片并去掉该维，如从 [seq_len, batch, hidden] 取出第t步
#[derive(Debug, Clone, Copy)]
pub(crate) struct Select {
    axis: usize,
    index: usize,
}

impl Select {
    pub(crate) const fn new(axis: usize, index: usize) -> Self {
        Self { axis, index }
    }
}

impl TraitNode for Select {
    fn op_name(&self) -> &'static str {
        "Select"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        let x = parents[0];
        if self.axis >= x.ndim() || self.index >= x.shape()[self.axis] {
            return Err(GraphError::InvalidOperation(format!(
                "Select的位置(维{}, 第{}个)超出输入形状{:?}",
                self.axis,
                self.index,
                x.shape()
            )));
        }
        Ok(x.index_axis(Axis(self.axis), self.index).to_owned())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let mut grad = ArrayD::zeros(parents[0].raw_dim());
        grad.index_axis_mut(Axis(self.axis), self.index)
            .assign(upstream);
        Ok(grad)
    }
}
