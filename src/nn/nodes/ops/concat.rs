use ndarray::{ArrayD, ArrayViewD, Axis, Slice, concatenate};

use crate::errors::GraphError;
use crate::nn::nodes::TraitNode;

/// 沿指定维拼接任意个父节点
///
/// backward: 上游梯度按各父节点在该维上的宽度切回去
#[derive(Debug, Clone, Copy)]
pub(crate) struct Concat {
    axis: usize,
}

impl Concat {
    pub(crate) const fn new(axis: usize) -> Self {
        Self { axis }
    }
}

impl TraitNode for Concat {
    fn op_name(&self) -> &'static str {
        "Concat"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        let first = parents
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("Concat节点至少需要1个父节点".to_string()))?;
        let views: Vec<ArrayViewD<f32>> = parents.iter().map(|p| p.view()).collect();
        if self.axis >= first.ndim() {
            return Err(GraphError::InvalidOperation(format!(
                "Concat的维{}超出输入阶数{}",
                self.axis,
                first.ndim()
            )));
        }
        concatenate(Axis(self.axis), &views).map_err(|_| GraphError::ShapeMismatch {
            op: self.op_name(),
            left: first.shape().to_vec(),
            right: parents.last().map(|p| p.shape().to_vec()).unwrap_or_default(),
        })
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let offset: usize = parents[..index].iter().map(|p| p.shape()[self.axis]).sum();
        let width = parents[index].shape()[self.axis];
        Ok(upstream
            .slice_axis(Axis(self.axis), Slice::from(offset..offset + width))
            .to_owned())
    }
}
