use ndarray::{ArrayD, ArrayViewD, Axis, stack};

use crate::errors::GraphError;
use crate::nn::nodes::TraitNode;

/// 在新插入的维上堆叠形状相同的父节点，如把逐时间步的 [batch, hidden] 堆成 [seq_len, batch, hidden]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stack {
    axis: usize,
}

impl Stack {
    pub(crate) const fn new(axis: usize) -> Self {
        Self { axis }
    }
}

impl TraitNode for Stack {
    fn op_name(&self) -> &'static str {
        "Stack"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        let first = parents
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("Stack节点至少需要1个父节点".to_string()))?;
        if self.axis > first.ndim() {
            return Err(GraphError::InvalidOperation(format!(
                "Stack的维{}超出输入阶数{}",
                self.axis,
                first.ndim()
            )));
        }
        let views: Vec<ArrayViewD<f32>> = parents.iter().map(|p| p.view()).collect();
        stack(Axis(self.axis), &views).map_err(|_| GraphError::ShapeMismatch {
            op: self.op_name(),
            left: first.shape().to_vec(),
            right: parents.last().map(|p| p.shape().to_vec()).unwrap_or_default(),
        })
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        _parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Ok(upstream.index_axis(Axis(self.axis), index).to_owned())
    }
}
