use ndarray::{ArrayD, Axis, IxDyn};

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 求和：`axis`为`None`时对全部元素求和，结果为 [1, 1] 的标量；否则沿该维求和并去掉该维
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sum {
    axis: Option<usize>,
}

impl Sum {
    pub(crate) const fn new(axis: Option<usize>) -> Self {
        Self { axis }
    }
}

impl TraitNode for Sum {
    fn op_name(&self) -> &'static str {
        "Sum"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        let x = parents[0];
        match self.axis {
            None => Ok(ArrayD::from_elem(IxDyn(&[1, 1]), x.sum())),
            Some(axis) if axis < x.ndim() => Ok(x.sum_axis(Axis(axis))),
            Some(axis) => Err(GraphError::InvalidOperation(format!(
                "Sum的维{axis}超出输入阶数{}",
                x.ndim()
            ))),
        }
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let shape = parents[0].shape();
        let grad = match self.axis {
            None => ArrayD::from_elem(IxDyn(shape), upstream.sum()),
            Some(axis) => upstream
                .view()
                .insert_axis(Axis(axis))
                .broadcast(shape)
                .ok_or_else(|| GraphError::ComputationError("Sum的梯度无法广播回输入形状".to_string()))?
                .to_owned(),
        };
        Ok(grad)
    }
}
