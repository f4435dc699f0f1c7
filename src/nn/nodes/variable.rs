use ndarray::ArrayD;

use super::TraitNode;
use crate::errors::GraphError;

/// 叶子节点：输入或参数。值在创建时给定，没有父节点
#[derive(Debug, Clone, Copy)]
pub(crate) struct Variable {
    trainable: bool,
}

impl Variable {
    pub(crate) const fn new(trainable: bool) -> Self {
        Self { trainable }
    }

    pub(crate) const fn is_trainable(&self) -> bool {
        self.trainable
    }
}

impl TraitNode for Variable {
    fn op_name(&self) -> &'static str {
        "Variable"
    }

    fn calc_value(&self, _parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        Err(GraphError::InvalidOperation(
            "叶子节点的值只能在创建时给定".to_string(),
        ))
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        _upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        Err(GraphError::InvalidOperation("叶子节点没有父节点".to_string()))
    }
}
