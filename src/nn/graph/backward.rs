/*
 * @Author       : 老董
 * @Date         : 2026-02-26
 * @Description  : GraphInner 反向传播（VJP）
 */

use ndarray::ArrayD;

use super::GraphInner;
use crate::errors::GraphError;
use crate::nn::nodes::{NodeId, TraitNode};

impl GraphInner {
    /// 从标量损失出发反向传播，返回损失值。
    /// 节点编号即拓扑序，所以逆序遍历一次即可；传播完毕后只有叶子节点保留梯度
    pub(crate) fn backward(&mut self, loss: NodeId) -> Result<f32, GraphError> {
        let loss_handle = self.node(loss)?;
        if loss_handle.value.len() != 1 {
            return Err(GraphError::InvalidOperation(format!(
                "反向传播要求损失为标量，但得到形状{:?}",
                loss_handle.value.shape()
            )));
        }
        let loss_value = loss_handle.value.iter().next().copied().unwrap_or_default();
        let seed = ArrayD::ones(loss_handle.value.raw_dim());

        for handle in &mut self.nodes {
            handle.grad = None;
        }
        self.nodes[loss.0].grad = Some(seed);

        for id in (0..=loss.0).rev() {
            let parent_grads = self.grads_to_parents(NodeId(id))?;
            if !self.nodes[id].parents.is_empty() {
                self.nodes[id].grad = None;
            }
            for (parent, grad) in parent_grads {
                let target = &mut self.nodes[parent.0];
                if grad.shape() != target.value.shape() {
                    return Err(GraphError::ComputationError(format!(
                        "节点{}收到的梯度形状{:?}与其值的形状{:?}不符",
                        parent.0,
                        grad.shape(),
                        target.value.shape()
                    )));
                }
                match &mut target.grad {
                    Some(accumulated) => *accumulated += &grad,
                    None => target.grad = Some(grad),
                }
            }
        }
        Ok(loss_value)
    }

    fn grads_to_parents(&self, id: NodeId) -> Result<Vec<(NodeId, ArrayD<f32>)>, GraphError> {
        let handle = self.node(id)?;
        let Some(upstream) = handle.grad.as_ref() else {
            return Ok(Vec::new());
        };
        if !handle.requires_grad || handle.parents.is_empty() {
            return Ok(Vec::new());
        }
        let parents = handle
            .parents
            .iter()
            .map(|&p| self.node(p))
            .collect::<Result<Vec<_>, _>>()?;
        let values: Vec<&ArrayD<f32>> = parents.iter().map(|p| &p.value).collect();

        let mut grads = Vec::with_capacity(parents.len());
        for (index, (parent_id, parent)) in handle.parents.iter().zip(&parents).enumerate() {
            if parent.requires_grad {
                let grad = handle
                    .node
                    .calc_grad_to_parent(index, &values, &handle.value, upstream)?;
                grads.push((*parent_id, grad));
            }
        }
        Ok(grads)
    }
}
