/*
 * @Author       : 老董
 * @Date         : 2026-02-26
 * @Description  : 计算图节点：节点 trait、节点类型枚举，以及各算子共用的广播/变形工具
 *
 * 每个算子只回答两个问题：
 * - 给定父节点的值，本节点的值是多少（`calc_value`）；
 * - 给定本节点收到的上游梯度，传给第`index`个父节点的梯度是多少（`calc_grad_to_parent`）。
 * 拓扑顺序、梯度累加等由`Graph`负责。
 */

mod ops;
mod variable;

pub(crate) use ops::*;
pub(crate) use variable::Variable;

use enum_dispatch::enum_dispatch;
use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn};

use crate::errors::GraphError;

/// 节点在所属图中的编号。节点总是在其父节点之后创建，因此编号顺序即为一个拓扑序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[enum_dispatch]
pub(crate) trait TraitNode {
    fn op_name(&self) -> &'static str;

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError>;

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&ArrayD<f32>],
        value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError>;
}

#[enum_dispatch(TraitNode)]
pub(crate) enum NodeType {
    Variable(Variable),
    Add(Add),
    Multiply(Multiply),
    ScalarMultiply(ScalarMultiply),
    MatMul(MatMul),
    Tanh(Tanh),
    Sigmoid(Sigmoid),
    Ln(Ln),
    Concat(Concat),
    Stack(Stack),
    Select(Select),
    Gather(Gather),
    Reshape(Reshape),
    Transpose(Transpose),
    MaskedSoftmax(MaskedSoftmax),
    Sum(Sum),
}

/// 图中保存的一个节点：算子、父节点、前向值，以及反向传播时累加的梯度
pub(crate) struct NodeHandle {
    pub(crate) node: NodeType,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) value: ArrayD<f32>,
    pub(crate) grad: Option<ArrayD<f32>>,
    /// 是否有可训练参数位于其上游；为false的节点在反向传播时直接跳过
    pub(crate) requires_grad: bool,
}

/*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 广播 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
/// 按numpy规则（尾部对齐、长度为1的维可扩展）求两个形状广播后的形状
pub(crate) fn broadcast_shape(
    op: &'static str,
    left: &[usize],
    right: &[usize],
) -> Result<Vec<usize>, GraphError> {
    let ndim = left.len().max(right.len());
    let dim_at = |shape: &[usize], axis: usize| {
        let offset = ndim - shape.len();
        if axis < offset { 1 } else { shape[axis - offset] }
    };
    (0..ndim)
        .map(|axis| {
            let (l, r) = (dim_at(left, axis), dim_at(right, axis));
            if l == r || r == 1 {
                Ok(l)
            } else if l == 1 {
                Ok(r)
            } else {
                Err(GraphError::ShapeMismatch {
                    op,
                    left: left.to_vec(),
                    right: right.to_vec(),
                })
            }
        })
        .collect()
}

pub(crate) fn broadcast_to<'a>(
    op: &'static str,
    x: &'a ArrayD<f32>,
    shape: &[usize],
) -> Result<ArrayViewD<'a, f32>, GraphError> {
    x.broadcast(shape).ok_or_else(|| GraphError::ShapeMismatch {
        op,
        left: x.shape().to_vec(),
        right: shape.to_vec(),
    })
}

/// 把广播后形状上的梯度按广播时扩展过的维求和，还原回`shape`
pub(crate) fn sum_to_shape(mut grad: ArrayD<f32>, shape: &[usize]) -> ArrayD<f32> {
    while grad.ndim() > shape.len() {
        grad = grad.sum_axis(Axis(0));
    }
    for (axis, &dim) in shape.iter().enumerate() {
        if dim == 1 && grad.shape()[axis] != 1 {
            grad = grad.sum_axis(Axis(axis)).insert_axis(Axis(axis));
        }
    }
    grad
}
/*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 广播 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

/// 按逻辑顺序重排为新形状（与内存布局无关）
pub(crate) fn reshaped(x: &ArrayD<f32>, shape: &[usize]) -> Result<ArrayD<f32>, GraphError> {
    ArrayD::from_shape_vec(IxDyn(shape), x.iter().copied().collect()).map_err(|_| {
        GraphError::ShapeMismatch {
            op: "Reshape",
            left: x.shape().to_vec(),
            right: shape.to_vec(),
        }
    })
}

/// 把除最后一维以外的维合并，得到 [rows, last_dim] 的矩阵
pub(crate) fn flatten_rows(op: &'static str, x: &ArrayD<f32>) -> Result<Array2<f32>, GraphError> {
    let cols = match x.shape().last() {
        Some(&cols) if cols > 0 && x.ndim() >= 2 => cols,
        _ => {
            return Err(GraphError::InvalidOperation(format!(
                "{op}节点的输入至少需要2阶且最后一维非空，实际形状为{:?}",
                x.shape()
            )));
        }
    };
    Array2::from_shape_vec((x.len() / cols, cols), x.iter().copied().collect()).map_err(|_| {
        GraphError::ComputationError(format!("{op}节点无法展开形状{:?}", x.shape()))
    })
}

/// 检查父节点个数，供各算子的`calc_value`开头调用
pub(crate) fn expect_parents(
    op: &'static str,
    parents: &[&ArrayD<f32>],
    count: usize,
) -> Result<(), GraphError> {
    if parents.len() == count {
        Ok(())
    } else {
        Err(GraphError::InvalidOperation(format!(
            "{op}节点需要{count}个父节点，实际为{}个",
            parents.len()
        )))
    }
}
