/*
 * @Author       : 老董
 * @Date         : 2026-02-26
 * @Description  : Var - 计算图中节点的句柄，提供链式调用的算子
 *
 * ```ignore
 * let graph = Graph::new();
 * let x = graph.input(inputs);
 * let w = graph.parameter(&weights);
 * let y = x.matmul(&w)?.tanh()?;
 * let loss = y.sum()?;
 * loss.backward()?;
 * let grad = graph.grad_of(&weights);
 * ```
 */

use ndarray::{Array, ArrayD, Dimension};

use crate::errors::GraphError;
use crate::nn::Graph;
use crate::nn::nodes::{
    Add, Concat, Gather, Ln, MaskedSoftmax, MatMul, Multiply, NodeId, NodeType, Reshape,
    ScalarMultiply, Select, Sigmoid, Stack, Sum, Tanh, Transpose,
};

#[derive(Clone)]
pub struct Var {
    id: NodeId,
    graph: Graph,
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .finish()
    }
}

impl Var {
    pub(crate) const fn new(id: NodeId, graph: Graph) -> Self {
        Self { id, graph }
    }

    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 值与梯度 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    pub fn shape(&self) -> Vec<usize> {
        self.graph
            .inner()
            .node(self.id)
            .map(|handle| handle.value.shape().to_vec())
            .unwrap_or_default()
    }

    pub fn value(&self) -> Result<ArrayD<f32>, GraphError> {
        Ok(self.graph.inner().node(self.id)?.value.clone())
    }

    /// 以定阶数组取值，如`var.value_as::<Ix2>()`
    pub fn value_as<D: Dimension>(&self) -> Result<Array<f32, D>, GraphError> {
        let value = self.value()?;
        let shape = value.shape().to_vec();
        value.into_dimensionality::<D>().map_err(|_| {
            GraphError::InvalidOperation(format!("无法把形状{shape:?}转为所需的阶数"))
        })
    }

    /// 只含一个元素时返回该元素
    pub fn item(&self) -> Result<f32, GraphError> {
        let inner = self.graph.inner();
        let value = &inner.node(self.id)?.value;
        match value.len() {
            1 => value.iter().next().copied().ok_or_else(|| {
                GraphError::ComputationError("标量节点没有值".to_string())
            }),
            _ => Err(GraphError::InvalidOperation(format!(
                "形状为{:?}的节点不是标量",
                value.shape()
            ))),
        }
    }

    /// 反向传播后的梯度。只有叶子节点（输入、参数）保留梯度
    pub fn grad(&self) -> Option<ArrayD<f32>> {
        self.graph.inner().node(self.id).ok()?.grad.clone()
    }

    /// 以本节点为标量损失做反向传播，返回损失值
    pub fn backward(&self) -> Result<f32, GraphError> {
        self.graph.backward(self.id)
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 值与梯度 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    fn unary(&self, node: impl Into<NodeType>) -> Result<Var, GraphError> {
        self.graph.add_node(node.into(), &[self])
    }

    fn binary(&self, other: &Var, node: impl Into<NodeType>) -> Result<Var, GraphError> {
        self.graph.add_node(node.into(), &[self, other])
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 逐元素运算 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    /// 逐元素相加（可广播）
    pub fn add(&self, other: &Var) -> Result<Var, GraphError> {
        self.binary(other, Add)
    }

    /// 逐元素相乘（可广播）
    pub fn mul(&self, other: &Var) -> Result<Var, GraphError> {
        self.binary(other, Multiply)
    }

    pub fn scale(&self, factor: f32) -> Result<Var, GraphError> {
        self.unary(ScalarMultiply::new(factor))
    }

    pub fn tanh(&self) -> Result<Var, GraphError> {
        self.unary(Tanh)
    }

    pub fn sigmoid(&self) -> Result<Var, GraphError> {
        self.unary(Sigmoid)
    }

    /// 截断在`f32::MIN_POSITIVE`处的自然对数
    pub fn ln(&self) -> Result<Var, GraphError> {
        self.unary(Ln)
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 逐元素运算 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    /// [..., k] @ [k, n] -> [..., n]
    pub fn matmul(&self, other: &Var) -> Result<Var, GraphError> {
        self.binary(other, MatMul)
    }

    /// 按有效长度做softmax：输入 [seq_len, batch]
    pub fn masked_softmax(&self, lengths: &[usize]) -> Result<Var, GraphError> {
        self.unary(MaskedSoftmax::new(lengths.to_vec()))
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 形状 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    pub fn reshape(&self, shape: &[usize]) -> Result<Var, GraphError> {
        self.unary(Reshape::new(shape.to_vec()))
    }

    pub fn transpose(&self) -> Result<Var, GraphError> {
        self.unary(Transpose)
    }

    /// 取`axis`维上的第`index`个切片（去掉该维）
    pub fn select(&self, axis: usize, index: usize) -> Result<Var, GraphError> {
        self.unary(Select::new(axis, index))
    }

    /// 按行号取二维表的行，`None`对应全0行
    pub fn gather_rows(&self, indices: Vec<Option<usize>>) -> Result<Var, GraphError> {
        self.unary(Gather::new(indices))
    }

    pub fn concat(vars: &[&Var], axis: usize) -> Result<Var, GraphError> {
        let first = vars
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("拼接的节点列表为空".to_string()))?;
        first.graph.add_node(Concat::new(axis).into(), vars)
    }

    pub fn stack(vars: &[&Var], axis: usize) -> Result<Var, GraphError> {
        let first = vars
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("堆叠的节点列表为空".to_string()))?;
        first.graph.add_node(Stack::new(axis).into(), vars)
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 形状 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    /// 全部元素求和，结果为 [1, 1]
    pub fn sum(&self) -> Result<Var, GraphError> {
        self.unary(Sum::new(None))
    }

    pub fn sum_axis(&self, axis: usize) -> Result<Var, GraphError> {
        self.unary(Sum::new(Some(axis)))
    }
}
