/*
 * @Author       : 老董
 * @Date         : 2026-02-26
 * @Description  : 计算图：按调用顺序记录前向计算（动态图），并据此做反向传播
 *
 * 每次前向计算新建一张图。参数以叶子节点的形式登记进图（同一个参数张量只登记一次，
 * 循环中反复使用时梯度自动累加）；反向传播后按参数名取出梯度，由外部优化器更新参数。
 */

mod backward;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use ndarray::{Array, ArrayD, Dimension};

use crate::errors::GraphError;
use crate::nn::Var;
use crate::nn::nodes::{NodeHandle, NodeId, NodeType, TraitNode, Variable};
use crate::tensor::Tensor;

#[derive(Default)]
pub(crate) struct GraphInner {
    nodes: Vec<NodeHandle>,
    /// 参数张量地址 -> 叶子节点。地址只在本次前向期间有效（期间参数不会移动）
    parameters: HashMap<*const Tensor, NodeId>,
    parameter_names: BTreeMap<String, NodeId>,
}

impl GraphInner {
    pub(crate) fn node(&self, id: NodeId) -> Result<&NodeHandle, GraphError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| GraphError::InvalidOperation(format!("图中不存在节点{}", id.0)))
    }

    fn push(&mut self, handle: NodeHandle) -> NodeId {
        self.nodes.push(handle);
        NodeId(self.nodes.len() - 1)
    }
}

/// 计算图句柄。克隆开销很低（`Rc`），所有克隆指向同一张图
#[derive(Clone, Default)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("num_nodes", &self.num_nodes())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// 图中可训练参数节点的个数
    pub fn num_parameters(&self) -> usize {
        self.inner
            .borrow()
            .nodes
            .iter()
            .filter(|handle| matches!(&handle.node, NodeType::Variable(v) if v.is_trainable()))
            .count()
    }

    pub(crate) fn is_same(&self, other: &Graph) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn inner(&self) -> std::cell::Ref<'_, GraphInner> {
        self.inner.borrow()
    }

    /// 常量输入（不求梯度）
    pub fn input<D: Dimension>(&self, value: Array<f32, D>) -> Var {
        self.leaf(value.into_dyn(), false)
    }

    /// 可训练参数。同一张量多次调用返回同一个节点
    pub fn parameter(&self, tensor: &Tensor) -> Var {
        let key: *const Tensor = tensor;
        let existing = self.inner.borrow().parameters.get(&key).copied();
        if let Some(id) = existing {
            return Var::new(id, self.clone());
        }
        let var = self.leaf(tensor.view().to_owned(), true);
        self.inner.borrow_mut().parameters.insert(key, var.node_id());
        var
    }

    /// 按名字登记一组参数，之后可用`gradients`按名字取梯度
    pub fn register_parameters<'a, I>(&self, params: I)
    where
        I: IntoIterator<Item = (String, &'a Tensor)>,
    {
        for (name, tensor) in params {
            let id = self.parameter(tensor).node_id();
            self.inner.borrow_mut().parameter_names.insert(name, id);
        }
    }

    /// 已登记参数的梯度。本次反向传播没有到达的参数梯度为全0
    pub fn gradients(&self) -> BTreeMap<String, Tensor> {
        let inner = self.inner.borrow();
        inner
            .parameter_names
            .iter()
            .filter_map(|(name, &id)| {
                let handle = inner.nodes.get(id.0)?;
                let grad = handle
                    .grad
                    .clone()
                    .unwrap_or_else(|| ArrayD::zeros(handle.value.raw_dim()));
                Some((name.clone(), Tensor::from(grad)))
            })
            .collect()
    }

    /// 某个参数张量的梯度（须先经`parameter`进入本图）
    pub fn grad_of(&self, tensor: &Tensor) -> Option<Tensor> {
        let key: *const Tensor = tensor;
        let inner = self.inner.borrow();
        let id = inner.parameters.get(&key)?;
        inner.nodes.get(id.0)?.grad.clone().map(Tensor::from)
    }

    fn leaf(&self, value: ArrayD<f32>, trainable: bool) -> Var {
        let id = self.inner.borrow_mut().push(NodeHandle {
            node: NodeType::from(Variable::new(trainable)),
            parents: Vec::new(),
            value,
            grad: None,
            requires_grad: trainable,
        });
        Var::new(id, self.clone())
    }

    /// 创建运算节点：立即按父节点的值算出本节点的值
    pub(crate) fn add_node(&self, node: NodeType, parents: &[&Var]) -> Result<Var, GraphError> {
        if parents.iter().any(|p| !self.is_same(p.graph())) {
            return Err(GraphError::InvalidOperation(format!(
                "{}节点的父节点来自不同的计算图",
                node.op_name()
            )));
        }
        let parent_ids: Vec<NodeId> = parents.iter().map(|p| p.node_id()).collect();
        let (value, requires_grad) = {
            let inner = self.inner.borrow();
            let handles = parent_ids
                .iter()
                .map(|&id| inner.node(id))
                .collect::<Result<Vec<_>, _>>()?;
            let values: Vec<&ArrayD<f32>> = handles.iter().map(|h| &h.value).collect();
            let value = node.calc_value(&values)?;
            (value, handles.iter().any(|h| h.requires_grad))
        };
        let id = self.inner.borrow_mut().push(NodeHandle {
            node,
            parents: parent_ids,
            value,
            grad: None,
            requires_grad,
        });
        Ok(Var::new(id, self.clone()))
    }

    pub(crate) fn backward(&self, loss: NodeId) -> Result<f32, GraphError> {
        self.inner.borrow_mut().backward(loss)
    }
}
