use ndarray::{Array2, ArrayD, Ix2};

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 按行号从 [rows, dim] 的表中取行，得到 [indices.len(), dim]。
/// 行号为`None`的位置输出全0行且不回传梯度（用于词向量表的填充符）
///
/// backward: 上游梯度按行号累加回表中（同一行被取多次时梯度相加）
#[derive(Debug, Clone)]
pub(crate) struct Gather {
    indices: Vec<Option<usize>>,
}

impl Gather {
    pub(crate) const fn new(indices: Vec<Option<usize>>) -> Self {
        Self { indices }
    }
}

impl TraitNode for Gather {
    fn op_name(&self) -> &'static str {
        "Gather"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        let table = parents[0]
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| GraphError::InvalidOperation(format!(
                "Gather的输入须为2阶，实际形状为{:?}",
                parents[0].shape()
            )))?;
        let mut output = Array2::zeros((self.indices.len(), table.ncols()));
        for (row, index) in self.indices.iter().enumerate() {
            let Some(index) = *index else {
                continue;
            };
            if index >= table.nrows() {
                return Err(GraphError::InvalidOperation(format!(
                    "Gather的行号{index}超出表的行数{}",
                    table.nrows()
                )));
            }
            output.row_mut(row).assign(&table.row(index));
        }
        Ok(output.into_dyn())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let upstream = upstream
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| GraphError::ComputationError("Gather的上游梯度须为2阶".to_string()))?;
        let (rows, cols) = (parents[0].shape()[0], parents[0].shape()[1]);
        let mut grad = Array2::zeros((rows, cols));
        for (row, index) in self.indices.iter().enumerate() {
            if let Some(index) = *index {
                let mut target = grad.row_mut(index);
                target += &upstream.row(row);
            }
        }
        Ok(grad.into_dyn())
    }
}
