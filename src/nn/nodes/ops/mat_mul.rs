use ndarray::{ArrayD, Ix2};

use crate::errors::GraphError;
use crate::nn::nodes::{TraitNode, expect_parents, flatten_rows, reshaped};

/// 矩阵乘法：a 为 [..., k]（前面各维视作行），b 为 [k, n]，结果为 [..., n]。
/// 序列张量 [seq_len, batch, k] 可直接乘以权重，一次完成所有时间步的投影
///
/// forward: C = A @ B
/// backward: ∂L/∂A = G @ Bᵀ，∂L/∂B = Aᵀ @ G
#[derive(Debug, Clone, Copy)]
pub(crate) struct MatMul;

impl MatMul {
    fn weight_matrix<'a>(
        &self,
        a: &ArrayD<f32>,
        b: &'a ArrayD<f32>,
    ) -> Result<ndarray::ArrayView2<'a, f32>, GraphError> {
        let mismatch = || GraphError::ShapeMismatch {
            op: "MatMul",
            left: a.shape().to_vec(),
            right: b.shape().to_vec(),
        };
        let b = b.view().into_dimensionality::<Ix2>().map_err(|_| mismatch())?;
        if a.shape().last() != Some(&b.nrows()) {
            return Err(mismatch());
        }
        Ok(b)
    }
}

impl TraitNode for MatMul {
    fn op_name(&self) -> &'static str {
        "MatMul"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 2)?;
        let (a, b) = (parents[0], parents[1]);
        let b = self.weight_matrix(a, b)?;
        let product = flatten_rows(self.op_name(), a)?.dot(&b);
        let mut shape = a.shape()[..a.ndim() - 1].to_vec();
        shape.push(b.ncols());
        reshaped(&product.into_dyn(), &shape)
    }

    fn calc_grad_to_parent(
        &self,
        index: usize,
        parents: &[&ArrayD<f32>],
        _value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let (a, b) = (parents[0], parents[1]);
        let b = self.weight_matrix(a, b)?;
        let upstream = flatten_rows(self.op_name(), upstream)?;
        if index == 0 {
            reshaped(&upstream.dot(&b.t()).into_dyn(), a.shape())
        } else {
            Ok(flatten_rows(self.op_name(), a)?.t().dot(&upstream).into_dyn())
        }
    }
}
