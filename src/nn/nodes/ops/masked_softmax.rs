use ndarray::{ArrayD, Axis, Ix2, Zip};

use crate::errors::GraphError;
use crate::nn::masked_softmax;
use crate::nn::nodes::{TraitNode, expect_parents};

/// 按样本在有效长度内做softmax。输入 [seq_len, batch]，第`i`列只在`[0, lengths[i])`内归一化
///
/// backward（逐列）: ∂L/∂x_t = y_t · (g_t - Σ_j g_j·y_j)；填充位置 y = 0，梯度自然为0
#[derive(Debug, Clone)]
pub(crate) struct MaskedSoftmax {
    lengths: Vec<usize>,
}

impl MaskedSoftmax {
    pub(crate) const fn new(lengths: Vec<usize>) -> Self {
        Self { lengths }
    }
}

impl TraitNode for MaskedSoftmax {
    fn op_name(&self) -> &'static str {
        "MaskedSoftmax"
    }

    fn calc_value(&self, parents: &[&ArrayD<f32>]) -> Result<ArrayD<f32>, GraphError> {
        expect_parents(self.op_name(), parents, 1)?;
        let scores = parents[0].view().into_dimensionality::<Ix2>().map_err(|_| {
            GraphError::InvalidOperation(format!(
                "MaskedSoftmax的输入须为 [seq_len, batch]，实际形状为{:?}",
                parents[0].shape()
            ))
        })?;
        if scores.ncols() != self.lengths.len() {
            return Err(GraphError::ShapeMismatch {
                op: self.op_name(),
                left: scores.shape().to_vec(),
                right: vec![self.lengths.len()],
            });
        }
        Ok(masked_softmax(&scores, &self.lengths).into_dyn())
    }

    fn calc_grad_to_parent(
        &self,
        _index: usize,
        _parents: &[&ArrayD<f32>],
        value: &ArrayD<f32>,
        upstream: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, GraphError> {
        let mut grad = ArrayD::zeros(value.raw_dim());
        for (i, column) in grad.axis_iter_mut(Axis(1)).enumerate() {
            let y = value.index_axis(Axis(1), i);
            let g = upstream.index_axis(Axis(1), i);
            // Σ_j g_j·y_j
            let weighted = (&y * &g).sum();
            Zip::from(column)
                .and(&y)
                .and(&g)
                .for_each(|dx, &y, &g| *dx = y * (g - weighted));
        }
        Ok(grad)
    }
}
