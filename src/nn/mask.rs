/*
 * @Author       : 老董
 * @Date         : 2026-02-13
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-27
 * @Description  : 变长序列的掩码与“只在有效长度内归一化”的注意力工具
 *
 * 约定所有序列张量的布局都是 [seq_len, batch, ...]，与循环网络的时间步迭代顺序一致。
 * `masked_softmax`是`MaskedSoftmax`节点的前向实现；`attention_pool`直接由图上的算子组合而成。
 */

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::errors::GraphError;
use crate::nn::{Graph, Var};

/// 掩码矩阵：`mask[t][i] = 1` 当且仅当 `t < lengths[i]`。
/// 每个（批，长度组合）只构建一次，在同一序列的所有循环步中复用
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Array2<f32>,
    lengths: Vec<usize>,
}

impl Mask {
    pub fn new(lengths: &[usize], max_len: usize) -> Self {
        let data = Array2::from_shape_fn((max_len, lengths.len()), |(t, i)| {
            if t < lengths[i] { 1.0 } else { 0.0 }
        });
        Self {
            data,
            lengths: lengths.to_vec(),
        }
    }

    pub fn max_len(&self) -> usize {
        self.data.nrows()
    }

    pub fn batch_size(&self) -> usize {
        self.data.ncols()
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// 第`t`个时间步的掩码，形状 [batch]
    pub fn at(&self, t: usize) -> ArrayView1<'_, f32> {
        self.data.row(t)
    }

    /// 第`t`个时间步的掩码，形状 [batch, 1]，可直接与 [batch, dim] 的状态广播相乘
    pub fn column_at(&self, t: usize) -> ArrayView2<'_, f32> {
        self.data.row(t).insert_axis(Axis(1))
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 每个时间步的 [batch, 1] 掩码，作为常量输入进图
    pub fn columns(&self, graph: &Graph) -> Vec<Var> {
        (0..self.max_len())
            .map(|t| graph.input(self.column_at(t).to_owned()))
            .collect()
    }
}

/// 按样本在有效长度内做softmax。
/// `scores`形状 [seq_len, batch]；第`i`列只在`[0, lengths[i])`内归一化，其余位置严格为0
pub fn masked_softmax(scores: &ArrayView2<f32>, lengths: &[usize]) -> Array2<f32> {
    let mut output = Array2::zeros(scores.raw_dim());
    for (i, (column, mut out_column)) in scores
        .axis_iter(Axis(1))
        .zip(output.axis_iter_mut(Axis(1)))
        .enumerate()
    {
        let valid = lengths[i].min(column.len());
        if valid == 0 {
            continue;
        }
        let valid_scores = column.slice(ndarray::s![..valid]);
        let max = valid_scores.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        let exp: Array1<f32> = valid_scores.mapv(|x| (x - max).exp());
        let sum = exp.sum();
        out_column
            .slice_mut(ndarray::s![..valid])
            .assign(&(exp / sum));
    }
    output
}

/// 按注意力权重对序列加权求和。
/// `weights`: [seq_len, batch]，`values`: [seq_len, batch, dim] -> [batch, dim]
pub fn attention_pool(weights: &Var, values: &Var) -> Result<Var, GraphError> {
    let shape = weights.shape();
    let &[seq_len, batch_size] = shape.as_slice() else {
        return Err(GraphError::InvalidOperation(format!(
            "注意力权重须为 [seq_len, batch]，实际形状为{shape:?}"
        )));
    };
    weights
        .reshape(&[seq_len, batch_size, 1])?
        .mul(values)?
        .sum_axis(0)
}
