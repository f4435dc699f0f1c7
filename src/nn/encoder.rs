/*
 * @Author       : 老董
 * @Date         : 2026-02-14
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-27
 * @Description  : 双向多层LSTM序列编码器（变长批处理）
 *
 * 逐样本掩码代替 pack_padded_sequence：每步更新后把状态乘以该步的掩码列，
 * - 前向：越过有效长度后状态与输出恒为0；
 * - 反向：从`max_len - 1`倒着走，有效长度之后的状态被掩为0，
 *   因此每个样本都从自己最后一个有效词、以0状态开始。
 * 于是任何样本的输出只依赖它自己的有效前缀，填充位置输出恒为0，与打包的结果一致。
 */

use ndarray::Array2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{BatchError, ComparisonOperator, ModelError, TensorError};
use crate::nn::{Dropout, LstmCell, Mask, Module, Var, join_name};
use crate::tensor::Tensor;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BiLstmLayer {
    forward: LstmCell,
    backward: LstmCell,
}

/// 双向多层LSTM编码器。输出宽度为`2 * hidden_size`（前向、反向各占一半）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiLstmEncoder {
    layers: Vec<BiLstmLayer>,
    dropout: f32,
    input_size: usize,
    hidden_size: usize,
}

impl BiLstmEncoder {
    /// - `hidden_size`: 单个方向的隐藏维度
    /// - `dropout`: 层与层之间的丢弃概率（最后一层之后不做dropout）
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_layers: usize,
        dropout: f32,
        rng: &mut StdRng,
    ) -> Self {
        let layers = (0..num_layers)
            .map(|layer_no| {
                let layer_input = if layer_no == 0 {
                    input_size
                } else {
                    2 * hidden_size
                };
                BiLstmLayer {
                    forward: LstmCell::new(layer_input, hidden_size, rng),
                    backward: LstmCell::new(layer_input, hidden_size, rng),
                }
            })
            .collect();
        Self {
            layers,
            dropout,
            input_size,
            hidden_size,
        }
    }

    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    pub const fn output_size(&self) -> usize {
        2 * self.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// `inputs`: [max_len, batch, input_size] -> [max_len, batch, 2 * hidden_size]
    pub fn forward(
        &self,
        inputs: &Var,
        lengths: &[usize],
        is_train_mode: bool,
        rng: &mut StdRng,
    ) -> Result<Var, ModelError> {
        let shape = inputs.shape();
        let &[max_len, batch_size, _] = shape.as_slice() else {
            return Err(TensorError::RankMismatch {
                expected: 3,
                got: shape.len(),
                shape,
            }
            .into());
        };
        if lengths.len() != batch_size {
            return Err(BatchError::BatchSizeMismatch {
                what: "encoder lengths",
                expected: batch_size,
                got: lengths.len(),
            }
            .into());
        }
        let out_of_range = lengths
            .iter()
            .enumerate()
            .find(|&(_, &len)| !ComparisonOperator::LessOrEqual.holds(len, max_len));
        if let Some((example, &len)) = out_of_range {
            return Err(BatchError::LengthOutOfRange {
                what: "encoder input",
                example,
                len,
                operator: ComparisonOperator::LessOrEqual,
                max_len,
            }
            .into());
        }

        let mask_columns = Mask::new(lengths, max_len).columns(inputs.graph());
        let dropout = Dropout::new(self.dropout);
        let mut hidden = inputs.clone();
        for (layer_no, layer) in self.layers.iter().enumerate() {
            hidden = self.run_layer(layer, &hidden, &mask_columns)?;
            if layer_no + 1 < self.layers.len() {
                hidden = dropout.forward(&hidden, is_train_mode, rng)?;
            }
        }
        Ok(hidden)
    }

    fn run_layer(
        &self,
        layer: &BiLstmLayer,
        inputs: &Var,
        mask_columns: &[Var],
    ) -> Result<Var, ModelError> {
        let steps = (0..mask_columns.len())
            .map(|t| inputs.select(0, t))
            .collect::<Result<Vec<_>, _>>()?;

        let forward_out = self.scan(&layer.forward, &steps, mask_columns, 0..steps.len())?;
        let mut backward_out =
            self.scan(&layer.backward, &steps, mask_columns, (0..steps.len()).rev())?;
        // 恢复时间顺序
        backward_out.reverse();

        let forward_out = Var::stack(&forward_out.iter().collect::<Vec<_>>(), 0)?;
        let backward_out = Var::stack(&backward_out.iter().collect::<Vec<_>>(), 0)?;
        Ok(Var::concat(&[&forward_out, &backward_out], 2)?)
    }

    /// 按`order`给出的时间步顺序走一遍，返回每步（掩码后的）隐藏状态，顺序与`order`相同
    fn scan(
        &self,
        cell: &LstmCell,
        steps: &[Var],
        mask_columns: &[Var],
        order: impl Iterator<Item = usize>,
    ) -> Result<Vec<Var>, ModelError> {
        let graph = mask_columns
            .first()
            .map(|column| column.graph().clone())
            .ok_or(BatchError::EmptyBatch)?;
        let batch_size = mask_columns[0].shape()[0];
        let mut h = graph.input(Array2::<f32>::zeros((batch_size, self.hidden_size)));
        let mut c = h.clone();
        let mut outputs = Vec::with_capacity(steps.len());
        for t in order {
            let (h_t, c_t) = cell.step(&steps[t], &h, &c)?;
            h = h_t.mul(&mask_columns[t])?;
            c = c_t.mul(&mask_columns[t])?;
            outputs.push(h.clone());
        }
        Ok(outputs)
    }
}

impl Module for BiLstmEncoder {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(layer_no, layer)| {
                let layer_prefix = join_name(prefix, &layer_no.to_string());
                let mut params = layer
                    .forward
                    .named_parameters(&join_name(&layer_prefix, "forward"));
                params.extend(
                    layer
                        .backward
                        .named_parameters(&join_name(&layer_prefix, "backward")),
                );
                params
            })
            .collect()
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(layer_no, layer)| {
                let layer_prefix = join_name(prefix, &layer_no.to_string());
                let mut params = layer
                    .forward
                    .named_parameters_mut(&join_name(&layer_prefix, "forward"));
                params.extend(
                    layer
                        .backward
                        .named_parameters_mut(&join_name(&layer_prefix, "backward")),
                );
                params
            })
            .collect()
    }
}
