/*
 * @Author       : 老董
 * @Date         : 2026-02-16
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-28
 * @Description  : Match-LSTM匹配层：逐词地把问题表示融入段落表示
 *
 * 每个段落位置`pos`（前向为t，反向为L-1-t）:
 *   G = tanh(Hq @ W_q + (Hp[pos] @ W_p + b_p) + h @ W_h)   # [Lq, batch, attention]
 *   α = softmax_有效问题长度(G @ w + b)                     # [Lq, batch]
 *   z = [Hp[pos]; Σ α_j Hq[j]]                              # [batch, 2 * hidden]
 *   (h, c) = LSTM(z, (h, c))，随后乘以mask[pos]（越过样本长度后状态清零而不是冻结）
 * 前向、反向共享注意力投影和LSTM权重，只有状态相互独立；
 * 两个方向的隐藏状态按位置对齐后拼接即为 Hr = [Hf; Hb]。
 */

use ndarray::Array2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, TensorError};
use crate::nn::{Graph, Init, Linear, LstmCell, Mask, Module, Var, attention_pool, join_name};
use crate::tensor::Tensor;

/// 匹配层输出，形状均为 [max_passage_len, batch, hidden]（前半为前向，后半为反向）
#[derive(Debug, Clone)]
pub struct MatchOutput {
    pub hidden: Var,
    pub cell: Var,
}

/// 一层Match-LSTM的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchLayer {
    attend_question: Linear,
    attend_passage: Linear,
    attend_hidden: Linear,
    alpha_transform: Linear,
    cell: LstmCell,
    hidden_size: usize,
}

/// 单个扫描方向的循环状态
struct DirectionState {
    h: Var,
    c: Var,
}

impl DirectionState {
    fn zeros(graph: &Graph, batch_size: usize, width: usize) -> Self {
        let h = graph.input(Array2::<f32>::zeros((batch_size, width)));
        Self { c: h.clone(), h }
    }
}

/// 同一批数据在各段落位置上共享的输入
struct StepInputs<'a> {
    passage: &'a Var,
    question: &'a Var,
    attended_question: &'a Var,
    attended_passage: &'a Var,
    mask_columns: &'a [Var],
    question_lengths: &'a [usize],
}

impl MatchLayer {
    /// - `hidden_size`: 段落/问题表示的宽度（双向合计）
    pub fn new(hidden_size: usize, attention_size: usize, rng: &mut StdRng) -> Self {
        let half = hidden_size / 2;
        Self {
            attend_question: Linear::new(hidden_size, attention_size, None, rng),
            attend_passage: Linear::new(hidden_size, attention_size, Some(Init::Zeros), rng),
            attend_hidden: Linear::new(half, attention_size, None, rng),
            alpha_transform: Linear::new(attention_size, 1, Some(Init::Zeros), rng),
            cell: LstmCell::new(2 * hidden_size, half, rng),
            hidden_size,
        }
    }

    /// - `passage`: [Lp, batch, hidden]，上一层的段落表示
    /// - `question`: [Lq, batch, hidden]
    /// - `passage_mask`: 段落掩码（整批构建一次，各层复用）
    /// - `question_lengths`: 问题的有效长度，注意力只在其内归一化
    pub fn forward(
        &self,
        passage: &Var,
        question: &Var,
        passage_mask: &Mask,
        question_lengths: &[usize],
    ) -> Result<MatchOutput, ModelError> {
        let passage_shape = passage.shape();
        let question_shape = question.shape();
        let &[max_len, batch_size, width] = passage_shape.as_slice() else {
            return Err(TensorError::RankMismatch {
                expected: 3,
                got: passage_shape.len(),
                shape: passage_shape,
            }
            .into());
        };
        if width != self.hidden_size || question_shape.last() != Some(&self.hidden_size) {
            return Err(TensorError::ShapeMismatch {
                name: "match layer input".to_string(),
                expected: vec![max_len, batch_size, self.hidden_size],
                got: passage_shape,
            }
            .into());
        }
        let half = self.hidden_size / 2;
        let graph = passage.graph();

        // 与段落位置无关的投影只算一次
        let attended_question = self.attend_question.forward(question)?;
        let attended_passage = self.attend_passage.forward(passage)?;
        let mask_columns = passage_mask.columns(graph);
        let inputs = StepInputs {
            passage,
            question,
            attended_question: &attended_question,
            attended_passage: &attended_passage,
            mask_columns: &mask_columns,
            question_lengths,
        };

        let mut forward = DirectionState::zeros(graph, batch_size, half);
        let mut backward = DirectionState::zeros(graph, batch_size, half);
        let mut forward_states = Vec::with_capacity(max_len);
        let mut backward_states = Vec::with_capacity(max_len);
        for t in 0..max_len {
            self.step(&mut forward, t, &inputs)?;
            self.step(&mut backward, max_len - t - 1, &inputs)?;
            forward_states.push((forward.h.clone(), forward.c.clone()));
            backward_states.push((backward.h.clone(), backward.c.clone()));
        }
        // 反向状态按位置排好
        backward_states.reverse();

        let mut hidden = Vec::with_capacity(max_len);
        let mut cell = Vec::with_capacity(max_len);
        for ((h_f, c_f), (h_b, c_b)) in forward_states.iter().zip(&backward_states) {
            hidden.push(Var::concat(&[h_f, h_b], 1)?);
            cell.push(Var::concat(&[c_f, c_b], 1)?);
        }
        Ok(MatchOutput {
            hidden: Var::stack(&hidden.iter().collect::<Vec<_>>(), 0)?,
            cell: Var::stack(&cell.iter().collect::<Vec<_>>(), 0)?,
        })
    }

    fn step(
        &self,
        state: &mut DirectionState,
        pos: usize,
        inputs: &StepInputs<'_>,
    ) -> Result<(), ModelError> {
        // [batch, attention]
        let position_term = self
            .attend_hidden
            .forward(&state.h)?
            .add(&inputs.attended_passage.select(0, pos)?)?;

        // [Lq, batch, attention]
        let g = inputs.attended_question.add(&position_term)?.tanh()?;

        let alpha = self
            .alpha_transform
            .score(&g)?
            .masked_softmax(inputs.question_lengths)?;
        let attended = attention_pool(&alpha, inputs.question)?;

        let passage_at = inputs.passage.select(0, pos)?;
        let z = Var::concat(&[&passage_at, &attended], 1)?;

        let (h, c) = self.cell.step(&z, &state.h, &state.c)?;
        let mask = &inputs.mask_columns[pos];
        state.h = h.mul(mask)?;
        state.c = c.mul(mask)?;
        Ok(())
    }
}

impl Module for MatchLayer {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let mut params = self
            .attend_question
            .named_parameters(&join_name(prefix, "attend_question"));
        params.extend(
            self.attend_passage
                .named_parameters(&join_name(prefix, "attend_passage")),
        );
        params.extend(
            self.attend_hidden
                .named_parameters(&join_name(prefix, "attend_hidden")),
        );
        params.extend(
            self.alpha_transform
                .named_parameters(&join_name(prefix, "alpha_transform")),
        );
        params.extend(self.cell.named_parameters(&join_name(prefix, "cell")));
        params
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let mut params = self
            .attend_question
            .named_parameters_mut(&join_name(prefix, "attend_question"));
        params.extend(
            self.attend_passage
                .named_parameters_mut(&join_name(prefix, "attend_passage")),
        );
        params.extend(
            self.attend_hidden
                .named_parameters_mut(&join_name(prefix, "attend_hidden")),
        );
        params.extend(
            self.alpha_transform
                .named_parameters_mut(&join_name(prefix, "alpha_transform")),
        );
        params.extend(self.cell.named_parameters_mut(&join_name(prefix, "cell")));
        params
    }
}
