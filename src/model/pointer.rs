/*
 * @Author       : 老董
 * @Date         : 2026-02-17
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-28
 * @Description  : 边界指针网络（answer pointer，boundary模式）
 *
 * 每个指针网络含两个方向、各自独立的三步注意力LSTM：
 * - 前向方向先指向起点，再指向终点；
 * - 反向方向先指向终点，再指向起点。
 * 第0步只用于推动LSTM得到初始状态，其分布被丢弃；第1、2步的分布依次输出，第2步之后不再更新状态。
 * 每一步的段落注意力都只在该样本的有效段落长度内归一化，再补0到批内最大长度。
 */

use std::fmt::{self, Display};

use ndarray::{Array2, Ix2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{GraphError, ModelError};
use crate::nn::{Init, Linear, LstmCell, Module, Var, attention_pool, join_name};
use crate::tensor::Tensor;

/// 指针网络的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PointerNetwork {
    /// 答案所在句子的边界，用F1加权的软损失训练
    SentenceBoundary,
    /// 精确的答案区间，用极大似然损失训练
    AnswerSpan,
}

impl PointerNetwork {
    pub const ALL: [PointerNetwork; 2] = [PointerNetwork::SentenceBoundary, PointerNetwork::AnswerSpan];
}

impl Display for PointerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PointerNetwork::SentenceBoundary => "sentence_pointer",
            PointerNetwork::AnswerSpan => "span_pointer",
        };
        write!(f, "{}", name)
    }
}

/// 一个指针网络的输出，每个分布形状为 [batch, max_passage_len]
#[derive(Debug, Clone)]
pub struct PointerOutput {
    /// 前向方向依次输出的 (起点分布, 终点分布)
    pub forward: (Array2<f32>, Array2<f32>),
    /// 反向方向依次输出的 (终点分布, 起点分布)
    pub backward: (Array2<f32>, Array2<f32>),
}

impl PointerOutput {
    pub fn forward_start(&self) -> &Array2<f32> {
        &self.forward.0
    }

    pub fn forward_end(&self) -> &Array2<f32> {
        &self.forward.1
    }

    pub fn backward_end(&self) -> &Array2<f32> {
        &self.backward.0
    }

    pub fn backward_start(&self) -> &Array2<f32> {
        &self.backward.1
    }
}

/// 图上的指针输出：与`PointerOutput`一一对应，损失由它们构建，从而可以反向传播
#[derive(Debug, Clone)]
pub struct PointerVars {
    /// 前向方向依次输出的 (起点分布, 终点分布)
    pub forward: (Var, Var),
    /// 反向方向依次输出的 (终点分布, 起点分布)
    pub backward: (Var, Var),
}

impl PointerVars {
    pub fn forward_start(&self) -> &Var {
        &self.forward.0
    }

    pub fn forward_end(&self) -> &Var {
        &self.forward.1
    }

    pub fn backward_end(&self) -> &Var {
        &self.backward.0
    }

    pub fn backward_start(&self) -> &Var {
        &self.backward.1
    }

    /// 取出各分布的值
    pub fn to_output(&self) -> Result<PointerOutput, GraphError> {
        Ok(PointerOutput {
            forward: (self.forward.0.value_as::<Ix2>()?, self.forward.1.value_as::<Ix2>()?),
            backward: (self.backward.0.value_as::<Ix2>()?, self.backward.1.value_as::<Ix2>()?),
        })
    }
}

/// 单个方向的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointerDirection {
    attend_input: Linear,
    attend_answer: Linear,
    beta_transform: Linear,
    cell: LstmCell,
}

impl PointerDirection {
    fn new(hidden_size: usize, attention_size: usize, rng: &mut StdRng) -> Self {
        let half = hidden_size / 2;
        Self {
            attend_input: Linear::new(hidden_size, attention_size, Some(Init::Zeros), rng),
            attend_answer: Linear::new(half, attention_size, None, rng),
            beta_transform: Linear::new(attention_size, 1, Some(Init::Zeros), rng),
            cell: LstmCell::new(2 * hidden_size, half, rng),
        }
    }

    /// 三步指针，返回第1、2步的分布（均已转置为 [batch, max_len]）
    fn point(
        &self,
        passage: &Var,
        question_summary: &Var,
        passage_lengths: &[usize],
    ) -> Result<(Var, Var), ModelError> {
        let batch_size = question_summary.shape()[0];
        let half = self.cell.hidden_size();
        let attended_input = self.attend_input.forward(passage)?;

        let graph = passage.graph();
        let mut h = graph.input(Array2::<f32>::zeros((batch_size, half)));
        let mut c = h.clone();
        let mut emitted = Vec::with_capacity(2);
        for k in 0..3 {
            // [Lp, batch, attention]
            let f_k = attended_input
                .add(&self.attend_answer.forward(&h)?)?
                .tanh()?;

            let beta = self
                .beta_transform
                .score(&f_k)?
                .masked_softmax(passage_lengths)?;
            if k > 0 {
                emitted.push(beta.transpose()?);
            }
            if k == 2 {
                break;
            }

            let weighted_passage = attention_pool(&beta, passage)?;
            let input = Var::concat(&[&weighted_passage, question_summary], 1)?;
            let (h_next, c_next) = self.cell.step(&input, &h, &c)?;
            h = h_next;
            c = c_next;
        }

        let second = emitted.pop();
        let first = emitted.pop();
        match (first, second) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(GraphError::ComputationError("指针网络未产生两个分布".to_string()).into()),
        }
    }
}

/// 边界指针网络
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryPointer {
    attend_question: Linear,
    alpha_transform: Linear,
    forward: PointerDirection,
    backward: PointerDirection,
}

impl BoundaryPointer {
    pub fn new(hidden_size: usize, attention_size: usize, rng: &mut StdRng) -> Self {
        Self {
            attend_question: Linear::new(hidden_size, attention_size, Some(Init::Zeros), rng),
            alpha_transform: Linear::new(attention_size, 1, Some(Init::Zeros), rng),
            forward: PointerDirection::new(hidden_size, attention_size, rng),
            backward: PointerDirection::new(hidden_size, attention_size, rng),
        }
    }

    /// - `passage`: [Lp, batch, hidden]，后处理编码器输出的 Hr
    /// - `question`: [Lq, batch, hidden]
    pub fn forward(
        &self,
        passage: &Var,
        question: &Var,
        passage_lengths: &[usize],
        question_lengths: &[usize],
    ) -> Result<PointerVars, ModelError> {
        let question_summary = self.summarize_question(question, question_lengths)?;
        let forward = self
            .forward
            .point(passage, &question_summary, passage_lengths)?;
        let backward = self
            .backward
            .point(passage, &question_summary, passage_lengths)?;
        Ok(PointerVars { forward, backward })
    }

    /// 问题的注意力汇总向量 [batch, hidden]，与步数、方向无关，只算一次
    fn summarize_question(&self, question: &Var, question_lengths: &[usize]) -> Result<Var, ModelError> {
        let attended = self.attend_question.forward(question)?.tanh()?;
        let alpha = self
            .alpha_transform
            .score(&attended)?
            .masked_softmax(question_lengths)?;
        Ok(attention_pool(&alpha, question)?)
    }
}

impl Module for BoundaryPointer {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let mut params = self
            .attend_question
            .named_parameters(&join_name(prefix, "attend_question"));
        params.extend(
            self.alpha_transform
                .named_parameters(&join_name(prefix, "alpha_transform")),
        );
        for (name, direction) in [("forward", &self.forward), ("backward", &self.backward)] {
            let direction_prefix = join_name(prefix, name);
            params.extend(
                direction
                    .attend_input
                    .named_parameters(&join_name(&direction_prefix, "attend_input")),
            );
            params.extend(
                direction
                    .attend_answer
                    .named_parameters(&join_name(&direction_prefix, "attend_answer")),
            );
            params.extend(
                direction
                    .beta_transform
                    .named_parameters(&join_name(&direction_prefix, "beta_transform")),
            );
            params.extend(
                direction
                    .cell
                    .named_parameters(&join_name(&direction_prefix, "cell")),
            );
        }
        params
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let mut params = self
            .attend_question
            .named_parameters_mut(&join_name(prefix, "attend_question"));
        params.extend(
            self.alpha_transform
                .named_parameters_mut(&join_name(prefix, "alpha_transform")),
        );
        for (name, direction) in [("forward", &mut self.forward), ("backward", &mut self.backward)] {
            let direction_prefix = join_name(prefix, name);
            params.extend(
                direction
                    .attend_input
                    .named_parameters_mut(&join_name(&direction_prefix, "attend_input")),
            );
            params.extend(
                direction
                    .attend_answer
                    .named_parameters_mut(&join_name(&direction_prefix, "attend_answer")),
            );
            params.extend(
                direction
                    .beta_transform
                    .named_parameters_mut(&join_name(&direction_prefix, "beta_transform")),
            );
            params.extend(
                direction
                    .cell
                    .named_parameters_mut(&join_name(&direction_prefix, "cell")),
            );
        }
        params
    }
}
