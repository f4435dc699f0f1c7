/*
 * @Author       : 老董
 * @Date         : 2026-02-18
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 损失组合：答案区间指针的极大似然损失 + 句子边界指针的F1加权软损失
 *
 * 总损失 = Σ 激活项 / (batch_size * 激活的指针网络数)
 * 各项都在计算图上构建，`backward`即可得到全部参数的梯度。
 */

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, ArrayView3, Axis};

use crate::errors::{BatchError, GraphError, ModelError};
use crate::nn::Var;

use super::pointer::{PointerNetwork, PointerVars};

/// 按配置组合各指针网络的损失
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossComposer {
    f1_loss_multiplier: f32,
    f1_loss_threshold: Option<f32>,
}

impl LossComposer {
    pub const fn new(f1_loss_multiplier: f32, f1_loss_threshold: Option<f32>) -> Self {
        Self {
            f1_loss_multiplier,
            f1_loss_threshold,
        }
    }

    /// 答案区间的负对数似然（对整个batch求和，未平均）：
    /// 每个样本取 -(ln fs[s] + ln fe[e] + ln bs[s] + ln be[e]) / 2
    pub fn mle_term(&self, output: &PointerVars, answers: &[(usize, usize)]) -> Result<Var, ModelError> {
        let starts: Vec<usize> = answers.iter().map(|&(start, _)| start).collect();
        let ends: Vec<usize> = answers.iter().map(|&(_, end)| end).collect();
        let log_probs = [
            Self::log_prob_at(output.forward_start(), &starts)?,
            Self::log_prob_at(output.forward_end(), &ends)?,
            Self::log_prob_at(output.backward_start(), &starts)?,
            Self::log_prob_at(output.backward_end(), &ends)?,
        ];
        let total = log_probs[1..]
            .iter()
            .try_fold(log_probs[0].clone(), |acc, term| acc.add(term))?;
        Ok(total.scale(-0.5)?)
    }

    /// Σ_i ln dist[i, positions[i]]，结果为 [1, 1]
    fn log_prob_at(dist: &Var, positions: &[usize]) -> Result<Var, ModelError> {
        let shape = dist.shape();
        let &[batch_size, max_len] = shape.as_slice() else {
            return Err(GraphError::InvalidOperation(format!(
                "指针分布须为 [batch, max_len]，实际形状为{shape:?}"
            ))
            .into());
        };
        if positions.len() != batch_size {
            return Err(BatchError::BatchSizeMismatch {
                what: "answers",
                expected: batch_size,
                got: positions.len(),
            }
            .into());
        }
        if let Some(&pos) = positions.iter().find(|&&pos| pos >= max_len) {
            return Err(GraphError::InvalidOperation(format!(
                "答案位置{pos}超出指针分布的长度{max_len}"
            ))
            .into());
        }
        // 展平成 [batch * max_len, 1] 后按行号取出每个样本的答案位置
        let rows = positions
            .iter()
            .enumerate()
            .map(|(i, &pos)| Some(i * max_len + pos))
            .collect();
        Ok(dist
            .reshape(&[batch_size * max_len, 1])?
            .gather_rows(rows)?
            .ln()?
            .sum()?)
    }

    /// F1加权的软损失（对整个batch求和，未平均，已乘以系数）：
    /// 每个方向取 -ln Σ_{s,e} start[s]·end[e]·F1[s,e]，两个方向取平均。
    /// F1矩阵（阈值化之后）全为0的样本不计入；其余样本的概率质量即使下溢也按`f32::MIN_POSITIVE`截断计入
    pub fn f1_term(&self, output: &PointerVars, f1_matrices: &ArrayView3<f32>) -> Result<Var, ModelError> {
        let f1 = match self.f1_loss_threshold {
            Some(threshold) => f1_matrices.mapv(|x| if x >= threshold { 1.0 } else { 0.0 }),
            None => f1_matrices.to_owned(),
        };
        let has_mass: Array1<f32> = f1
            .axis_iter(Axis(0))
            .map(|matrix| if matrix.iter().any(|&x| x > 0.0) { 1.0 } else { 0.0 })
            .collect();
        for (example, _) in has_mass.iter().enumerate().filter(|&(_, &flag)| flag == 0.0) {
            tracing::debug!(example, "F1矩阵全为0，该样本不计入F1损失");
        }

        let graph = output.forward_start().graph();
        let f1 = graph.input(f1);
        let has_mass = graph.input(has_mass);
        let forward = self.direction_log_mass(output.forward_start(), output.forward_end(), &f1, &has_mass)?;
        let backward = self.direction_log_mass(output.backward_start(), output.backward_end(), &f1, &has_mass)?;
        Ok(forward.add(&backward)?.scale(-self.f1_loss_multiplier / 2.0)?)
    }

    /// Σ_i has_mass[i] · ln Σ_{s,e} start[i,s]·F1[i,s,e]·end[i,e]
    fn direction_log_mass(&self, start: &Var, end: &Var, f1: &Var, has_mass: &Var) -> Result<Var, ModelError> {
        let shape = start.shape();
        let &[batch_size, max_len] = shape.as_slice() else {
            return Err(GraphError::InvalidOperation(format!(
                "指针分布须为 [batch, max_len]，实际形状为{shape:?}"
            ))
            .into());
        };
        // [batch, L, 1] ⊙ [batch, L, L] ⊙ [batch, 1, L]
        let mass = start
            .reshape(&[batch_size, max_len, 1])?
            .mul(f1)?
            .mul(&end.reshape(&[batch_size, 1, max_len])?)?
            .sum_axis(2)?
            .sum_axis(1)?;
        let underflowed = mass
            .value()?
            .iter()
            .zip(has_mass.value()?.iter())
            .enumerate()
            .filter(|&(_, (&m, &flag))| flag > 0.0 && m < f32::MIN_POSITIVE)
            .map(|(example, _)| example)
            .collect::<Vec<_>>();
        if !underflowed.is_empty() {
            tracing::debug!(?underflowed, "F1加权概率质量下溢，按f32::MIN_POSITIVE截断");
        }
        Ok(mass.ln()?.mul(has_mass)?.sum()?)
    }

    /// 组合所有激活的指针网络的损失并取平均，结果为 [1, 1] 的标量节点
    pub fn compose(
        &self,
        distributions: &BTreeMap<PointerNetwork, PointerVars>,
        active: &BTreeSet<PointerNetwork>,
        answers: &[(usize, usize)],
        f1_matrices: &ArrayView3<f32>,
    ) -> Result<Var, ModelError> {
        if active.is_empty() {
            return Err(BatchError::NoActiveNetwork.into());
        }
        if answers.is_empty() {
            return Err(BatchError::EmptyBatch.into());
        }
        let mut loss: Option<Var> = None;
        for network in active {
            let output = distributions
                .get(network)
                .ok_or(BatchError::NoActiveNetwork)?;
            let term = match network {
                PointerNetwork::AnswerSpan => self.mle_term(output, answers)?,
                PointerNetwork::SentenceBoundary => self.f1_term(output, f1_matrices)?,
            };
            loss = Some(match loss {
                Some(loss) => loss.add(&term)?,
                None => term,
            });
        }
        let loss = loss.ok_or(BatchError::NoActiveNetwork)?;
        Ok(loss.scale(1.0 / (answers.len() * active.len()) as f32)?)
    }
}

