/*
 * @Author       : 老董
 * @Date         : 2026-02-18
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 从指针网络的输出中解码答案区间
 */

use ndarray::{Array1, ArrayView1};

use crate::errors::{BatchError, ComparisonOperator};

use super::pointer::PointerOutput;

/// 单个样本的最佳答案区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanPrediction {
    pub start: usize,
    pub end: usize,
    /// 起点概率与终点概率之积
    pub score: f32,
}

/// 前后两个方向的分布取几何平均
fn combine(forward: ArrayView1<f32>, backward: ArrayView1<f32>) -> Array1<f32> {
    let mut combined = forward.to_owned();
    combined.zip_mut_with(&backward, |f, &b| *f = (*f * b).sqrt());
    combined
}

/// 对每个样本选出得分最高的`(start, end)`，满足`start <= end < len`且`end - start < max_answer_len`。
/// `max_answer_len`为`None`时不限制区间宽度；为`Some(0)`时报错
pub fn decode_spans(
    output: &PointerOutput,
    lengths: &[usize],
    max_answer_len: Option<usize>,
) -> Result<Vec<SpanPrediction>, BatchError> {
    if let Some(got) = max_answer_len.filter(|&len| !ComparisonOperator::GreaterOrEqual.holds(len, 1)) {
        return Err(BatchError::InvalidMaxAnswerLen {
            operator: ComparisonOperator::GreaterOrEqual,
            got,
        });
    }
    let (batch_size, max_len) = output.forward_start().dim();
    if lengths.len() != batch_size {
        return Err(BatchError::BatchSizeMismatch {
            what: "decode lengths",
            expected: batch_size,
            got: lengths.len(),
        });
    }

    let mut predictions = Vec::with_capacity(batch_size);
    for (i, &len) in lengths.iter().enumerate() {
        if len == 0 {
            return Err(BatchError::EmptySequence {
                what: "decode passage",
                example: i,
            });
        }
        if !ComparisonOperator::LessOrEqual.holds(len, max_len) {
            return Err(BatchError::LengthOutOfRange {
                what: "decode passage",
                example: i,
                len,
                operator: ComparisonOperator::LessOrEqual,
                max_len,
            });
        }
        let start_probs = combine(output.forward_start().row(i), output.backward_start().row(i));
        let end_probs = combine(output.forward_end().row(i), output.backward_end().row(i));
        let width = max_answer_len.unwrap_or(len);

        let mut best = SpanPrediction {
            start: 0,
            end: 0,
            score: f32::NEG_INFINITY,
        };
        for start in 0..len {
            let last = (start + width).min(len);
            for end in start..last {
                let score = start_probs[start] * end_probs[end];
                if score > best.score {
                    best = SpanPrediction { start, end, score };
                }
            }
        }
        predictions.push(best);
    }
    Ok(predictions)
}
