/*
 * @Author       : 老董
 * @Date         : 2026-02-15
 * @Description  : 预编码批数据及其一致性校验；附带成对F1矩阵的构造工具
 *
 * 所有序列张量都按 [seq_len, batch, ...] 排布，批次内按最大长度填充，
 * 每个样本的真实长度单独给出。
 */

use ndarray::{Array2, Array3, ArrayView2, Axis, stack};

use crate::errors::{BatchError, ComparisonOperator, TensorError};

/// 序列的词输入：词索引，或已由外部查好的词向量
#[derive(Debug, Clone)]
pub enum TokenInput {
    /// [max_len, batch]
    Ids(Array2<usize>),
    /// [max_len, batch, embed_size]
    Embedded(Array3<f32>),
}

impl TokenInput {
    pub fn max_len(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.nrows(),
            Self::Embedded(vectors) => vectors.dim().0,
        }
    }

    pub fn batch_size(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.ncols(),
            Self::Embedded(vectors) => vectors.dim().1,
        }
    }
}

/// 一侧（段落或问题）的批数据
#[derive(Debug, Clone)]
pub struct SequenceBatch {
    pub tokens: TokenInput,
    pub lengths: Vec<usize>,
    /// [max_len, batch, num_pos_tags]
    pub pos_tags: Array3<f32>,
}

impl SequenceBatch {
    pub fn max_len(&self) -> usize {
        self.tokens.max_len()
    }

    pub fn batch_size(&self) -> usize {
        self.tokens.batch_size()
    }

    fn validate(
        &self,
        what: &'static str,
        batch_size: usize,
        num_pos_tags: usize,
        embed_size: usize,
    ) -> Result<(), BatchError> {
        let max_len = self.max_len();
        if self.batch_size() != batch_size {
            return Err(BatchError::BatchSizeMismatch {
                what,
                expected: batch_size,
                got: self.batch_size(),
            });
        }
        if self.lengths.len() != batch_size {
            return Err(BatchError::BatchSizeMismatch {
                what: "lengths",
                expected: batch_size,
                got: self.lengths.len(),
            });
        }
        for (example, &len) in self.lengths.iter().enumerate() {
            if len == 0 {
                return Err(BatchError::EmptySequence { what, example });
            }
            if !ComparisonOperator::LessOrEqual.holds(len, max_len) {
                return Err(BatchError::LengthOutOfRange {
                    what,
                    example,
                    len,
                    operator: ComparisonOperator::LessOrEqual,
                    max_len,
                });
            }
        }
        let expected_pos = [max_len, batch_size, num_pos_tags];
        if self.pos_tags.shape() != expected_pos {
            return Err(BatchError::ShapeMismatch {
                what: "pos_tags",
                expected: expected_pos.to_vec(),
                got: self.pos_tags.shape().to_vec(),
            });
        }
        if let TokenInput::Embedded(vectors) = &self.tokens {
            let expected = [max_len, batch_size, embed_size];
            if vectors.shape() != expected {
                return Err(BatchError::ShapeMismatch {
                    what: "embedded tokens",
                    expected: expected.to_vec(),
                    got: vectors.shape().to_vec(),
                });
            }
        }
        Ok(())
    }
}

/// 一个训练/评估批次
#[derive(Debug, Clone)]
pub struct Batch {
    pub passage: SequenceBatch,
    pub question: SequenceBatch,
    /// 每个样本的标准答案区间`(start, end)`，下标从0开始，落在段落有效长度内
    pub answers: Vec<(usize, usize)>,
    /// [batch, max_passage_len, max_passage_len]
    pub f1_matrices: Array3<f32>,
}

impl Batch {
    pub fn batch_size(&self) -> usize {
        self.passage.batch_size()
    }

    /// 前向计算前的整体校验。任何不一致都直接报错，不做截断
    pub fn validate(&self, num_pos_tags: usize, embed_size: usize) -> Result<(), BatchError> {
        let batch_size = self.batch_size();
        if batch_size == 0 {
            return Err(BatchError::EmptyBatch);
        }
        self.passage
            .validate("passage", batch_size, num_pos_tags, embed_size)?;
        self.question
            .validate("question", batch_size, num_pos_tags, embed_size)?;

        if self.answers.len() != batch_size {
            return Err(BatchError::BatchSizeMismatch {
                what: "answers",
                expected: batch_size,
                got: self.answers.len(),
            });
        }
        for (example, (&(start, end), &len)) in
            self.answers.iter().zip(&self.passage.lengths).enumerate()
        {
            if start > end || end >= len {
                return Err(BatchError::InvalidAnswerSpan {
                    example,
                    start,
                    end,
                    len,
                });
            }
        }

        let max_len = self.passage.max_len();
        let expected_f1 = [batch_size, max_len, max_len];
        if self.f1_matrices.shape() != expected_f1 {
            return Err(BatchError::ShapeMismatch {
                what: "f1_matrices",
                expected: expected_f1.to_vec(),
                got: self.f1_matrices.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// 将逐样本的F1矩阵（均为 [max_len, max_len]）堆叠为 [batch, max_len, max_len]
    pub fn stack_f1_matrices(matrices: &[Array2<f32>]) -> Result<Array3<f32>, TensorError> {
        let views: Vec<ArrayView2<f32>> = matrices.iter().map(|matrix| matrix.view()).collect();
        stack(Axis(0), &views).map_err(|e| TensorError::Shape(e.to_string()))
    }
}

/// 计算单个样本的成对F1矩阵：`[s, e]`为区间`(s, e)`与标准答案按词重叠计算的F1。
/// `e < s`或越过有效长度`len`的位置为0
pub fn span_f1_matrix(max_len: usize, len: usize, gold: (usize, usize)) -> Array2<f32> {
    let (gold_start, gold_end) = gold;
    let gold_width = (gold_end + 1).saturating_sub(gold_start) as f32;
    Array2::from_shape_fn((max_len, max_len), |(start, end)| {
        if start > end || end >= len {
            return 0.0;
        }
        let overlap_start = start.max(gold_start);
        let overlap_end = end.min(gold_end);
        if overlap_start > overlap_end {
            return 0.0;
        }
        let overlap = (overlap_end - overlap_start + 1) as f32;
        let precision = overlap / (end - start + 1) as f32;
        let recall = overlap / gold_width;
        2.0 * precision * recall / (precision + recall)
    })
}
