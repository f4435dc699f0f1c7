/*
 * @Author       : 老董
 * @Date         : 2026-02-15
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-28
 * @Description  : 词向量查表：可训练词向量表，以及外部加载的预训练（静态）词向量表
 */

use std::collections::HashMap;
use std::io::BufRead;

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, s};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{BatchError, ConfigError, ModelError, TensorError};
use crate::nn::{Graph, Init, Module, Var, join_name};
use crate::tensor::Tensor;

/// 词向量提供者：`[seq_len, batch]`的词索引 -> `[seq_len, batch, embed_size]`的向量
pub trait EmbeddingProvider {
    fn vocab_size(&self) -> usize;

    fn embed_size(&self) -> usize;

    fn lookup(&self, token_ids: &ArrayView2<usize>) -> Result<Array3<f32>, ModelError>;
}

fn lookup_in_table(table: &Tensor, token_ids: &ArrayView2<usize>) -> Result<Array3<f32>, ModelError> {
    let table = table.as_matrix()?;
    let (vocab_size, embed_size) = table.dim();
    let (seq_len, batch_size) = token_ids.dim();
    let mut vectors = Array3::zeros((seq_len, batch_size, embed_size));
    for ((t, b), &index) in token_ids.indexed_iter() {
        if index >= vocab_size {
            return Err(BatchError::TokenOutOfVocab { index, vocab_size }.into());
        }
        vectors.slice_mut(s![t, b, ..]).assign(&table.row(index));
    }
    Ok(vectors)
}

/// 可训练词向量表，填充符所在行初始化为0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainableEmbedding {
    table: Tensor,
    pad_index: usize,
}

impl TrainableEmbedding {
    pub fn new(vocab_size: usize, embed_size: usize, pad_index: usize, rng: &mut StdRng) -> Self {
        let mut table = Init::Normal { mean: 0.0, std: 1.0 }
            .generate_with_rng(&[vocab_size, embed_size], rng);
        if let Ok(mut matrix) = table.as_matrix_mut() {
            if pad_index < vocab_size {
                matrix.row_mut(pad_index).fill(0.0);
            }
        }
        Self { table, pad_index }
    }

    pub const fn pad_index(&self) -> usize {
        self.pad_index
    }
}

impl EmbeddingProvider for TrainableEmbedding {
    fn vocab_size(&self) -> usize {
        self.table.shape()[0]
    }

    fn embed_size(&self) -> usize {
        self.table.shape()[1]
    }

    fn lookup(&self, token_ids: &ArrayView2<usize>) -> Result<Array3<f32>, ModelError> {
        lookup_in_table(&self.table, token_ids)
    }
}

/// 预训练的静态词向量表（不参与训练）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticEmbedding {
    table: Tensor,
    oov_words: Vec<String>,
}

impl StaticEmbedding {
    pub fn from_table(table: Tensor) -> Result<Self, TensorError> {
        table.as_matrix()?;
        Ok(Self {
            table,
            oov_words: Vec::new(),
        })
    }

    /// 从GloVe文本格式（每行：`词 v1 v2 ... vn`）加载词向量。
    /// 词表中未出现在文件里的词，对应行保持全0并记为未登录词（OOV）
    pub fn from_glove_reader<R: BufRead>(
        reader: R,
        index_to_word: &[String],
        embed_size: usize,
    ) -> Result<Self, ModelError> {
        let word_to_index: HashMap<&str, usize> = index_to_word
            .iter()
            .enumerate()
            .map(|(index, word)| (word.as_str(), index))
            .collect();
        let mut table = Array2::<f32>::zeros((index_to_word.len(), embed_size));
        let mut found = vec![false; index_to_word.len()];

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(word) = fields.next() else {
                continue;
            };
            let Some(&index) = word_to_index.get(word) else {
                continue;
            };
            let vector = fields
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::Parse(format!("词向量文件第{}行：{e}", line_no + 1)))?;
            if vector.len() != embed_size {
                return Err(TensorError::DataLenMismatch {
                    data_len: vector.len(),
                    shape: vec![embed_size],
                }
                .into());
            }
            table.row_mut(index).assign(&ArrayView1::from(&vector[..]));
            found[index] = true;
        }

        let oov_words: Vec<String> = index_to_word
            .iter()
            .zip(&found)
            .filter(|&(_, &hit)| !hit)
            .map(|(word, _)| word.clone())
            .collect();
        tracing::info!(
            vocab_size = index_to_word.len(),
            oov_count = oov_words.len(),
            "预训练词向量加载完毕"
        );
        Ok(Self {
            table: Tensor::from(table),
            oov_words,
        })
    }

    pub fn oov_words(&self) -> &[String] {
        &self.oov_words
    }

    pub fn oov_count(&self) -> usize {
        self.oov_words.len()
    }
}

impl EmbeddingProvider for StaticEmbedding {
    fn vocab_size(&self) -> usize {
        self.table.shape()[0]
    }

    fn embed_size(&self) -> usize {
        self.table.shape()[1]
    }

    fn lookup(&self, token_ids: &ArrayView2<usize>) -> Result<Array3<f32>, ModelError> {
        lookup_in_table(&self.table, token_ids)
    }
}

/// 模型持有的词向量表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Embedding {
    Trainable(TrainableEmbedding),
    Static(StaticEmbedding),
}

impl Embedding {
    pub fn table_shape(&self) -> &[usize] {
        match self {
            Self::Trainable(embedding) => embedding.table.shape(),
            Self::Static(embedding) => embedding.table.shape(),
        }
    }
}

impl Embedding {
    /// 在图上查词向量：[seq_len, batch] -> [seq_len, batch, embed_size]。
    /// 可训练表作为参数进图，梯度按词累加回表中（填充符所在行不回传梯度）；静态表的结果只是常量输入
    pub fn embed(&self, graph: &Graph, token_ids: &ArrayView2<usize>) -> Result<Var, ModelError> {
        let embedding = match self {
            Self::Trainable(embedding) => embedding,
            Self::Static(embedding) => return Ok(graph.input(embedding.lookup(token_ids)?)),
        };
        let (vocab_size, embed_size) = (self.vocab_size(), self.embed_size());
        let (seq_len, batch_size) = token_ids.dim();
        let rows = token_ids
            .iter()
            .map(|&index| match index {
                index if index >= vocab_size => Err(BatchError::TokenOutOfVocab { index, vocab_size }),
                index if index == embedding.pad_index => Ok(None),
                index => Ok(Some(index)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(graph
            .parameter(&embedding.table)
            .gather_rows(rows)?
            .reshape(&[seq_len, batch_size, embed_size])?)
    }
}

impl EmbeddingProvider for Embedding {
    fn vocab_size(&self) -> usize {
        self.table_shape()[0]
    }

    fn embed_size(&self) -> usize {
        self.table_shape()[1]
    }

    fn lookup(&self, token_ids: &ArrayView2<usize>) -> Result<Array3<f32>, ModelError> {
        match self {
            Self::Trainable(embedding) => embedding.lookup(token_ids),
            Self::Static(embedding) => embedding.lookup(token_ids),
        }
    }
}

impl Module for Embedding {
    /// 只有可训练词向量表会导出参数
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        match self {
            Self::Trainable(embedding) => vec![(join_name(prefix, "weight"), &embedding.table)],
            Self::Static(_) => Vec::new(),
        }
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        match self {
            Self::Trainable(embedding) => {
                vec![(join_name(prefix, "weight"), &mut embedding.table)]
            }
            Self::Static(_) => Vec::new(),
        }
    }
}
