/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 全库错误类型：张量、计算图、配置、批数据四类错误，以及汇总用的`ModelError`
 */

use thiserror::Error;
mod ops;
pub use self::ops::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    #[error("张量阶数不符：期望{expected}阶，实际为{got}阶（形状{shape:?}）")]
    RankMismatch {
        expected: usize,
        got: usize,
        shape: Vec<usize>,
    },
    #[error("张量形状不一致：期望{expected:?}，实际为{got:?}（{name}）")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("数据长度{data_len}与形状{shape:?}不匹配")]
    DataLenMismatch { data_len: usize, shape: Vec<usize> },
    #[error("张量形状错误：{0}")]
    Shape(String),
    #[error("张量（反）序列化失败：{0}")]
    Serialization(String),
}

/// 计算图错误：节点构建（形状检查）与反向传播阶段
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("{op}节点的输入形状不兼容：{left:?}与{right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },
    #[error("非法操作：{0}")]
    InvalidOperation(String),
    #[error("计算错误：{0}")]
    ComputationError(String),
}

/// 模型配置错误。均在构造阶段抛出，不会产生“半成品”模型
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("配置项`{name}`须{operator}{threshold}，实际为{value}")]
    ValueMustSatisfyComparison {
        name: &'static str,
        operator: ComparisonOperator,
        threshold: f64,
        value: f64,
    },
    #[error("隐藏层维度`hidden_size`须为偶数（双向各占一半），实际为{0}")]
    OddHiddenSize(usize),
    #[error("嵌入表规模不符：期望[{vocab_size}, {embed_size}]，实际为{got:?}")]
    EmbeddingShapeMismatch {
        vocab_size: usize,
        embed_size: usize,
        got: Vec<usize>,
    },
    #[error("词表中缺少填充符索引{0}")]
    PadIndexOutOfVocab(usize),
    #[error("配置要求使用预训练词向量，但未提供词向量表")]
    MissingPretrainedEmbeddings,
    #[error("配置文件解析失败：{0}")]
    Parse(String),
}

/// 批数据错误。在前向计算开始前统一校验，绝不静默截断
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BatchError {
    #[error("批大小不一致：{what}为{got}，期望{expected}")]
    BatchSizeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{what}的第{example}个样本长度{len}须{operator}填充长度{max_len}")]
    LengthOutOfRange {
        what: &'static str,
        example: usize,
        len: usize,
        operator: ComparisonOperator,
        max_len: usize,
    },
    #[error("{what}的第{example}个样本长度为0（本库拒绝空序列）")]
    EmptySequence { what: &'static str, example: usize },
    #[error("{what}形状不符：期望{expected:?}，实际为{got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("第{example}个样本的答案区间({start}, {end})不合法（段落有效长度{len}）")]
    InvalidAnswerSpan {
        example: usize,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("词索引{index}超出词表大小{vocab_size}")]
    TokenOutOfVocab { index: usize, vocab_size: usize },
    #[error("至少需要激活一个指针网络")]
    NoActiveNetwork,
    #[error("批为空")]
    EmptyBatch,
    #[error("答案最大长度须{operator}1，实际为{got}")]
    InvalidMaxAnswerLen {
        operator: ComparisonOperator,
        got: usize,
    },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("读写模型文件失败：{0}")]
    Io(#[from] std::io::Error),
}
