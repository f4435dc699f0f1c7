//! # Match LSTM
//!
//! 用纯rust实现的抽取式阅读理解模型核心：给定段落与问题，预测答案在段落中的起止位置。
//!
//! - 双向多层LSTM编码器（变长批处理，填充位置不影响结果）；
//! - 双向Match-LSTM匹配层，逐词把问题表示融入段落表示；
//! - 双向边界指针网络（句子边界、答案区间两个独立网络）；
//! - 极大似然损失 + F1加权的软损失；
//! - 动态计算图：前向计算时记录，`ModelOutput::backward`按参数名返回梯度。
//!
//! 参数更新（优化器、学习率调度等）由外部驱动完成。

pub mod errors;
pub mod model;
pub mod nn;
pub mod tensor;
pub mod utils;

pub use model::{Batch, MatchLstm, ModelConfig, ModelOutput, PointerNetwork, PointerOutput};
