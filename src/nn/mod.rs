/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-26
 * @Description  : 负责神经网络（neural network）的基础构件：计算图、初始化、层、掩码与序列编码器
 */

mod encoder;
mod graph;
mod init;
pub mod layer;
mod mask;
mod module;
mod nodes;
mod var;

pub use encoder::BiLstmEncoder;
pub use graph::Graph;
pub use init::Init;
pub use layer::{Dropout, Linear, LstmCell};
pub use mask::{Mask, attention_pool, masked_softmax};
pub use module::{Module, join_name};
pub use nodes::NodeId;
pub use var::Var;

#[cfg(test)]
mod tests;
