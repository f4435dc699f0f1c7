/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : Layer 模块 - 模型用到的基础层（全连接、LSTM单元、Dropout）
 */

mod dropout;
mod linear;
mod lstm;

pub use dropout::Dropout;
pub use linear::Linear;
pub use lstm::LstmCell;
