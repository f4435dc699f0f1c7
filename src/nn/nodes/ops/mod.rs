/*
 * @Author       : 老董
 * @Date         : 2026-02-26
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 各运算节点：前向取值与对父节点的梯度（VJP）
 */

mod add;
mod concat;
mod gather;
mod ln;
mod masked_softmax;
mod mat_mul;
mod multiply;
mod reshape;
mod scalar_multiply;
mod select;
mod sigmoid;
mod stack;
mod sum;
mod tanh;
mod transpose;

pub(crate) use add::Add;
pub(crate) use concat::Concat;
pub(crate) use gather::Gather;
pub(crate) use ln::Ln;
pub(crate) use masked_softmax::MaskedSoftmax;
pub(crate) use mat_mul::MatMul;
pub(crate) use multiply::Multiply;
pub(crate) use reshape::Reshape;
pub(crate) use scalar_multiply::ScalarMultiply;
pub(crate) use select::Select;
pub(crate) use sigmoid::Sigmoid;
pub(crate) use stack::Stack;
pub(crate) use sum::Sum;
pub(crate) use tanh::Tanh;
pub(crate) use transpose::Transpose;
