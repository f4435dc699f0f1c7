/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 张量：模型参数的统一载体。
 *                 计算过程直接使用ndarray的定阶视图（见`property.rs`），
 *                 张量本身只负责形状检查、初始化以及（反）序列化
 */

use ndarray::{Array, ArrayD, Dimension, IxDyn};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::TensorError;

mod property;
mod save_load;

#[cfg(test)]
mod tests;

/// 定义张量的结构体。其可以是标量、向量、矩阵或更高维度的数组。
/// 注：参数张量在模型构造后形状固定，只有外部的优化器会改写其数值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    /// 创建一个张量。`data`的长度必须和`shape`中所有元素的乘积相等，否则返回错误。
    pub fn new(data: &[f32], shape: &[usize]) -> Result<Tensor, TensorError> {
        let data = Array::from_shape_vec(IxDyn(shape), data.to_vec()).map_err(|_| {
            TensorError::DataLenMismatch {
                data_len: data.len(),
                shape: shape.to_vec(),
            }
        })?;
        Ok(Tensor { data })
    }

    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Tensor {
        Self::filled(1.0, shape)
    }

    pub fn filled(value: f32, shape: &[usize]) -> Tensor {
        Tensor {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    /// 创建一个服从正态分布的随机张量（Box-Muller变换）
    pub fn new_normal_with_rng(mean: f32, std_dev: f32, shape: &[usize], rng: &mut StdRng) -> Tensor {
        let data = ArrayD::from_shape_simple_fn(IxDyn(shape), || loop {
            // u1取(0, 1]，避免ln(0)
            let u1: f32 = 1.0 - rng.gen_range(0.0..1.0f32);
            let u2: f32 = rng.gen_range(0.0..1.0f32);
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            let z = mean + std_dev * r * theta.cos();
            if z.is_finite() {
                break z;
            }
        });
        Tensor { data }
    }
}

impl<D: Dimension> From<Array<f32, D>> for Tensor {
    fn from(array: Array<f32, D>) -> Self {
        Tensor {
            data: array.into_dyn(),
        }
    }
}
