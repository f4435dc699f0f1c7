/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : 参数初始化策略。所有随机初始化都走调用方传入的`StdRng`，同一种子得到同一组参数
 */

use rand::rngs::StdRng;

use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    Zeros,
    /// LSTM遗忘门偏置用
    Ones,
    /// 词向量表用
    Normal { mean: f32, std: f32 },
    /// Xavier/Glorot正态初始化，形状按`[fan_in, fan_out]`解读（与`Linear`的权重布局一致）
    Xavier,
}

impl Init {
    pub fn generate_with_rng(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match *self {
            Self::Zeros => Tensor::zeros(shape),
            Self::Ones => Tensor::ones(shape),
            Self::Normal { mean, std } => Tensor::new_normal_with_rng(mean, std, shape, rng),
            Self::Xavier => {
                let fan_in = shape.first().copied().unwrap_or(1);
                let fan_out = shape.get(1).copied().unwrap_or(1);
                let std = (2.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Tensor::new_normal_with_rng(0.0, std, shape, rng)
            }
        }
    }
}
