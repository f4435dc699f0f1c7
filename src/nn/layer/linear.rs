/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : Linear (全连接) 层：`output = x @ W + b`
 *
 * 输入可以是任意阶的 [..., in_features]，前面各维视作行：
 * 序列张量 [seq_len, batch, in_features] 一次乘法即可完成所有时间步的投影，
 * 注意力打分里“只对一个序列做一次投影，再在每个时间步复用”正是这样做的。
 */

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, TensorError};
use crate::nn::{Init, Module, Var, join_name};
use crate::tensor::Tensor;

/// Linear (全连接) 层
///
/// # 输入/输出形状
/// - `forward`：[..., in_features] -> [..., out_features]
/// - `score`：[..., in_features] -> [...]（仅限`out_features == 1`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    /// 权重参数 [in_features, out_features]
    weights: Tensor,
    /// 偏置参数 [out_features]（可选）
    bias: Option<Tensor>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// 创建新的 Linear 层。权重用Xavier初始化；`bias`为`None`时不使用偏置
    pub fn new(in_features: usize, out_features: usize, bias: Option<Init>, rng: &mut StdRng) -> Self {
        let weights = Init::Xavier.generate_with_rng(&[in_features, out_features], rng);
        let bias = bias.map(|init| init.generate_with_rng(&[out_features], rng));
        Self {
            weights,
            bias,
            in_features,
            out_features,
        }
    }

    /// 用给定的参数张量构建，形状不符时报错
    pub fn from_tensors(weights: Tensor, bias: Option<Tensor>) -> Result<Self, TensorError> {
        let (in_features, out_features) = weights.as_matrix()?.dim();
        if let Some(bias) = &bias {
            bias.ensure_shape("bias", &[out_features])?;
        }
        Ok(Self {
            weights,
            bias,
            in_features,
            out_features,
        })
    }

    pub const fn in_features(&self) -> usize {
        self.in_features
    }

    pub const fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn forward(&self, x: &Var) -> Result<Var, ModelError> {
        let shape = x.shape();
        if shape.last() != Some(&self.in_features) {
            let mut expected = shape.clone();
            if let Some(last) = expected.last_mut() {
                *last = self.in_features;
            }
            return Err(TensorError::ShapeMismatch {
                name: "linear input".to_string(),
                expected,
                got: shape,
            }
            .into());
        }
        let graph = x.graph();
        let output = x.matmul(&graph.parameter(&self.weights))?;
        match &self.bias {
            Some(bias) => Ok(output.add(&graph.parameter(bias))?),
            None => Ok(output),
        }
    }

    /// 输出维度为1的打分层专用，去掉最后一维：如 [seq_len, batch, in] -> [seq_len, batch]
    pub fn score(&self, x: &Var) -> Result<Var, ModelError> {
        if self.out_features != 1 {
            return Err(TensorError::ShapeMismatch {
                name: "score weights".to_string(),
                expected: vec![self.in_features, 1],
                got: self.weights.shape().to_vec(),
            }
            .into());
        }
        let output = self.forward(x)?;
        let shape = output.shape();
        Ok(output.reshape(&shape[..shape.len() - 1])?)
    }
}

impl Module for Linear {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let mut params = vec![(join_name(prefix, "weight"), &self.weights)];
        if let Some(bias) = &self.bias {
            params.push((join_name(prefix, "bias"), bias));
        }
        params
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let mut params = vec![(join_name(prefix, "weight"), &mut self.weights)];
        if let Some(bias) = &mut self.bias {
            params.push((join_name(prefix, "bias"), bias));
        }
        params
    }
}
