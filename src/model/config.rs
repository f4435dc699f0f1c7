/*
 * @Author       : 老董
 * @Date         : 2026-02-15
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 模型超参数配置（可由JSON加载），构造模型前统一校验
 */

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ComparisonOperator, ConfigError, ModelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub embed_size: usize,
    /// 双向表示的总宽度，前向、反向各占一半，须为偶数
    pub hidden_size: usize,
    pub attention_size: usize,
    /// 词性特征维度，直接拼接在词向量之后；可为0
    pub num_pos_tags: usize,
    pub num_preprocessing_layers: usize,
    pub num_matchlstm_layers: usize,
    pub num_postprocessing_layers: usize,
    pub dropout: f32,
    pub f1_loss_multiplier: f32,
    /// 为`Some(t)`时，F1矩阵先二值化：`f1 >= t`记为1，否则为0。须满足`0 < t <= 1`
    #[serde(default)]
    pub f1_loss_threshold: Option<f32>,
    /// 使用外部提供的预训练（静态）词向量表
    #[serde(default)]
    pub use_pretrained_embeddings: bool,
    #[serde(default)]
    pub pad_index: usize,
    #[serde(default)]
    pub seed: u64,
    /// 打开后按阶段输出耗时（`tracing::debug!`）
    #[serde(default)]
    pub debug: bool,
}

impl ModelConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 单个方向的隐藏维度
    pub const fn half_hidden(&self) -> usize {
        self.hidden_size / 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        use ComparisonOperator::{GreaterOrEqual, GreaterThan, LessOrEqual, LessThan};

        let mut checks = vec![
            ("vocab_size", self.vocab_size as f64, GreaterOrEqual, 1.0),
            ("embed_size", self.embed_size as f64, GreaterOrEqual, 1.0),
            ("hidden_size", self.hidden_size as f64, GreaterOrEqual, 1.0),
            ("attention_size", self.attention_size as f64, GreaterOrEqual, 1.0),
            ("num_preprocessing_layers", self.num_preprocessing_layers as f64, GreaterOrEqual, 1.0),
            ("num_matchlstm_layers", self.num_matchlstm_layers as f64, GreaterOrEqual, 1.0),
            ("num_postprocessing_layers", self.num_postprocessing_layers as f64, GreaterOrEqual, 1.0),
            ("dropout", f64::from(self.dropout), GreaterOrEqual, 0.0),
            ("dropout", f64::from(self.dropout), LessThan, 1.0),
            ("f1_loss_multiplier", f64::from(self.f1_loss_multiplier), GreaterOrEqual, 0.0),
        ];
        // t <= 0 时所有F1都会被置1，t > 1 时都会被置0
        if let Some(threshold) = self.f1_loss_threshold {
            checks.push(("f1_loss_threshold", f64::from(threshold), GreaterThan, 0.0));
            checks.push(("f1_loss_threshold", f64::from(threshold), LessOrEqual, 1.0));
        }
        for (name, value, operator, threshold) in checks {
            if !operator.holds(value, threshold) {
                return Err(ConfigError::ValueMustSatisfyComparison {
                    name,
                    operator,
                    threshold,
                    value,
                });
            }
        }
        if self.hidden_size % 2 != 0 {
            return Err(ConfigError::OddHiddenSize(self.hidden_size));
        }
        if self.pad_index >= self.vocab_size {
            return Err(ConfigError::PadIndexOutOfVocab(self.pad_index));
        }
        Ok(())
    }
}
