/*
 * @Author       : 老董
 * @Date         : 2026-02-15
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 模型配置：JSON加载、默认值与各项取值校验
 */

use std::io::Write;

use super::small_config;
use crate::errors::{ComparisonOperator, ConfigError, ModelError};
use crate::model::ModelConfig;

const MINIMAL_JSON: &str = r#"{
    "vocab_size": 100,
    "embed_size": 8,
    "hidden_size": 10,
    "attention_size": 6,
    "num_pos_tags": 3,
    "num_preprocessing_layers": 1,
    "num_matchlstm_layers": 2,
    "num_postprocessing_layers": 1,
    "dropout": 0.3,
    "f1_loss_multiplier": 2.0
}"#;

#[test]
fn test_config_from_json_uses_defaults() {
    let config = ModelConfig::from_json_str(MINIMAL_JSON).unwrap();
    assert_eq!(config.vocab_size, 100);
    assert_eq!(config.num_matchlstm_layers, 2);
    assert_eq!(config.half_hidden(), 5);
    assert_eq!(config.f1_loss_threshold, None);
    assert!(!config.use_pretrained_embeddings);
    assert_eq!(config.pad_index, 0);
    assert_eq!(config.seed, 0);
    assert!(!config.debug);
}

#[test]
fn test_config_json_round_trip() {
    let mut config = small_config();
    config.f1_loss_threshold = Some(0.5);
    config.debug = true;
    let json = config.to_json_string().unwrap();
    assert_eq!(ModelConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn test_config_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL_JSON.as_bytes()).unwrap();
    let config = ModelConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.hidden_size, 10);

    let missing = ModelConfig::from_json_file(file.path().with_extension("missing"));
    crate::assert_err!(missing, ModelError::Io(_));
}

#[test]
fn test_config_parse_error() {
    crate::assert_err!(ModelConfig::from_json_str("{"), ConfigError::Parse(_));
    // 缺少必填字段
    crate::assert_err!(
        ModelConfig::from_json_str(r#"{"vocab_size": 3}"#),
        ConfigError::Parse(_)
    );
}

#[test]
fn test_config_rejects_odd_hidden_size() {
    let mut config = small_config();
    config.hidden_size = 7;
    crate::assert_err!(config.validate(), ConfigError::OddHiddenSize(7) => "偶数");
}

#[test]
fn test_config_rejects_zero_sizes() {
    let mut config = small_config();
    config.hidden_size = 0;
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison { name: "hidden_size", .. }
    );

    let mut config = small_config();
    config.num_matchlstm_layers = 0;
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison {
            name: "num_matchlstm_layers",
            operator: ComparisonOperator::GreaterOrEqual,
            ..
        }
    );
}

#[test]
fn test_config_rejects_bad_dropout() {
    let mut config = small_config();
    config.dropout = 1.0;
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison {
            name: "dropout",
            operator: ComparisonOperator::LessThan,
            ..
        }
    );

    config.dropout = -0.1;
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison {
            name: "dropout",
            operator: ComparisonOperator::GreaterOrEqual,
            ..
        }
    );

    config.dropout = f32::NAN;
    crate::assert_err!(config.validate());

    config.dropout = 0.0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_rejects_negative_f1_multiplier_and_bad_pad_index() {
    let mut config = small_config();
    config.f1_loss_multiplier = -1.0;
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison { name: "f1_loss_multiplier", .. }
    );

    let mut config = small_config();
    config.pad_index = config.vocab_size;
    assert_eq!(config.validate(), Err(ConfigError::PadIndexOutOfVocab(20)));
}

#[test]
fn test_config_f1_threshold_range() {
    let mut config = small_config();
    for threshold in [0.5, 1.0, 1e-3] {
        config.f1_loss_threshold = Some(threshold);
        assert!(config.validate().is_ok());
    }

    for threshold in [0.0, -1.0] {
        config.f1_loss_threshold = Some(threshold);
        crate::assert_err!(
            config.validate(),
            ConfigError::ValueMustSatisfyComparison {
                name: "f1_loss_threshold",
                operator: ComparisonOperator::GreaterThan,
                ..
            }
        );
    }

    config.f1_loss_threshold = Some(1.5);
    crate::assert_err!(
        config.validate(),
        ConfigError::ValueMustSatisfyComparison {
            name: "f1_loss_threshold",
            operator: ComparisonOperator::LessOrEqual,
            ..
        }
    );

    config.f1_loss_threshold = Some(f32::NAN);
    crate::assert_err!(config.validate());

    // JSON加载时同样校验
    let json = MINIMAL_JSON.replace("\"f1_loss_multiplier\": 2.0", "\"f1_loss_multiplier\": 2.0, \"f1_loss_threshold\": 0.0");
    crate::assert_err!(
        ModelConfig::from_json_str(&json),
        ConfigError::ValueMustSatisfyComparison { name: "f1_loss_threshold", .. }
    );
}
