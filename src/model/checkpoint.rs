/*
 * @Author       : 老董
 * @Date         : 2026-02-19
 * @Description  : 模型存档：`<dir>/epoch_<tag>.bin`（bincode，含配置与全部参数）
 *
 * 加载时先用存档里的配置校验，再逐个核对参数形状，形状不符直接报错。
 */

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ModelError, TensorError};

use super::{MatchLstm, ModelConfig, ModelParams};

#[derive(Serialize)]
struct CheckpointRef<'a> {
    config: &'a ModelConfig,
    params: &'a ModelParams,
}

#[derive(Deserialize)]
struct Checkpoint {
    config: ModelConfig,
    params: ModelParams,
}

/// 按标签（通常为轮次号）存取模型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("epoch_{tag}.bin"))
    }

    /// 保存模型，目录不存在时自动创建；返回写入的文件路径
    pub fn save(&self, model: &MatchLstm, tag: &str) -> Result<PathBuf, ModelError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(tag);
        let mut writer = BufWriter::new(File::create(&path)?);
        let checkpoint = CheckpointRef {
            config: model.config(),
            params: model.params(),
        };
        bincode::serialize_into(&mut writer, &checkpoint)
            .map_err(|e| TensorError::Serialization(e.to_string()))?;
        writer.flush()?;
        tracing::info!(path = %path.display(), num_params = model.num_params(), "模型已保存");
        Ok(path)
    }

    /// 加载模型。加载后的模型处于评估模式
    pub fn load(&self, tag: &str) -> Result<MatchLstm, ModelError> {
        let path = self.path_for(tag);
        let reader = BufReader::new(File::open(&path)?);
        let checkpoint: Checkpoint = bincode::deserialize_from(reader)
            .map_err(|e| TensorError::Serialization(e.to_string()))?;
        let mut model = MatchLstm::from_params(checkpoint.config, checkpoint.params)?;
        model.set_eval_mode();
        tracing::info!(path = %path.display(), "模型已加载");
        Ok(model)
    }
}
