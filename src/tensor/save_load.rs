/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 张量的保存与加载（bincode）
 */

use std::io::{Read, Write};

use super::Tensor;
use crate::errors::TensorError;

// 保存和加载张量
impl Tensor {
    /// 将单个Tensor写入`writer`（bincode格式）
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), TensorError> {
        bincode::serialize_into(writer, &self.data)
            .map_err(|e| TensorError::Serialization(e.to_string()))
    }

    /// 从`reader`加载单个Tensor
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, TensorError> {
        let data =
            bincode::deserialize_from(reader).map_err(|e| TensorError::Serialization(e.to_string()))?;
        Ok(Self { data })
    }
}
