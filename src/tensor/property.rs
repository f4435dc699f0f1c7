/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @Description  : 本类仅包含一些属性方法及定阶视图，不包含任何运算方法
 */

use super::Tensor;
use crate::errors::TensorError;
use ndarray::{ArrayView1, ArrayView2, ArrayViewD, ArrayViewMut2, ArrayViewMutD, Ix1, Ix2};

impl Tensor {
    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// 可写视图。仅供外部优化器更新参数使用，前向计算期间不会调用
    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, f32> {
        self.data.view_mut()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 张量的维（dim）数、阶（rank）数
    pub fn dimension(&self) -> usize {
        self.data.ndim()
    }

    /// 计算张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致。如：形状为 [1, 4]，[1, 4]和[4]是不一致的，会返回false
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 转化为纯数（number）。仅当张量只含1个元素时返回Some(number)
    pub fn number(&self) -> Option<f32> {
        if self.size() == 1 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    /// 以1阶视图访问（如偏置向量）
    pub fn as_vector(&self) -> Result<ArrayView1<'_, f32>, TensorError> {
        self.data
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|_| self.rank_mismatch(1))
    }

    /// 以2阶视图访问（如权重矩阵）
    pub fn as_matrix(&self) -> Result<ArrayView2<'_, f32>, TensorError> {
        self.data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| self.rank_mismatch(2))
    }

    /// 以2阶可写视图访问，供初始化后的局部改写使用
    pub fn as_matrix_mut(&mut self) -> Result<ArrayViewMut2<'_, f32>, TensorError> {
        let rank_mismatch = self.rank_mismatch(2);
        self.data
            .view_mut()
            .into_dimensionality::<Ix2>()
            .map_err(|_| rank_mismatch)
    }

    /// 校验形状，`name`仅用于错误提示
    pub fn ensure_shape(&self, name: &str, expected: &[usize]) -> Result<(), TensorError> {
        if self.shape() == expected {
            Ok(())
        } else {
            Err(TensorError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: self.shape().to_vec(),
            })
        }
    }

    fn rank_mismatch(&self, expected: usize) -> TensorError {
        TensorError::RankMismatch {
            expected,
            got: self.dimension(),
            shape: self.shape().to_vec(),
        }
    }
}
