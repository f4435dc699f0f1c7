/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : Module trait 定义
 */

use crate::tensor::Tensor;

/// 模块 trait
///
/// # 设计原则
/// - `forward()` **不是** trait 方法（各层签名各异）
/// - `new()` **不是** trait 方法（参数各异）
/// - 参数以“带名字的引用”导出，名字形如`match.0.attend_question.weight`，
///   供外部优化器、存档及参数统计使用
pub trait Module {
    /// 获取所有可训练参数（只读）
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)>;

    /// 获取所有可训练参数（可写）。仅供外部梯度更新使用
    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)>;

    /// 获取参数数量
    fn num_params(&self) -> usize {
        self.named_parameters("")
            .iter()
            .map(|(_, tensor)| tensor.size())
            .sum()
    }
}

/// 拼接参数名前缀
pub fn join_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
