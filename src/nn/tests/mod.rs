/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : nn模块测试的公共工具：按名改写参数与数值梯度
 */

use ndarray::ArrayD;

use crate::nn::Module;
use crate::tensor::Tensor;

mod layer_dropout;

/// 按名字改写某个参数的值（形状保持不变）
pub(crate) fn set_param<M: Module>(module: &mut M, name: &str, data: &[f32]) {
    let mut params = module.named_parameters_mut("");
    let (_, tensor) = params
        .iter_mut()
        .find(|(param_name, _)| param_name == name)
        .unwrap_or_else(|| panic!("找不到参数`{name}`"));
    let shape = tensor.shape().to_vec();
    **tensor = Tensor::new(data, &shape).unwrap();
}

fn nudge_param<M: Module>(module: &mut M, name: &str, index: usize, delta: f32) {
    let mut params = module.named_parameters_mut("");
    let (_, tensor) = params
        .iter_mut()
        .find(|(param_name, _)| param_name == name)
        .unwrap_or_else(|| panic!("找不到参数`{name}`"));
    if let Some(x) = tensor.view_mut().iter_mut().nth(index) {
        *x += delta;
    }
}

/// 中心差分求某个参数的数值梯度
pub(crate) fn numeric_grad<M: Module>(module: &mut M, name: &str, loss: impl Fn(&M) -> f32) -> ArrayD<f32> {
    const H: f32 = 1e-2;
    let shape = module
        .named_parameters("")
        .into_iter()
        .find(|(param_name, _)| param_name == name)
        .map(|(_, tensor)| tensor.shape().to_vec())
        .unwrap_or_else(|| panic!("找不到参数`{name}`"));
    let size = shape.iter().product();
    let mut grad = Vec::with_capacity(size);
    for index in 0..size {
        nudge_param(module, name, index, H);
        let plus = loss(module);
        nudge_param(module, name, index, -2.0 * H);
        let minus = loss(module);
        nudge_param(module, name, index, H);
        grad.push((plus - minus) / (2.0 * H));
    }
    ArrayD::from_shape_vec(shape, grad).unwrap()
}
