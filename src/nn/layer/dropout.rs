/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @LastEditors  : 老董
 * @LastEditTime : 2026-02-27
 * @Description  : Dropout 层（inverted dropout：训练时按`1/(1-p)`放大保留的单元，推理时恒等）
 */

use ndarray::ArrayD;
use rand::Rng;
use rand::rngs::StdRng;

use crate::errors::GraphError;
use crate::nn::Var;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    /// `p`为丢弃概率，取值范围[0, 1)，由配置校验保证
    pub const fn new(p: f32) -> Self {
        Self { p }
    }

    pub const fn p(&self) -> f32 {
        self.p
    }

    /// 训练模式下乘以随机的缩放掩码（作为常量输入进图，梯度只流向保留的单元）
    pub fn forward(&self, x: &Var, is_train_mode: bool, rng: &mut StdRng) -> Result<Var, GraphError> {
        if !is_train_mode || self.p <= 0.0 {
            return Ok(x.clone());
        }
        let keep = 1.0 - self.p;
        let mask = ArrayD::from_shape_simple_fn(x.shape(), || {
            if rng.gen_bool(f64::from(keep)) {
                1.0 / keep
            } else {
                0.0
            }
        });
        x.mul(&x.graph().input(mask))
    }
}
