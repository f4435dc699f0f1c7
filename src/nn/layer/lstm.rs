/*
 * @Author       : 老董
 * @Date         : 2026-02-12
 * @Description  : LSTM 单元（单步）
 *
 * 公式:
 *   i_t = σ(x_t @ W_ii + h_{t-1} @ W_hi + b_i)   # 输入门
 *   f_t = σ(x_t @ W_if + h_{t-1} @ W_hf + b_f)   # 遗忘门
 *   g_t = tanh(x_t @ W_ig + h_{t-1} @ W_hg + b_g) # 候选细胞
 *   o_t = σ(x_t @ W_io + h_{t-1} @ W_ho + b_o)   # 输出门
 *   c_t = f_t ⊙ c_{t-1} + i_t ⊙ g_t              # 细胞状态
 *   h_t = o_t ⊙ tanh(c_t)                        # 隐藏状态
 *
 * 状态以`Var`传入传出，多个时间步连起来即构成可反向传播的展开图（BPTT）。
 *
 * 与 PyTorch nn.LSTMCell 对齐:
 * - input: [batch, input_size]
 * - hidden: [batch, hidden_size]
 * - cell: [batch, hidden_size]
 *
 * 权重布局（与 PyTorch 不同，每个门的输入/隐藏投影各自独立）:
 * - W_i*: 各 [input_size, hidden_size]，含偏置 b_*: [hidden_size]
 * - W_h*: 各 [hidden_size, hidden_size]，无偏置
 */

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::nn::{Init, Linear, Module, Var, join_name};
use crate::tensor::Tensor;

/// 单个门的参数：输入投影（带偏置）+ 隐藏投影（无偏置）
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Gate {
    input: Linear,
    hidden: Linear,
}

impl Gate {
    fn new(input_size: usize, hidden_size: usize, bias: Init, rng: &mut StdRng) -> Self {
        Self {
            input: Linear::new(input_size, hidden_size, Some(bias), rng),
            hidden: Linear::new(hidden_size, hidden_size, None, rng),
        }
    }

    fn pre_activation(&self, x: &Var, h_prev: &Var) -> Result<Var, ModelError> {
        Ok(self.input.forward(x)?.add(&self.hidden.forward(h_prev)?)?)
    }
}

/// LSTM 单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    input_gate: Gate,
    forget_gate: Gate,
    cell_gate: Gate,
    output_gate: Gate,
    input_size: usize,
    hidden_size: usize,
}

impl LstmCell {
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        Self {
            input_gate: Gate::new(input_size, hidden_size, Init::Zeros, rng),
            // 遗忘门偏置初始化为 1（有助于训练初期记住信息）
            forget_gate: Gate::new(input_size, hidden_size, Init::Ones, rng),
            cell_gate: Gate::new(input_size, hidden_size, Init::Zeros, rng),
            output_gate: Gate::new(input_size, hidden_size, Init::Zeros, rng),
            input_size,
            hidden_size,
        }
    }

    pub const fn input_size(&self) -> usize {
        self.input_size
    }

    pub const fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// 单步前向，返回`(h_t, c_t)`
    pub fn step(&self, x: &Var, h_prev: &Var, c_prev: &Var) -> Result<(Var, Var), ModelError> {
        let i_t = self.input_gate.pre_activation(x, h_prev)?.sigmoid()?;
        let f_t = self.forget_gate.pre_activation(x, h_prev)?.sigmoid()?;
        let g_t = self.cell_gate.pre_activation(x, h_prev)?.tanh()?;
        let o_t = self.output_gate.pre_activation(x, h_prev)?.sigmoid()?;

        let c_t = f_t.mul(c_prev)?.add(&i_t.mul(&g_t)?)?;
        let h_t = o_t.mul(&c_t.tanh()?)?;
        Ok((h_t, c_t))
    }
}

impl Module for LstmCell {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let gates = [
            ("input_gate", &self.input_gate),
            ("forget_gate", &self.forget_gate),
            ("cell_gate", &self.cell_gate),
            ("output_gate", &self.output_gate),
        ];
        gates
            .into_iter()
            .flat_map(|(name, gate)| {
                let gate_prefix = join_name(prefix, name);
                let mut params = gate.input.named_parameters(&join_name(&gate_prefix, "input"));
                params.extend(gate.hidden.named_parameters(&join_name(&gate_prefix, "hidden")));
                params
            })
            .collect()
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let gates = [
            ("input_gate", &mut self.input_gate),
            ("forget_gate", &mut self.forget_gate),
            ("cell_gate", &mut self.cell_gate),
            ("output_gate", &mut self.output_gate),
        ];
        gates
            .into_iter()
            .flat_map(|(name, gate)| {
                let gate_prefix = join_name(prefix, name);
                let mut params = gate
                    .input
                    .named_parameters_mut(&join_name(&gate_prefix, "input"));
                params.extend(
                    gate.hidden
                        .named_parameters_mut(&join_name(&gate_prefix, "hidden")),
                );
                params
            })
            .collect()
    }
}
