/*
 * @Author       : 老董
 * @Date         : 2026-02-15
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : model模块测试的公共构造：小模型配置、批数据与数值梯度
 */

use ndarray::{Array2, Array3, ArrayD};

use crate::model::{Batch, MatchLstm, ModelConfig, PointerNetwork, SequenceBatch, TokenInput, span_f1_matrix};

mod config;
mod match_layer;
mod match_lstm;

/// 各测试共用的小模型配置
pub(crate) fn small_config() -> ModelConfig {
    ModelConfig {
        vocab_size: 20,
        embed_size: 4,
        hidden_size: 6,
        attention_size: 5,
        num_pos_tags: 2,
        num_preprocessing_layers: 1,
        num_matchlstm_layers: 1,
        num_postprocessing_layers: 1,
        dropout: 0.2,
        f1_loss_multiplier: 1.0,
        f1_loss_threshold: None,
        use_pretrained_embeddings: false,
        pad_index: 0,
        seed: 7,
        debug: false,
    }
}

/// 构造一侧的批数据：有效位置的词索引在[1, vocab_size)内，填充位置为0（填充符）
pub(crate) fn sequence_batch(lengths: &[usize], vocab_size: usize, num_pos_tags: usize, salt: usize) -> SequenceBatch {
    let max_len = lengths.iter().copied().max().unwrap_or(0);
    let batch_size = lengths.len();
    let ids = Array2::from_shape_fn((max_len, batch_size), |(t, b)| {
        if t < lengths[b] {
            (t * 7 + b * 3 + salt) % (vocab_size - 1) + 1
        } else {
            0
        }
    });
    let pos_tags = Array3::from_shape_fn((max_len, batch_size, num_pos_tags), |(t, b, k)| {
        if t < lengths[b] && (t + k + salt) % 2 == 0 {
            1.0
        } else {
            0.0
        }
    });
    SequenceBatch {
        tokens: TokenInput::Ids(ids),
        lengths: lengths.to_vec(),
        pos_tags,
    }
}

/// 构造一个完整的批次，F1矩阵按标准答案计算
pub(crate) fn make_batch(
    config: &ModelConfig,
    passage_lengths: &[usize],
    question_lengths: &[usize],
    answers: &[(usize, usize)],
) -> Batch {
    let passage = sequence_batch(passage_lengths, config.vocab_size, config.num_pos_tags, 0);
    let question = sequence_batch(question_lengths, config.vocab_size, config.num_pos_tags, 5);
    let max_len = passage.max_len();
    let matrices: Vec<Array2<f32>> = passage_lengths
        .iter()
        .zip(answers)
        .map(|(&len, &gold)| span_f1_matrix(max_len, len, gold))
        .collect();
    Batch {
        passage,
        question,
        answers: answers.to_vec(),
        f1_matrices: Batch::stack_f1_matrices(&matrices).unwrap(),
    }
}

fn nudge_param(model: &mut MatchLstm, name: &str, index: usize, delta: f32) {
    for (param_name, tensor) in model.named_parameters_mut() {
        if param_name == name {
            if let Some(v) = tensor.view_mut().iter_mut().nth(index) {
                *v += delta;
            }
        }
    }
}

/// 对名为`name`的参数逐元素做中心差分，得到模型损失的数值梯度（须在评估模式下调用）
pub(crate) fn numeric_grad(
    model: &mut MatchLstm,
    name: &str,
    batch: &Batch,
    networks: &[PointerNetwork],
) -> ArrayD<f32> {
    const H: f32 = 1e-2;
    let shape = model
        .named_parameters()
        .into_iter()
        .find(|(param_name, _)| param_name == name)
        .map(|(_, tensor)| tensor.shape().to_vec())
        .unwrap();
    let mut grad = ArrayD::zeros(shape);
    for (index, g) in grad.iter_mut().enumerate() {
        nudge_param(model, name, index, H);
        let plus = model.forward(batch, networks).unwrap().loss;
        nudge_param(model, name, index, -2.0 * H);
        let minus = model.forward(batch, networks).unwrap().loss;
        nudge_param(model, name, index, H);
        *g = (plus - minus) / (2.0 * H);
    }
    grad
}
