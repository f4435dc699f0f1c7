/*
 * @Author       : 老董
 * @Date         : 2026-02-17
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : Match-LSTM层：输出形状、填充状态为0、批内互不干扰、问题填充无影响、梯度回传
 */

use approx::assert_abs_diff_eq;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Ix3, s};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::errors::{ModelError, TensorError};
use crate::model::MatchLayer;
use crate::nn::{Graph, Mask, Module};
use crate::tensor::Tensor;

const HIDDEN: usize = 6;

fn match_layer() -> MatchLayer {
    let mut rng = StdRng::seed_from_u64(11);
    MatchLayer::new(HIDDEN, 5, &mut rng)
}

fn sequence(max_len: usize, batch_size: usize, seed: f32) -> Array3<f32> {
    Array3::from_shape_fn((max_len, batch_size, HIDDEN), |(t, b, k)| {
        ((t as f32 + 1.0) * 0.53 + b as f32 * 0.9 + k as f32 * 0.17 + seed).cos()
    })
}

/// 前向结果 (h, c)，均为 [Lp, batch, 2·hidden]
#[derive(Debug)]
struct Matched {
    hidden: Array3<f32>,
    cell: Array3<f32>,
}

fn run(
    layer: &MatchLayer,
    passage: ArrayView3<f32>,
    question: ArrayView3<f32>,
    mask: &Mask,
    question_lengths: &[usize],
) -> Result<Matched, ModelError> {
    let graph = Graph::new();
    let output = layer.forward(
        &graph.input(passage.to_owned()),
        &graph.input(question.to_owned()),
        mask,
        question_lengths,
    )?;
    Ok(Matched {
        hidden: output.hidden.value_as::<Ix3>()?,
        cell: output.cell.value_as::<Ix3>()?,
    })
}

fn assert_close(a: &ArrayView2<f32>, b: &ArrayView2<f32>) {
    assert_eq!(a.dim(), b.dim());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-5);
    }
}

#[test]
fn test_match_layer_output_shape() {
    let layer = match_layer();
    let passage = sequence(3, 1, 0.0);
    let question = sequence(2, 1, 1.0);
    let mask = Mask::new(&[3], 3);
    let output = run(&layer, passage.view(), question.view(), &mask, &[2]).unwrap();
    assert_eq!(output.hidden.dim(), (3, 1, HIDDEN));
    assert_eq!(output.cell.dim(), (3, 1, HIDDEN));
    assert!(output.hidden.iter().all(|v| v.is_finite()));
}

#[test]
fn test_match_layer_padded_states_are_zero() {
    let layer = match_layer();
    let passage = sequence(4, 2, 0.3);
    let question = sequence(3, 2, 0.7);
    let mask = Mask::new(&[2, 4], 4);
    let output = run(&layer, passage.view(), question.view(), &mask, &[3, 2]).unwrap();

    // 样本0越过长度2之后，前向、反向的h与c都严格为0
    assert!(output.hidden.slice(s![2.., 0, ..]).iter().all(|&v| v == 0.0));
    assert!(output.cell.slice(s![2.., 0, ..]).iter().all(|&v| v == 0.0));
    assert!(output.hidden.slice(s![..2, 0, ..]).iter().any(|&v| v != 0.0));
    assert!(output.hidden.slice(s![.., 1, ..]).iter().all(|&v| v != 0.0));
}

/// 批内结果与单独计算一致
#[test]
fn test_match_layer_no_cross_contamination() {
    let layer = match_layer();
    let passage = sequence(4, 2, 1.1);
    let question = sequence(3, 2, 2.3);
    let mask = Mask::new(&[2, 4], 4);
    let batched = run(&layer, passage.view(), question.view(), &mask, &[3, 2]).unwrap();

    // 样本1单独计算
    let alone = run(
        &layer,
        passage.slice(s![.., 1..2, ..]),
        question.slice(s![.., 1..2, ..]),
        &Mask::new(&[4], 4),
        &[2],
    )
    .unwrap();
    assert_close(
        &batched.hidden.index_axis(Axis(1), 1),
        &alone.hidden.index_axis(Axis(1), 0),
    );

    // 样本0只取有效前缀单独计算
    let prefix = run(
        &layer,
        passage.slice(s![..2, 0..1, ..]),
        question.slice(s![.., 0..1, ..]),
        &Mask::new(&[2], 2),
        &[3],
    )
    .unwrap();
    assert_close(
        &batched.hidden.slice(s![..2, 0, ..]),
        &prefix.hidden.index_axis(Axis(1), 0),
    );
}

/// 问题的填充内容不影响注意力结果
#[test]
fn test_match_layer_ignores_question_padding() {
    let layer = match_layer();
    let passage = sequence(3, 2, 0.0);
    let question = sequence(4, 2, 0.5);
    let mask = Mask::new(&[3, 3], 3);
    let output = run(&layer, passage.view(), question.view(), &mask, &[4, 1]).unwrap();

    let mut tampered = question.clone();
    tampered.slice_mut(s![1.., 1, ..]).fill(-42.0);
    let tampered_output = run(&layer, passage.view(), tampered.view(), &mask, &[4, 1]).unwrap();
    for t in 0..3 {
        assert_close(
            &output.hidden.index_axis(Axis(0), t),
            &tampered_output.hidden.index_axis(Axis(0), t),
        );
    }
}

#[test]
fn test_match_layer_rejects_wrong_width() {
    let layer = match_layer();
    let passage = Array3::<f32>::zeros((3, 1, HIDDEN + 2));
    let question = sequence(2, 1, 0.0);
    let result = run(&layer, passage.view(), question.view(), &Mask::new(&[3], 3), &[2]);
    crate::assert_err!(result, ModelError::Tensor(TensorError::ShapeMismatch { .. }));
}

/// 梯度不流向段落的填充位置，也不流向问题的填充位置
#[test]
fn test_match_layer_backward_respects_masks() {
    let layer = match_layer();
    let passage = Tensor::from(sequence(4, 2, 0.4));
    let question = Tensor::from(sequence(3, 2, 0.8));
    let graph = Graph::new();
    graph.register_parameters(layer.named_parameters(""));
    let passage_var = graph.parameter(&passage);
    let question_var = graph.parameter(&question);
    let output = layer
        .forward(&passage_var, &question_var, &Mask::new(&[2, 4], 4), &[3, 1])
        .unwrap();
    let weights = graph.input(Array3::from_shape_fn((4, 2, HIDDEN), |(t, b, k)| {
        ((t + 2 * b + k) as f32 * 0.37).sin()
    }));
    output.hidden.mul(&weights).unwrap().sum().unwrap().backward().unwrap();

    let passage_grad = passage_var.grad().unwrap();
    assert!(passage_grad.slice(s![2.., 0, ..]).iter().all(|&g| g == 0.0));
    assert!(passage_grad.slice(s![..2, 0, ..]).iter().any(|&g| g != 0.0));
    let question_grad = question_var.grad().unwrap();
    assert!(question_grad.slice(s![1.., 1, ..]).iter().all(|&g| g == 0.0));
    assert!(question_grad.slice(s![.., 0, ..]).iter().any(|&g| g != 0.0));

    let grads = graph.gradients();
    assert_eq!(grads.len(), layer.named_parameters("").len());
    assert!(grads["cell.forget_gate.input.weight"].view().iter().any(|&g| g != 0.0));
    assert!(grads["attend_question.weight"].view().iter().any(|&g| g != 0.0));
}

#[test]
fn test_match_layer_parameter_names() {
    let layer = match_layer();
    let params = layer.named_parameters("match.0");
    let names: Vec<&str> = params.iter().map(|(name, _)| name.as_str()).collect();
    assert!(names.contains(&"match.0.attend_question.weight"));
    assert!(names.contains(&"match.0.attend_passage.bias"));
    assert!(names.contains(&"match.0.alpha_transform.weight"));
    assert!(names.contains(&"match.0.cell.forget_gate.input.bias"));
    // 问题投影与隐状态投影没有偏置
    assert!(!names.contains(&"match.0.attend_question.bias"));
    assert!(!names.contains(&"match.0.attend_hidden.bias"));
    assert_eq!(params.len(), 1 + 2 + 1 + 2 + 12);
}
