/*
 * @Author       : 老董
 * @Date         : 2026-02-13
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : Dropout层：训练/评估模式与反向传播
 */

use crate::nn::{Dropout, Graph};
use ndarray::{Array2, Ix2};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_dropout_is_identity_in_eval_mode() {
    let mut rng = StdRng::seed_from_u64(0);
    let graph = Graph::new();
    let x = Array2::from_elem((4, 5), 2.0f32);
    let y = Dropout::new(0.5)
        .forward(&graph.input(x.clone()), false, &mut rng)
        .unwrap();
    assert_eq!(y.value_as::<Ix2>().unwrap(), x);
    // 推理模式下不新建节点
    assert_eq!(graph.num_nodes(), 1);
}

#[test]
fn test_dropout_zero_probability() {
    let mut rng = StdRng::seed_from_u64(0);
    let graph = Graph::new();
    let x = Array2::from_elem((3, 3), 1.5f32);
    let y = Dropout::new(0.0)
        .forward(&graph.input(x.clone()), true, &mut rng)
        .unwrap();
    assert_eq!(y.value_as::<Ix2>().unwrap(), x);
}

#[test]
fn test_dropout_scales_kept_units() {
    let mut rng = StdRng::seed_from_u64(9);
    let graph = Graph::new();
    let x = graph.input(Array2::from_elem((100, 100), 1.0f32));
    let y = Dropout::new(0.25).forward(&x, true, &mut rng).unwrap().value().unwrap();
    // 保留的单元被放大为 1/(1-p)，其余为0
    assert!(
        y.iter()
            .all(|&v| v == 0.0 || (v - 1.0 / 0.75).abs() < 1e-6)
    );
    let dropped = y.iter().filter(|&&v| v == 0.0).count() as f32 / y.len() as f32;
    assert!((dropped - 0.25).abs() < 0.03);
}

/// 梯度只流向保留的单元
#[test]
fn test_dropout_backward_follows_mask() {
    let mut rng = StdRng::seed_from_u64(4);
    let graph = Graph::new();
    let weights = crate::tensor::Tensor::ones(&[10, 10]);
    let x = graph.parameter(&weights);
    let y = Dropout::new(0.5).forward(&x, true, &mut rng).unwrap();
    y.sum().unwrap().backward().unwrap();
    let grad = x.grad().unwrap();
    assert_eq!(grad, y.value().unwrap());
}
