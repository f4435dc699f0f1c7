/*
 * @Author       : 老董
 * @Date         : 2026-02-19
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 整个模型：前向输出、训练/评估模式、参数清单、构造错误与反向传播梯度
 */

use approx::assert_abs_diff_eq;
use ndarray::{Array3, s};

use super::{make_batch, numeric_grad, small_config};
use crate::errors::{BatchError, ConfigError, ModelError};
use crate::model::{EmbeddingProvider, MatchLstm, PointerNetwork, StaticEmbedding, TokenInput};
use crate::tensor::Tensor;

#[test]
fn test_match_passage_shape() {
    let mut config = small_config();
    config.num_preprocessing_layers = 1;
    config.num_matchlstm_layers = 1;
    let mut model = MatchLstm::new(config.clone()).unwrap();
    model.set_eval_mode();
    let batch = make_batch(&config, &[3], &[2], &[(0, 1)]);
    let (matched, question) = model.match_passage(&batch).unwrap();
    assert_eq!(matched.dim(), (3, 1, config.hidden_size));
    assert_eq!(question.dim(), (2, 1, config.hidden_size));
}

#[test]
fn test_forward_outputs() {
    let mut config = small_config();
    config.num_matchlstm_layers = 2;
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let batch = make_batch(&config, &[5, 3, 4], &[2, 4, 1], &[(1, 3), (0, 0), (2, 3)]);
    let output = model.forward(&batch, &PointerNetwork::ALL).unwrap();

    assert!(output.loss.is_finite());
    assert!(output.loss > 0.0);
    assert_eq!(output.distributions.len(), 2);
    for network in PointerNetwork::ALL {
        let dist = output.get(network).unwrap();
        for probs in [
            dist.forward_start(),
            dist.forward_end(),
            dist.backward_end(),
            dist.backward_start(),
        ] {
            assert_eq!(probs.dim(), (3, 5));
            for (i, &len) in batch.passage.lengths.iter().enumerate() {
                assert_abs_diff_eq!(probs.row(i).slice(s![..len]).sum(), 1.0, epsilon = 1e-5);
                assert!(probs.row(i).slice(s![len..]).iter().all(|&p| p == 0.0));
            }
        }
    }
}

#[test]
fn test_forward_only_returns_active_networks() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let batch = make_batch(&config, &[3, 2], &[2, 2], &[(0, 1), (1, 1)]);
    let output = model.forward(&batch, &[PointerNetwork::AnswerSpan]).unwrap();
    assert!(output.get(PointerNetwork::AnswerSpan).is_some());
    assert!(output.get(PointerNetwork::SentenceBoundary).is_none());
}

/// 激活网络的顺序与重复项不影响损失
#[test]
fn test_forward_loss_ignores_selector_order() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    model.set_eval_mode();
    let batch = make_batch(&config, &[4, 2], &[3, 2], &[(0, 2), (1, 1)]);
    let a = model
        .forward(&batch, &[PointerNetwork::AnswerSpan, PointerNetwork::SentenceBoundary])
        .unwrap();
    let b = model
        .forward(
            &batch,
            &[
                PointerNetwork::SentenceBoundary,
                PointerNetwork::AnswerSpan,
                PointerNetwork::SentenceBoundary,
            ],
        )
        .unwrap();
    assert_eq!(a.loss, b.loss);
}

#[test]
fn test_forward_requires_active_network() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let batch = make_batch(&config, &[3], &[2], &[(0, 1)]);
    crate::assert_err!(
        model.forward(&batch, &[]),
        ModelError::Batch(BatchError::NoActiveNetwork) => "指针网络"
    );
}

#[test]
fn test_forward_rejects_malformed_batch() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let mut batch = make_batch(&config, &[3, 2], &[2, 2], &[(0, 1), (1, 1)]);
    batch.passage.lengths[0] = 0;
    crate::assert_err!(
        model.forward(&batch, &PointerNetwork::ALL),
        ModelError::Batch(BatchError::EmptySequence { what: "passage", example: 0 })
    );
}

/// 评估模式结果确定；训练模式下dropout改变结果
#[test]
fn test_train_and_eval_mode() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    assert!(model.is_train_mode());
    let batch = make_batch(&config, &[4, 3], &[3, 2], &[(0, 2), (1, 1)]);

    model.set_eval_mode();
    assert!(!model.is_train_mode());
    let eval_a = model.forward(&batch, &PointerNetwork::ALL).unwrap();
    let eval_b = model.forward(&batch, &PointerNetwork::ALL).unwrap();
    assert_eq!(eval_a.loss, eval_b.loss);

    model.set_train_mode();
    let train = model.forward(&batch, &PointerNetwork::ALL).unwrap();
    assert_ne!(train.loss, eval_a.loss);
}

/// 直接给出词向量与按词索引查表结果一致
#[test]
fn test_pre_embedded_input_matches_ids() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    model.set_eval_mode();
    let batch = make_batch(&config, &[3, 2], &[2, 2], &[(0, 1), (1, 1)]);
    let expected = model.forward(&batch, &PointerNetwork::ALL).unwrap();

    let mut embedded = batch.clone();
    for side in [&mut embedded.passage, &mut embedded.question] {
        if let TokenInput::Ids(ids) = &side.tokens {
            let vectors = model.params().embedding().lookup(&ids.view()).unwrap();
            side.tokens = TokenInput::Embedded(vectors);
        }
    }
    let got = model.forward(&embedded, &PointerNetwork::ALL).unwrap();
    assert_eq!(expected.loss, got.loss);
}

#[test]
fn test_same_seed_same_parameters() {
    let config = small_config();
    let a = MatchLstm::new(config.clone()).unwrap();
    let b = MatchLstm::new(config.clone()).unwrap();
    assert_eq!(a.named_parameters(), b.named_parameters());

    let mut other = config;
    other.seed += 1;
    let c = MatchLstm::new(other).unwrap();
    assert_ne!(a.named_parameters(), c.named_parameters());
}

#[test]
fn test_parameter_inventory() {
    let mut config = small_config();
    config.num_matchlstm_layers = 2;
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let names: Vec<String> = model
        .named_parameters()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(names.contains(&"embedding.weight".to_string()));
    assert!(names.contains(&"preprocessing.0.forward.input_gate.input.weight".to_string()));
    assert!(names.contains(&"match.0.attend_question.weight".to_string()));
    assert!(names.contains(&"match.1.cell.forget_gate.input.bias".to_string()));
    assert!(names.contains(&"postprocessing.0.backward.cell_gate.hidden.weight".to_string()));
    assert!(names.contains(&"sentence_pointer.forward.attend_input.weight".to_string()));
    assert!(names.contains(&"span_pointer.backward.beta_transform.bias".to_string()));

    let total: usize = model.named_parameters().iter().map(|(_, t)| t.size()).sum();
    assert_eq!(model.num_params(), total);
    assert!(total > config.vocab_size * config.embed_size);

    // 外部驱动可按名字改写参数
    for (_, tensor) in model.named_parameters_mut() {
        *tensor = Tensor::zeros(tensor.shape());
    }
    assert!(model
        .named_parameters()
        .iter()
        .all(|(_, t)| t.view().iter().all(|&v| v == 0.0)));
}

#[test]
fn test_construction_errors() {
    let mut config = small_config();
    config.use_pretrained_embeddings = true;
    crate::assert_err!(
        MatchLstm::new(config.clone()),
        ModelError::Config(ConfigError::MissingPretrainedEmbeddings)
    );

    let table = Tensor::zeros(&[config.vocab_size + 1, config.embed_size]);
    let embedding = StaticEmbedding::from_table(table).unwrap();
    crate::assert_err!(
        MatchLstm::with_pretrained(config.clone(), embedding),
        ModelError::Config(ConfigError::EmbeddingShapeMismatch { .. })
    );

    config.use_pretrained_embeddings = false;
    config.f1_loss_threshold = Some(0.0);
    crate::assert_err!(
        MatchLstm::new(config.clone()),
        ModelError::Config(ConfigError::ValueMustSatisfyComparison { name: "f1_loss_threshold", .. })
    );

    config.f1_loss_threshold = None;
    config.hidden_size = 5;
    crate::assert_err!(
        MatchLstm::new(config),
        ModelError::Config(ConfigError::OddHiddenSize(5))
    );
}

#[test]
fn test_pretrained_embeddings_are_not_parameters() {
    let mut config = small_config();
    config.use_pretrained_embeddings = true;
    let table = Tensor::filled(0.1, &[config.vocab_size, config.embed_size]);
    let embedding = StaticEmbedding::from_table(table).unwrap();
    let mut model = MatchLstm::with_pretrained(config.clone(), embedding).unwrap();
    assert!(model
        .named_parameters()
        .iter()
        .all(|(name, _)| !name.starts_with("embedding")));

    let batch = make_batch(&config, &[3], &[2], &[(1, 2)]);
    let output = model.forward(&batch, &[PointerNetwork::SentenceBoundary]).unwrap();
    assert!(output.loss.is_finite());

    let zeros = Array3::<f32>::zeros((3, 1, config.embed_size));
    let mut embedded = batch.clone();
    embedded.passage.tokens = TokenInput::Embedded(zeros);
    assert!(model.forward(&embedded, &PointerNetwork::ALL).is_ok());
}

/// 反向传播给出全部参数的梯度，名字、形状与参数一一对应
#[test]
fn test_backward_covers_all_parameters() {
    let mut config = small_config();
    config.num_matchlstm_layers = 2;
    let mut model = MatchLstm::new(config.clone()).unwrap();
    let batch = make_batch(&config, &[5, 3], &[2, 4], &[(1, 3), (0, 0)]);
    let output = model.forward(&batch, &PointerNetwork::ALL).unwrap();
    let grads = output.backward().unwrap();

    let params = model.named_parameters();
    assert_eq!(grads.len(), params.len());
    for (name, tensor) in &params {
        assert_eq!(grads[name].shape(), tensor.shape(), "{name}");
        assert!(grads[name].view().iter().all(|g| g.is_finite()), "{name}");
    }
    for name in [
        "embedding.weight",
        "preprocessing.0.forward.input_gate.input.weight",
        "match.1.attend_hidden.weight",
        "postprocessing.0.backward.cell_gate.hidden.weight",
        "span_pointer.forward.beta_transform.weight",
        "sentence_pointer.backward.attend_answer.weight",
    ] {
        assert!(grads[name].view().iter().any(|&g| g != 0.0), "{name}");
    }

    // 填充符的词向量行不参与计算
    let pad = config.pad_index;
    let embedding_grad = grads["embedding.weight"].as_matrix().unwrap().row(pad).to_owned();
    assert!(embedding_grad.iter().all(|&g| g == 0.0));
}

/// 未激活的指针网络梯度为全0；反向传播不改变损失值
#[test]
fn test_backward_inactive_pointer_gets_zero_gradient() {
    let config = small_config();
    let mut model = MatchLstm::new(config.clone()).unwrap();
    model.set_eval_mode();
    let batch = make_batch(&config, &[4, 3], &[3, 2], &[(0, 2), (1, 1)]);
    let output = model.forward(&batch, &[PointerNetwork::AnswerSpan]).unwrap();
    let grads = output.backward().unwrap();
    assert_eq!(output.loss_var().item().unwrap(), output.loss);

    for (name, grad) in &grads {
        if name.starts_with("sentence_pointer") {
            assert!(grad.view().iter().all(|&g| g == 0.0), "{name}");
        }
    }
    assert!(grads["span_pointer.backward.cell.output_gate.hidden.weight"]
        .view()
        .iter()
        .any(|&g| g != 0.0));
}

/// 整个模型的梯度与中心差分一致
#[test]
fn test_backward_matches_numeric_grad() {
    let mut config = small_config();
    config.num_matchlstm_layers = 2;
    let mut model = MatchLstm::new(config.clone()).unwrap();
    model.set_eval_mode();
    let batch = make_batch(&config, &[4, 3], &[3, 2], &[(1, 2), (0, 0)]);
    let grads = model
        .forward(&batch, &PointerNetwork::ALL)
        .unwrap()
        .backward()
        .unwrap();

    for name in [
        "span_pointer.forward.beta_transform.weight",
        "sentence_pointer.attend_question.weight",
        "match.0.attend_question.weight",
        "match.1.cell.forget_gate.hidden.bias",
        "preprocessing.0.backward.output_gate.input.weight",
    ] {
        let numeric = numeric_grad(&mut model, name, &batch, &PointerNetwork::ALL);
        let analytic = &grads[name];
        assert_eq!(numeric.shape(), analytic.shape());
        for (a, n) in analytic.view().iter().zip(numeric.iter()) {
            assert_abs_diff_eq!(a, n, epsilon = 2e-3);
        }
    }
}
