/*
 * @Author       : 老董
 * @Date         : 2026-02-18
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : Match-LSTM阅读理解模型
 *
 * 数据流：
 *   词索引/词向量(+词性特征) -> 预处理编码器(段落、问题共享) -> 多层匹配层(每层后dropout)
 *   -> 后处理编码器 -> 边界指针网络 -> 损失
 * 每次前向计算都在一张新的计算图上进行，`ModelOutput::backward`按参数名返回梯度；
 * 参数更新（优化器、学习率等）由外部驱动，通过`named_parameters_mut`访问参数。
 */

mod batch;
mod checkpoint;
mod config;
mod decode;
mod embedding;
mod loss;
mod match_layer;
mod pointer;

pub use batch::{Batch, SequenceBatch, TokenInput, span_f1_matrix};
pub use checkpoint::ModelStore;
pub use config::ModelConfig;
pub use decode::{SpanPrediction, decode_spans};
pub use embedding::{Embedding, EmbeddingProvider, StaticEmbedding, TrainableEmbedding};
pub use loss::LossComposer;
pub use match_layer::{MatchLayer, MatchOutput};
pub use pointer::{BoundaryPointer, PointerNetwork, PointerOutput, PointerVars};

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use ndarray::{Array3, Ix3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::errors::{BatchError, ConfigError, ModelError, TensorError};
use crate::nn::{BiLstmEncoder, Dropout, Graph, Mask, Module, Var, join_name};
use crate::tensor::Tensor;

/// 词向量表以外的全部网络参数，各层按层号存放在`Vec`中
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Network {
    preprocessing: BiLstmEncoder,
    match_layers: Vec<MatchLayer>,
    postprocessing: BiLstmEncoder,
    sentence_pointer: BoundaryPointer,
    span_pointer: BoundaryPointer,
}

impl Network {
    fn new(config: &ModelConfig, rng: &mut StdRng) -> Self {
        let half = config.half_hidden();
        let preprocessing = BiLstmEncoder::new(
            config.embed_size + config.num_pos_tags,
            half,
            config.num_preprocessing_layers,
            config.dropout,
            rng,
        );
        let match_layers = (0..config.num_matchlstm_layers)
            .map(|_| MatchLayer::new(config.hidden_size, config.attention_size, rng))
            .collect();
        let postprocessing = BiLstmEncoder::new(
            config.hidden_size,
            half,
            config.num_postprocessing_layers,
            config.dropout,
            rng,
        );
        Self {
            preprocessing,
            match_layers,
            postprocessing,
            sentence_pointer: BoundaryPointer::new(config.hidden_size, config.attention_size, rng),
            span_pointer: BoundaryPointer::new(config.hidden_size, config.attention_size, rng),
        }
    }

    fn pointer(&self, network: PointerNetwork) -> &BoundaryPointer {
        match network {
            PointerNetwork::SentenceBoundary => &self.sentence_pointer,
            PointerNetwork::AnswerSpan => &self.span_pointer,
        }
    }
}

impl Module for Network {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let mut params = self
            .preprocessing
            .named_parameters(&join_name(prefix, "preprocessing"));
        for (layer_no, layer) in self.match_layers.iter().enumerate() {
            params.extend(layer.named_parameters(&join_name(prefix, &format!("match.{}", layer_no))));
        }
        params.extend(
            self.postprocessing
                .named_parameters(&join_name(prefix, "postprocessing")),
        );
        params.extend(
            self.sentence_pointer
                .named_parameters(&join_name(prefix, "sentence_pointer")),
        );
        params.extend(
            self.span_pointer
                .named_parameters(&join_name(prefix, "span_pointer")),
        );
        params
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let mut params = self
            .preprocessing
            .named_parameters_mut(&join_name(prefix, "preprocessing"));
        for (layer_no, layer) in self.match_layers.iter_mut().enumerate() {
            params.extend(layer.named_parameters_mut(&join_name(prefix, &format!("match.{}", layer_no))));
        }
        params.extend(
            self.postprocessing
                .named_parameters_mut(&join_name(prefix, "postprocessing")),
        );
        params.extend(
            self.sentence_pointer
                .named_parameters_mut(&join_name(prefix, "sentence_pointer")),
        );
        params.extend(
            self.span_pointer
                .named_parameters_mut(&join_name(prefix, "span_pointer")),
        );
        params
    }
}

/// 模型的全部参数（可整体序列化）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    embedding: Embedding,
    network: Network,
}

impl ModelParams {
    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }
}

impl Module for ModelParams {
    fn named_parameters(&self, prefix: &str) -> Vec<(String, &Tensor)> {
        let mut params = self
            .embedding
            .named_parameters(&join_name(prefix, "embedding"));
        params.extend(self.network.named_parameters(prefix));
        params
    }

    fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Tensor)> {
        let mut params = self
            .embedding
            .named_parameters_mut(&join_name(prefix, "embedding"));
        params.extend(self.network.named_parameters_mut(prefix));
        params
    }
}

/// 一次前向计算的结果
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// 仅包含本次激活的指针网络
    pub distributions: BTreeMap<PointerNetwork, PointerOutput>,
    pub loss: f32,
    loss_var: Var,
}

impl ModelOutput {
    pub fn get(&self, network: PointerNetwork) -> Option<&PointerOutput> {
        self.distributions.get(&network)
    }

    /// 损失在计算图上的节点
    pub fn loss_var(&self) -> &Var {
        &self.loss_var
    }

    /// 对损失做反向传播，返回全部可训练参数的梯度，键与`MatchLstm::named_parameters`的名字一致。
    /// 本次前向没有用到的参数（如未激活的指针网络）梯度为全0
    pub fn backward(&self) -> Result<BTreeMap<String, Tensor>, ModelError> {
        self.loss_var.backward()?;
        Ok(self.loss_var.graph().gradients())
    }
}

/// Match-LSTM模型
#[derive(Debug, Clone)]
pub struct MatchLstm {
    config: ModelConfig,
    params: ModelParams,
    is_train_mode: bool,
    rng: StdRng,
}

impl MatchLstm {
    /// 用可训练词向量表构造模型，所有参数由`config.seed`确定
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        if config.use_pretrained_embeddings {
            return Err(ConfigError::MissingPretrainedEmbeddings.into());
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let embedding = Embedding::Trainable(TrainableEmbedding::new(
            config.vocab_size,
            config.embed_size,
            config.pad_index,
            &mut rng,
        ));
        let network = Network::new(&config, &mut rng);
        Ok(Self::assemble(config, ModelParams { embedding, network }, rng))
    }

    /// 用外部提供的预训练（静态）词向量表构造模型
    pub fn with_pretrained(config: ModelConfig, embedding: StaticEmbedding) -> Result<Self, ModelError> {
        config.validate()?;
        let embedding = Embedding::Static(embedding);
        Self::check_embedding(&config, &embedding)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let network = Network::new(&config, &mut rng);
        Ok(Self::assemble(config, ModelParams { embedding, network }, rng))
    }

    /// 由已有参数（如从文件加载）重建模型，并按配置逐一核对参数形状
    pub fn from_params(config: ModelConfig, params: ModelParams) -> Result<Self, ModelError> {
        config.validate()?;
        Self::check_embedding(&config, &params.embedding)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let reference = Network::new(&config, &mut rng);
        let expected = reference.named_parameters("");
        let got = params.network.named_parameters("");
        if expected.len() != got.len() {
            return Err(TensorError::Shape(format!(
                "参数个数不符：期望{}个，实际为{}个",
                expected.len(),
                got.len()
            ))
            .into());
        }
        for ((expected_name, expected_tensor), (name, tensor)) in expected.iter().zip(&got) {
            if expected_name != name || !expected_tensor.is_same_shape(tensor) {
                return Err(TensorError::ShapeMismatch {
                    name: name.clone(),
                    expected: expected_tensor.shape().to_vec(),
                    got: tensor.shape().to_vec(),
                }
                .into());
            }
        }
        Ok(Self::assemble(config, params, rng))
    }

    fn assemble(config: ModelConfig, params: ModelParams, rng: StdRng) -> Self {
        Self {
            config,
            params,
            is_train_mode: true,
            rng,
        }
    }

    fn check_embedding(config: &ModelConfig, embedding: &Embedding) -> Result<(), ConfigError> {
        if embedding.vocab_size() != config.vocab_size || embedding.embed_size() != config.embed_size {
            return Err(ConfigError::EmbeddingShapeMismatch {
                vocab_size: config.vocab_size,
                embed_size: config.embed_size,
                got: embedding.table_shape().to_vec(),
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn into_params(self) -> ModelParams {
        self.params
    }

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 训练/评估模式 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    pub fn set_train_mode(&mut self) {
        self.is_train_mode = true;
    }

    pub fn set_eval_mode(&mut self) {
        self.is_train_mode = false;
    }

    pub const fn is_train_mode(&self) -> bool {
        self.is_train_mode
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 训练/评估模式 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    /*↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓ 参数 ↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓↓*/
    /// 按稳定的层级名称列出全部可训练参数，如`match.0.attend_question.weight`
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.params.named_parameters("")
    }

    pub fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.params.named_parameters_mut("")
    }

    pub fn num_params(&self) -> usize {
        self.params.num_params()
    }
    /*↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑ 参数 ↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑↑*/

    /// 前向计算：返回激活的指针网络的分布以及组合后的损失。
    /// `networks`中的顺序与重复项不影响结果，但不能为空
    pub fn forward(&mut self, batch: &Batch, networks: &[PointerNetwork]) -> Result<ModelOutput, ModelError> {
        let active: BTreeSet<PointerNetwork> = networks.iter().copied().collect();
        if active.is_empty() {
            return Err(BatchError::NoActiveNetwork.into());
        }
        let graph = Graph::new();
        graph.register_parameters(self.params.named_parameters(""));
        let (matched, question) = self.match_passage_on(&graph, batch)?;

        let started = Instant::now();
        let passage_lengths = &batch.passage.lengths;
        let is_train_mode = self.is_train_mode;
        let passage = self.params.network.postprocessing.forward(
            &matched,
            passage_lengths,
            is_train_mode,
            &mut self.rng,
        )?;
        self.log_stage("post-encode", started);

        let started = Instant::now();
        let mut pointer_vars = BTreeMap::new();
        for &network in &active {
            let output = self.params.network.pointer(network).forward(
                &passage,
                &question,
                passage_lengths,
                &batch.question.lengths,
            )?;
            pointer_vars.insert(network, output);
        }
        self.log_stage("pointer", started);

        let loss_var = LossComposer::new(self.config.f1_loss_multiplier, self.config.f1_loss_threshold)
            .compose(
                &pointer_vars,
                &active,
                &batch.answers,
                &batch.f1_matrices.view(),
            )?;
        let distributions = pointer_vars
            .iter()
            .map(|(&network, vars)| vars.to_output().map(|output| (network, output)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        if self.config.debug {
            tracing::debug!(
                num_nodes = graph.num_nodes(),
                num_parameters = graph.num_parameters(),
                "计算图规模"
            );
        }
        Ok(ModelOutput {
            distributions,
            loss: loss_var.item()?,
            loss_var,
        })
    }

    /// 校验批数据并计算到匹配层为止，返回`(Hr, Hq)`：
    /// 最后一层匹配层（含dropout）的段落表示，以及预处理编码后的问题表示，
    /// 形状分别为 [max_passage_len, batch, hidden] 与 [max_question_len, batch, hidden]
    pub fn match_passage(&mut self, batch: &Batch) -> Result<(Array3<f32>, Array3<f32>), ModelError> {
        let graph = Graph::new();
        let (passage, question) = self.match_passage_on(&graph, batch)?;
        Ok((passage.value_as::<Ix3>()?, question.value_as::<Ix3>()?))
    }

    fn match_passage_on(&mut self, graph: &Graph, batch: &Batch) -> Result<(Var, Var), ModelError> {
        let started = Instant::now();
        batch.validate(self.config.num_pos_tags, self.config.embed_size)?;
        let passage_inputs = self.embed(graph, &batch.passage)?;
        let question_inputs = self.embed(graph, &batch.question)?;
        // 掩码只建一次，所有匹配层共用
        let passage_mask = Mask::new(&batch.passage.lengths, batch.passage.max_len());
        self.log_stage("preparation", started);

        let started = Instant::now();
        let is_train_mode = self.is_train_mode;
        let encoder = &self.params.network.preprocessing;
        let mut passage = encoder.forward(
            &passage_inputs,
            &batch.passage.lengths,
            is_train_mode,
            &mut self.rng,
        )?;
        let question = encoder.forward(
            &question_inputs,
            &batch.question.lengths,
            is_train_mode,
            &mut self.rng,
        )?;
        self.log_stage("encode", started);

        let started = Instant::now();
        let dropout = Dropout::new(self.config.dropout);
        for layer in &self.params.network.match_layers {
            let output = layer.forward(&passage, &question, &passage_mask, &batch.question.lengths)?;
            passage = dropout.forward(&output.hidden, is_train_mode, &mut self.rng)?;
        }
        self.log_stage("match", started);
        Ok((passage, question))
    }

    /// 查词向量并在最后一维拼接词性特征
    fn embed(&self, graph: &Graph, side: &SequenceBatch) -> Result<Var, ModelError> {
        let vectors = match &side.tokens {
            TokenInput::Ids(ids) => self.params.embedding.embed(graph, &ids.view())?,
            TokenInput::Embedded(vectors) => graph.input(vectors.clone()),
        };
        let pos_tags = graph.input(side.pos_tags.clone());
        Ok(Var::concat(&[&vectors, &pos_tags], 2)?)
    }

    fn log_stage(&self, stage: &str, started: Instant) {
        if self.config.debug {
            tracing::debug!(
                stage,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "阶段耗时"
            );
        }
    }
}

#[cfg(test)]
mod tests;
