//! Bidirectional LSTM encoder.
//!
//! Shape transitions (`S` source positions, `B` batch, `E` embedding width,
//! `H` hidden size):
//!
//! ```text
//! tokens [S, B] --embed--> [S, B, E] --bilstm--> [S, B, 2H]
//!   |-- features  = W_f · bilstm        [S, B, 2H]  (position-major, cached)
//!   |-- outputs   = batch_major(bilstm)  [B, S, 2H]
//!   `-- state     = relu(W_h · [h_fwd; h_bwd]), relu(W_c · [c_fwd; c_bwd])  [B, H] each
//! ```
//!
//! The feature projection is computed once per source sequence and reused by
//! every decode step.

use std::fmt;
use std::sync::Arc;

use attention::layout;
use candle_core::{DType, Tensor, Var};
use embedding::{TokenEmbedding, TokenEmbeddingConfig};
use layers::{
    activations::{builtin, Activation, ActivationKind},
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
    lstm::{BiLstm, LstmConfig, LstmState},
};

use crate::{config::SummarizerConfig, error::Result};

/// Everything the decoder needs from one encoded batch.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Per-position bidirectional outputs, `[B, S, 2H]`.
    pub outputs: Tensor,
    /// Cached projection of the outputs, `[S, B, 2H]`.
    pub features: Tensor,
    /// Source ids, `[B, S]` as `u32`.
    pub source_ids: Tensor,
    /// Reduced state the decoder starts from, `(h, c)` each `[B, H]`.
    pub initial_state: LstmState,
}

impl EncoderOutput {
    pub fn source_len(&self) -> usize {
        self.features.dims()[0]
    }

    pub fn batch_size(&self) -> usize {
        self.features.dims()[1]
    }
}

pub struct Encoder {
    hidden_size: usize,
    embedding: TokenEmbedding,
    lstm: BiLstm,
    features: Linear,
    reduce_hidden: Linear,
    reduce_cell: Linear,
    relu: Arc<dyn Activation>,
    policy: PrecisionPolicy,
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("hidden_size", &self.hidden_size)
            .field("lstm", self.lstm.config())
            .finish()
    }
}

impl Encoder {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let width = config.feature_dim();
        let device = &config.device;
        let dtype = config.dtype;

        let embedding = TokenEmbedding::new(TokenEmbeddingConfig {
            vocab_size: config.vocab_size,
            hidden_dim: config.embedding_dim,
            dtype,
            device: device.clone(),
        })?;
        let lstm = BiLstm::new(LstmConfig::new(config.embedding_dim, hidden), device, dtype)?;
        let init = LinearInit::XavierUniform;
        let features = Linear::with_init(LinearConfig::new(width, width), &init, device, dtype)?;
        let reduce_hidden =
            Linear::with_init(LinearConfig::new(width, hidden), &init, device, dtype)?;
        let reduce_cell = Linear::with_init(LinearConfig::new(width, hidden), &init, device, dtype)?;

        Ok(Self {
            hidden_size: hidden,
            embedding,
            lstm,
            features,
            reduce_hidden,
            reduce_cell,
            relu: builtin(ActivationKind::Relu),
            policy: PrecisionPolicy::from_parameter_dtype(dtype),
        })
    }

    /// Encodes `tokens: [S, B]`.
    pub fn encode(&self, tokens: &Tensor) -> Result<EncoderOutput> {
        let embedded = self.embedding.forward(tokens)?;
        let scanned = self.lstm.run(&embedded)?;
        let features = self.features.forward(&scanned.outputs, &self.policy)?;

        let h = self.reduce(
            &self.reduce_hidden,
            &scanned.forward_final.h,
            &scanned.backward_final.h,
        )?;
        let c = self.reduce(
            &self.reduce_cell,
            &scanned.forward_final.c,
            &scanned.backward_final.c,
        )?;

        let (source_len, batch) = tokens.dims2()?;
        log::debug!(
            "encoded source_len={} batch={} hidden={}",
            source_len,
            batch,
            self.hidden_size
        );

        Ok(EncoderOutput {
            outputs: layout::batch_major(&scanned.outputs)?,
            features,
            source_ids: layout::rows_per_batch(&tokens.to_dtype(DType::U32)?)?,
            initial_state: LstmState::new(h, c),
        })
    }

    /// `[B, H]` forward and backward halves to a non-negative `[B, H]` decoder state.
    fn reduce(&self, proj: &Linear, forward: &Tensor, backward: &Tensor) -> Result<Tensor> {
        let joined = Tensor::cat(&[forward, backward], 1)?;
        let projected = proj.forward(&joined, &self.policy)?;
        Ok(self.relu.forward(&projected, &self.policy)?)
    }

    pub fn parameter_count(&self) -> usize {
        self.embedding.parameter_count()
            + self.lstm.parameter_count()
            + self.features.parameter_count()
            + self.reduce_hidden.parameter_count()
            + self.reduce_cell.parameter_count()
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.embedding.named_parameters(&format!("{scope}.embedding"));
        params.extend(self.lstm.named_parameters(&format!("{scope}.lstm")));
        params.extend(self.features.named_parameters(&format!("{scope}.features")));
        params.extend(self.reduce_hidden.named_parameters(&format!("{scope}.reduce_hidden")));
        params.extend(self.reduce_cell.named_parameters(&format!("{scope}.reduce_cell")));
        params
    }
}
