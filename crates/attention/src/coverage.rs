//! Additive attention with a coverage term.
//!
//! For every source position `s` and batch element `b`:
//!
//! ```text
//! e[s, b]      = W_f · enc[s, b] + W_q · query[b] + W_c · coverage[s, b]
//! score[s, b]  = v · tanh(e[s, b])
//! weights[:, b] = softmax_s(score[:, b])
//! context[b]   = sum_s weights[s, b] * out[b, s]
//! coverage'    = coverage + weights
//! ```
//!
//! `W_f · enc` is the encoder's cached feature projection and arrives
//! precomputed. The softmax runs in the reduction dtype over the position
//! axis of the `[source_len, batch]` score matrix, so every batch column is
//! normalised on its own. Weights and the running coverage stay in the
//! reduction dtype; only the context is returned in the storage dtype.

use std::fmt;
use std::sync::{Arc, OnceLock};

use candle_core::{DType, Tensor, Var};
use candle_nn::ops::softmax;
use layers::{
    activations::{builtin, Activation, ActivationKind},
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
};

use crate::core::{Attention, AttentionConfig, AttentionError, AttentionOutput};
use crate::layout;

/// Coverage-aware additive attention.
pub struct CoverageAttention {
    config: AttentionConfig,
    query_proj: Linear,
    coverage_proj: Linear,
    score_proj: Linear,
    squash: Arc<dyn Activation>,
    policy: PrecisionPolicy,
    first_call: OnceLock<()>,
}

impl fmt::Debug for CoverageAttention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageAttention")
            .field("hidden_size", &self.config.hidden_size)
            .field("dtype", &self.config.dtype)
            .finish()
    }
}

impl CoverageAttention {
    pub fn new(config: AttentionConfig) -> Result<Self, AttentionError> {
        if config.hidden_size == 0 {
            return Err(AttentionError::shape("hidden_size must be greater than zero"));
        }
        if !matches!(config.dtype, DType::F32 | DType::F16 | DType::BF16) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{:?}", config.dtype),
            });
        }

        let width = config.feature_dim();
        let init = LinearInit::XavierUniform;
        let query_proj = Linear::with_init(
            LinearConfig::new(width, width),
            &init,
            &config.device,
            config.dtype,
        )?;
        let coverage_proj = Linear::with_init(
            LinearConfig::new(1, width),
            &init,
            &config.device,
            config.dtype,
        )?;
        let score_proj = Linear::with_init(
            LinearConfig::new(width, 1),
            &init,
            &config.device,
            config.dtype,
        )?;

        Ok(Self {
            policy: PrecisionPolicy::from_parameter_dtype(config.dtype),
            config,
            query_proj,
            coverage_proj,
            score_proj,
            squash: builtin(ActivationKind::Tanh),
            first_call: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub fn parameter_count(&self) -> usize {
        self.query_proj.parameter_count()
            + self.coverage_proj.parameter_count()
            + self.score_proj.parameter_count()
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.query_proj.named_parameters(&format!("{scope}.query"));
        params.extend(self.coverage_proj.named_parameters(&format!("{scope}.coverage")));
        params.extend(self.score_proj.named_parameters(&format!("{scope}.score")));
        params
    }

    fn validate(
        &self,
        query: &Tensor,
        encoder_out: &Tensor,
        encoder_features: &Tensor,
        coverage: &Tensor,
    ) -> Result<(usize, usize), AttentionError> {
        let width = self.config.feature_dim();
        let (batch, query_width) = query
            .dims2()
            .map_err(|_| AttentionError::shape("query must have shape [batch, 2H]"))?;
        if query_width != width {
            return Err(AttentionError::shape(format!(
                "query width {query_width} does not match 2H = {width}"
            )));
        }

        let (ob, source_len, ow) = encoder_out.dims3().map_err(|_| {
            AttentionError::shape("encoder_out must have shape [batch, source_len, 2H]")
        })?;
        if ob != batch || ow != width || source_len == 0 {
            return Err(AttentionError::shape(format!(
                "encoder_out shape mismatch: expected [{batch}, >0, {width}] got [{ob}, {source_len}, {ow}]"
            )));
        }

        let expected = [source_len, batch, width];
        if encoder_features.dims() != expected {
            return Err(AttentionError::shape(format!(
                "encoder_features shape mismatch: expected {expected:?} got {:?}",
                encoder_features.dims()
            )));
        }
        if coverage.dims() != [source_len, batch] {
            return Err(AttentionError::shape(format!(
                "coverage shape mismatch: expected [{source_len}, {batch}] got {:?}",
                coverage.dims()
            )));
        }
        Ok((batch, source_len))
    }
}

impl Attention for CoverageAttention {
    fn attend(
        &self,
        query: &Tensor,
        encoder_out: &Tensor,
        encoder_features: &Tensor,
        coverage: &Tensor,
    ) -> Result<AttentionOutput, AttentionError> {
        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::coverage init hidden={} dtype={:?} mixed_precision={}",
                self.config.hidden_size,
                self.config.dtype,
                self.policy.is_mixed_precision()
            );
        }
        let (_, source_len) = self.validate(query, encoder_out, encoder_features, coverage)?;
        let policy = &self.policy;

        let decoder_features = layout::broadcast_over_positions(
            &self.query_proj.forward(query, policy)?,
            source_len,
        )?;
        let coverage_features = self
            .coverage_proj
            .forward(&layout::scalar_features(coverage)?, policy)?;

        let summed = encoder_features
            .add(&decoder_features)?
            .add(&coverage_features)?;
        let scores = self
            .score_proj
            .forward(&self.squash.forward(&summed, policy)?, policy)?
            .squeeze(2)?;

        let weights = softmax(&policy.cast_for_reduction(&scores)?, 0)?;

        let context = layout::weight_rows(&policy.cast_for_matmul(&weights)?)?
            .matmul(&policy.cast_for_matmul(encoder_out)?.contiguous()?)?
            .squeeze(1)?;
        let context = policy.cast_to_storage(&context)?;

        let coverage = policy.cast_for_reduction(coverage)?.add(&weights)?;
        log::trace!("attention step source_len={source_len}");

        Ok(AttentionOutput {
            context,
            weights,
            coverage,
        })
    }
}
