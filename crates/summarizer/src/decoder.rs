//! Single-step LSTM decoder with coverage attention.
//!
//! Shape transitions for one step (`B` batch, `E` embedding width, `H` hidden
//! size, `V` vocabulary size, `S` source positions):
//!
//! ```text
//! input [B] --embed--> [B, E]
//! [context_prev; emb]   [B, 2H + E] --W_x--> x [B, E]
//! lstm(x, (h, c))  ->   (h', c') [B, H] each
//! query = [h'; c']      [B, 2H] --attention--> context [B, 2H], weights [S, B]
//! [h'; context]         [B, 3H] --W_o--> [B, H] --W_v--> [B, V] --softmax--> vocab_dist
//! ```
//!
//! With the copy mechanism enabled a scalar gate
//! `p_gen = sigmoid(W_g · [context; query; x])` mixes `vocab_dist` with the
//! attention weights scattered onto the source ids. Both parts are
//! distributions, so the blend still sums to one.

use std::fmt;
use std::sync::Arc;

use attention::{layout, Attention, AttentionConfig, CoverageAttention};
use candle_core::{Tensor, Var};
use candle_nn::ops::softmax;
use embedding::{TokenEmbedding, TokenEmbeddingConfig};
use layers::{
    activations::{builtin, Activation, ActivationKind},
    checks,
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
    lstm::{LstmCell, LstmConfig},
};

use crate::{
    config::SummarizerConfig,
    encoder::EncoderOutput,
    error::{Result, SummarizerError},
    state::DecoderState,
};

/// Output of one decode step.
#[derive(Debug, Clone)]
pub struct DecoderStep {
    /// Probability over the vocabulary, `[B, V]` in the reduction dtype; rows sum to one.
    pub vocab_dist: Tensor,
    /// Attention over source positions, `[S, B]` in the reduction dtype.
    pub attention: Tensor,
    /// State for the next step (new recurrent state, context and coverage).
    pub state: DecoderState,
    /// `p_gen`, `[B, 1]`, only when the copy mechanism is enabled.
    pub generation_probability: Option<Tensor>,
}

pub struct Decoder {
    vocab_size: usize,
    embedding: TokenEmbedding,
    context_proj: Linear,
    lstm: LstmCell,
    attention: CoverageAttention,
    hidden_proj: Linear,
    vocab_proj: Linear,
    copy_gate: Option<Linear>,
    sigmoid: Arc<dyn Activation>,
    policy: PrecisionPolicy,
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("vocab_size", &self.vocab_size)
            .field("lstm", self.lstm.config())
            .field("copy_mechanism", &self.copy_gate.is_some())
            .finish()
    }
}

impl Decoder {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let width = config.feature_dim();
        let emb = config.embedding_dim;
        let device = &config.device;
        let dtype = config.dtype;
        let init = LinearInit::XavierUniform;

        let embedding = TokenEmbedding::new(TokenEmbeddingConfig {
            vocab_size: config.vocab_size,
            hidden_dim: emb,
            dtype,
            device: device.clone(),
        })?;
        let context_proj = Linear::with_init(LinearConfig::new(width + emb, emb), &init, device, dtype)?;
        let lstm = LstmCell::new(LstmConfig::new(emb, hidden), device, dtype)?;
        let attention = CoverageAttention::new(AttentionConfig::new(hidden, dtype, device.clone()))?;
        let hidden_proj =
            Linear::with_init(LinearConfig::new(hidden + width, hidden), &init, device, dtype)?;
        let vocab_proj =
            Linear::with_init(LinearConfig::new(hidden, config.vocab_size), &init, device, dtype)?;
        let copy_gate = if config.copy_mechanism {
            Some(Linear::with_init(
                LinearConfig::new(2 * width + emb, 1),
                &init,
                device,
                dtype,
            )?)
        } else {
            None
        };

        Ok(Self {
            vocab_size: config.vocab_size,
            embedding,
            context_proj,
            lstm,
            attention,
            hidden_proj,
            vocab_proj,
            copy_gate,
            sigmoid: builtin(ActivationKind::Sigmoid),
            policy: PrecisionPolicy::from_parameter_dtype(dtype),
        })
    }

    /// Runs one step for `input: [B]` ids from `state`.
    pub fn step(
        &self,
        input: &Tensor,
        state: &DecoderState,
        encoded: &EncoderOutput,
    ) -> Result<DecoderStep> {
        checks::expect_rank("decoder.input", input, 1)?;
        let batch = input.dims()[0];
        if batch != encoded.batch_size() {
            return Err(SummarizerError::BatchMismatch {
                name: "decoder input",
                expected: encoded.batch_size(),
                got: batch,
            });
        }
        let policy = &self.policy;

        let embedded = self.embedding.forward(input)?;
        let fused = Tensor::cat(&[&state.context, &embedded], 1)?;
        let x = self.context_proj.forward(&fused, policy)?;

        let recurrent = self.lstm.step(&x, &state.recurrent)?;
        let query = recurrent.joined()?;
        let attended = self.attention.attend(
            &query,
            &encoded.outputs,
            &encoded.features,
            &state.coverage,
        )?;

        let readout = Tensor::cat(&[&recurrent.h, &attended.context], 1)?;
        let logits = self
            .vocab_proj
            .forward(&self.hidden_proj.forward(&readout, policy)?, policy)?;
        let vocab_dist = softmax(&policy.cast_for_reduction(&logits)?, 1)?;

        let (vocab_dist, generation_probability) = match &self.copy_gate {
            Some(gate) => {
                let gate_input = Tensor::cat(&[&attended.context, &query, &x], 1)?;
                let p_gen = self.sigmoid.forward(&gate.forward(&gate_input, policy)?, policy)?;
                let blended = self.blend_copy(&vocab_dist, &p_gen, &attended.weights, encoded)?;
                (blended, Some(p_gen))
            }
            None => (vocab_dist, None),
        };

        log::trace!("decoder step batch={batch} vocab={}", self.vocab_size);
        Ok(DecoderStep {
            vocab_dist,
            attention: attended.weights,
            state: DecoderState {
                recurrent,
                context: attended.context,
                coverage: attended.coverage,
            },
            generation_probability,
        })
    }

    /// `p_gen * vocab + (1 - p_gen) * copy`, computed in the reduction dtype.
    fn blend_copy(
        &self,
        vocab_dist: &Tensor,
        p_gen: &Tensor,
        weights: &Tensor,
        encoded: &EncoderOutput,
    ) -> Result<Tensor> {
        let policy = &self.policy;
        let p_gen = policy.cast_for_reduction(p_gen)?;
        let weights = policy.cast_for_reduction(&layout::rows_per_batch(weights)?)?;
        let copy_dist = vocab_dist
            .zeros_like()?
            .scatter_add(&encoded.source_ids, &weights, 1)?;

        let generated = vocab_dist.broadcast_mul(&p_gen)?;
        let copied = copy_dist.broadcast_mul(&p_gen.affine(-1.0, 1.0)?)?;
        Ok(generated.add(&copied)?)
    }

    pub fn copy_mechanism(&self) -> bool {
        self.copy_gate.is_some()
    }

    pub fn parameter_count(&self) -> usize {
        self.embedding.parameter_count()
            + self.context_proj.parameter_count()
            + self.lstm.parameter_count()
            + self.attention.parameter_count()
            + self.hidden_proj.parameter_count()
            + self.vocab_proj.parameter_count()
            + self.copy_gate.as_ref().map_or(0, Linear::parameter_count)
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.embedding.named_parameters(&format!("{scope}.embedding"));
        params.extend(self.context_proj.named_parameters(&format!("{scope}.context")));
        params.extend(self.lstm.named_parameters(&format!("{scope}.lstm")));
        params.extend(self.attention.named_parameters(&format!("{scope}.attention")));
        params.extend(self.hidden_proj.named_parameters(&format!("{scope}.out_hidden")));
        params.extend(self.vocab_proj.named_parameters(&format!("{scope}.out_vocab")));
        if let Some(gate) = &self.copy_gate {
            params.extend(gate.named_parameters(&format!("{scope}.copy_gate")));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use candle_core::Device;

    fn setup(copy: bool) -> Result<(Decoder, EncoderOutput)> {
        let config = SummarizerConfig::new(30, 2, 4)
            .with_dims(6, 5)
            .with_copy_mechanism(copy);
        let encoder = Encoder::new(&config)?;
        let tokens = Tensor::from_vec(vec![4u32, 9, 12, 0, 29, 1, 7, 7], (4, 2), &Device::Cpu)?;
        Ok((Decoder::new(&config)?, encoder.encode(&tokens)?))
    }

    fn row_sums(dist: &Tensor) -> Result<Vec<f32>> {
        Ok(dist.sum(1)?.to_vec1::<f32>()?)
    }

    #[test]
    fn step_shapes_follow_the_contract() -> Result<()> {
        let (decoder, encoded) = setup(false)?;
        let state = DecoderState::initial(&encoded)?;
        let input = Tensor::from_vec(vec![3u32, 0], 2, &Device::Cpu)?;
        let step = decoder.step(&input, &state, &encoded)?;

        assert_eq!(step.vocab_dist.dims(), &[2, 30]);
        assert_eq!(step.attention.dims(), &[4, 2]);
        assert_eq!(step.state.context.dims(), &[2, 10]);
        assert_eq!(step.state.coverage.dims(), &[4, 2]);
        assert_eq!(step.state.recurrent.h.dims(), &[2, 5]);
        assert!(step.generation_probability.is_none());
        for total in row_sums(&step.vocab_dist)? {
            assert!((total - 1.0).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn copy_blend_keeps_rows_normalised() -> Result<()> {
        let (decoder, encoded) = setup(true)?;
        assert!(decoder.copy_mechanism());
        let mut state = DecoderState::initial(&encoded)?;
        for token in [1u32, 5, 9] {
            let input = Tensor::from_vec(vec![token, token], 2, &Device::Cpu)?;
            let step = decoder.step(&input, &state, &encoded)?;
            for total in row_sums(&step.vocab_dist)? {
                assert!((total - 1.0).abs() < 1e-5);
            }
            let p_gen = step
                .generation_probability
                .as_ref()
                .expect("gate")
                .flatten_all()?
                .to_vec1::<f32>()?;
            assert!(p_gen.iter().all(|p| (0.0..=1.0).contains(p)));
            state = step.state;
        }
        Ok(())
    }

    #[test]
    fn copy_mass_lands_on_source_ids() -> Result<()> {
        let (decoder, mut encoded) = setup(true)?;
        let device = Device::Cpu;
        encoded.source_ids =
            Tensor::from_vec(vec![4u32, 9, 4, 1, 0, 29, 29, 7], (2, 4), &device)?;
        let weights = Tensor::from_vec(
            vec![0.1f32, 0.25, 0.2, 0.25, 0.3, 0.25, 0.4, 0.25],
            (4, 2),
            &device,
        )?;
        let uniform = Tensor::full(1.0f32 / 30.0, (2, 30), &device)?;
        let p_gen = Tensor::from_vec(vec![0.5f32, 0.0], (2, 1), &device)?;

        let blended = decoder
            .blend_copy(&uniform, &p_gen, &weights, &encoded)?
            .to_vec2::<f32>()?;

        let base = 0.5 / 30.0;
        let close = |a: f32, b: f32| (a - b).abs() < 1e-6;
        assert!(close(blended[0][4], base + 0.5 * 0.4));
        assert!(close(blended[0][9], base + 0.5 * 0.2));
        assert!(close(blended[0][1], base + 0.5 * 0.4));
        assert!(close(blended[0][2], base));
        assert!(close(blended[1][0], 0.25));
        assert!(close(blended[1][29], 0.5));
        assert!(close(blended[1][7], 0.25));
        assert!(close(blended[1][3], 0.0));
        for row in &blended {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn rejects_inputs_with_the_wrong_batch() -> Result<()> {
        let (decoder, encoded) = setup(false)?;
        let state = DecoderState::initial(&encoded)?;
        let input = Tensor::from_vec(vec![1u32, 2, 3], 3, &Device::Cpu)?;
        let err = decoder.step(&input, &state, &encoded).unwrap_err();
        assert!(matches!(
            err,
            SummarizerError::BatchMismatch { expected: 2, got: 3, .. }
        ));
        Ok(())
    }
}
