//! Teacher-forced encoder / decoder run.
//!
//! Inputs are position-major: `source: [S, B]` and
//! `target: [max_summary_length, B]`; any other target length is rejected.
//! The source is encoded once, then the decoder is folded over
//! `0..max_summary_length`, each step consuming the
//! ground-truth `target[i]` and the [`DecoderState`] returned by the previous
//! step. There is no early stop; every run produces exactly
//! `max_summary_length` entries per output sequence.

use candle_core::{Tensor, Var};
use layers::checks;

use crate::{
    config::SummarizerConfig,
    decoder::{Decoder, DecoderStep},
    encoder::{Encoder, EncoderOutput},
    error::{Result, SummarizerError},
    state::{DecoderState, SummaryOutput},
};

/// Encoder, coverage attention and decoder behind one configuration.
///
/// Parameters are read-only during forward runs, so a model can be shared
/// across threads behind an `Arc`.
#[derive(Debug)]
pub struct PointerGenerator {
    config: SummarizerConfig,
    encoder: Encoder,
    decoder: Decoder,
}

impl PointerGenerator {
    /// Builds the model and its components according to `config`.
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        config.validate()?;
        let encoder = Encoder::new(&config)?;
        let decoder = Decoder::new(&config)?;
        let model = Self {
            config,
            encoder,
            decoder,
        };
        log::info!(
            "summarizer init vocab={} batch={} max_len={} emb={} hidden={} copy={} dtype={:?} params={}",
            model.config.vocab_size,
            model.config.batch_size,
            model.config.max_summary_length,
            model.config.embedding_dim,
            model.config.hidden_size,
            model.config.copy_mechanism,
            model.config.dtype,
            model.parameter_count()
        );
        Ok(model)
    }

    /// Returns the model configuration.
    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Encodes `source: [S, B]` after checking it against the configured batch.
    pub fn encode(&self, source: &Tensor) -> Result<EncoderOutput> {
        if self.expect_sequence("source", source)? == 0 {
            return Err(SummarizerError::SequenceLength {
                name: "source",
                expected: 1,
                got: 0,
            });
        }
        self.encoder.encode(source)
    }

    /// One decode step; see [`Decoder::step`].
    pub fn step(
        &self,
        input: &Tensor,
        state: &DecoderState,
        encoded: &EncoderOutput,
    ) -> Result<DecoderStep> {
        self.decoder.step(input, state, encoded)
    }

    /// Runs the full teacher-forced pass.
    pub fn run(&self, source: &Tensor, target: &Tensor) -> Result<SummaryOutput> {
        let steps = self.config.max_summary_length;
        let target_len = self.expect_sequence("target", target)?;
        if target_len != steps {
            return Err(SummarizerError::SequenceLength {
                name: "target",
                expected: steps,
                got: target_len,
            });
        }
        let encoded = self.encode(source)?;
        log::debug!(
            "summarizer run source_len={} batch={} steps={}",
            encoded.source_len(),
            encoded.batch_size(),
            steps
        );

        let initial = DecoderState::initial(&encoded)?;
        let collected = SummaryOutput::with_capacity(steps, initial.coverage.clone());
        let (mut output, last) = (0..steps).try_fold(
            (collected, initial),
            |(mut output, state), index| -> Result<_> {
                let step = self.decoder.step(&target.get(index)?, &state, &encoded)?;
                output.distributions.push(step.vocab_dist);
                output.attentions.push(step.attention);
                output.coverages.push(state.coverage);
                output
                    .generation_probabilities
                    .extend(step.generation_probability);
                Ok((output, step.state))
            },
        )?;
        output.final_coverage = last.coverage;
        Ok(output)
    }

    pub fn parameter_count(&self) -> usize {
        self.encoder.parameter_count() + self.decoder.parameter_count()
    }

    /// All learned parameters, for an external trainer or checkpoint writer.
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = self.encoder.named_parameters("encoder");
        params.extend(self.decoder.named_parameters("decoder"));
        params
    }

    /// Checks `[len, batch]` integer ids against the configured batch and returns `len`.
    fn expect_sequence(&self, name: &'static str, ids: &Tensor) -> Result<usize> {
        checks::expect_rank(name, ids, 2)?;
        checks::expect_integer(name, ids)?;
        let (len, batch) = ids.dims2()?;
        if batch != self.config.batch_size {
            return Err(SummarizerError::BatchMismatch {
                name,
                expected: self.config.batch_size,
                got: batch,
            });
        }
        Ok(len)
    }
}
