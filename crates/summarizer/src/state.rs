//! Records threaded through the decode loop and collected from it.

use candle_core::{Result, Tensor};
use layers::{LstmState, PrecisionPolicy};

use crate::encoder::EncoderOutput;

/// Everything one decode step hands to the next.
#[derive(Debug, Clone)]
pub struct DecoderState {
    /// Decoder LSTM `(h, c)`, each `[batch, H]`.
    pub recurrent: LstmState,
    /// Previous attention context, `[batch, 2H]`.
    pub context: Tensor,
    /// Attention mass accumulated so far, `[source_len, batch]` in the
    /// reduction dtype.
    pub coverage: Tensor,
}

impl DecoderState {
    /// State before the first step: the encoder's reduced state, a zero
    /// context and zero coverage.
    pub fn initial(encoded: &EncoderOutput) -> Result<Self> {
        let (batch, _, width) = encoded.outputs.dims3()?;
        let dtype = encoded.outputs.dtype();
        let reduction = PrecisionPolicy::from_parameter_dtype(dtype).reduction();
        let device = encoded.outputs.device();
        Ok(Self {
            recurrent: encoded.initial_state.clone(),
            context: Tensor::zeros((batch, width), dtype, device)?,
            coverage: Tensor::zeros((encoded.source_len(), batch), reduction, device)?,
        })
    }
}

/// Per-step results of a teacher-forced run, each in step order.
#[derive(Debug, Clone)]
pub struct SummaryOutput {
    /// Vocabulary distributions, each `[batch, vocab_size]`.
    pub distributions: Vec<Tensor>,
    /// Attention weights, each `[source_len, batch]`.
    pub attentions: Vec<Tensor>,
    /// Coverage consumed by each step, each `[source_len, batch]`.
    /// Entry `t` is the sum of `attentions[..t]`, so entry 0 is all zeros.
    /// This is the coverage passed into step `t`, not the one it returns
    /// (that one is `coverages[t + 1]`, or `final_coverage` for the last step).
    pub coverages: Vec<Tensor>,
    /// Coverage after the last step, `[source_len, batch]`.
    pub final_coverage: Tensor,
    /// Generation gate per step, each `[batch, 1]`; empty unless the copy
    /// mechanism is enabled.
    pub generation_probabilities: Vec<Tensor>,
}

impl SummaryOutput {
    pub(crate) fn with_capacity(steps: usize, initial_coverage: Tensor) -> Self {
        Self {
            distributions: Vec::with_capacity(steps),
            attentions: Vec::with_capacity(steps),
            coverages: Vec::with_capacity(steps),
            final_coverage: initial_coverage,
            generation_probabilities: Vec::new(),
        }
    }

    /// Number of decode steps recorded.
    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }
}
