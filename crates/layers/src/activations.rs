//! Activation catalogue for the recurrent summarizer.
//!
//! Activations are shape preserving. Each implementation promotes inputs to
//! the compute dtype requested by [`PrecisionPolicy`] before evaluating the
//! non-linearity, then casts back to the storage dtype.
//!
//! # Built-in formulas
//!
//! * **ReLU** `max(x, 0)`, used when the bidirectional encoder state is
//!   reduced to the decoder width. Outputs are never negative.
//! * **Tanh** bounds the summed attention features to `(-1, 1)` before the
//!   score projection.
//! * **Sigmoid** `1 / (1 + exp(-x))` drives the LSTM gates and the optional
//!   generation gate.

use std::sync::Arc;

use candle_core::{Result, Tensor};

use crate::dtypes::PrecisionPolicy;

/// Identifies which non-linearity is implemented by an [`Activation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    Relu,
    Tanh,
    Sigmoid,
}

/// Common interface shared by activation functions.
pub trait Activation: Send + Sync {
    /// Returns the [`ActivationKind`] for introspection when wiring composite blocks.
    fn kind(&self) -> ActivationKind;

    /// Applies the activation to `input` using the precision rules in `policy`.
    fn forward(&self, input: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor>;
}

/// Built-in activation backed by Candle kernels.
struct BuiltinActivation {
    kind: ActivationKind,
}

impl Activation for BuiltinActivation {
    fn kind(&self) -> ActivationKind {
        self.kind
    }

    fn forward(&self, input: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let compute = policy.cast_for_matmul(input)?;
        let output = match self.kind {
            ActivationKind::Relu => compute.relu()?,
            ActivationKind::Tanh => compute.tanh()?,
            ActivationKind::Sigmoid => candle_nn::ops::sigmoid(&compute)?,
        };
        policy.cast_to_storage(&output)
    }
}

/// Returns a shared built-in activation implementation.
pub fn builtin(kind: ActivationKind) -> Arc<dyn Activation> {
    Arc::new(BuiltinActivation { kind })
}
