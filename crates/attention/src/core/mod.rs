//! Core traits and types shared across attention implementations.

pub mod config;
pub mod errors;

use candle_core::Tensor;

pub use config::AttentionConfig;
pub use errors::AttentionError;

/// Everything one attention call produces.
#[derive(Debug, Clone)]
pub struct AttentionOutput {
    /// Attention-weighted encoder summary, `[batch, F]`.
    pub context: Tensor,
    /// Distribution over source positions, `[source_len, batch]`.
    pub weights: Tensor,
    /// Input coverage plus `weights`, `[source_len, batch]`.
    pub coverage: Tensor,
}

/// Unified interface for attention over encoder positions.
///
/// See the crate documentation for the layout of every argument.
pub trait Attention: Send + Sync {
    fn attend(
        &self,
        query: &Tensor,
        encoder_out: &Tensor,
        encoder_features: &Tensor,
        coverage: &Tensor,
    ) -> Result<AttentionOutput, AttentionError>;
}
