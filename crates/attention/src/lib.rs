//! Coverage attention for the recurrent summarizer.
//!
//! Given a decoder query, the encoder's per-position outputs, their cached
//! projection and the running coverage vector, an [`Attention`]
//! implementation produces a distribution over source positions, the
//! attention-weighted context vector and the next coverage vector.
//!
//! Layout contract (with `F = 2 * hidden_size`):
//!
//! | tensor | shape |
//! | --- | --- |
//! | query | `[batch, F]` |
//! | encoder outputs | `[batch, source_len, F]` |
//! | encoder features | `[source_len, batch, F]` |
//! | coverage in / out | `[source_len, batch]` |
//! | weights | `[source_len, batch]` |
//! | context | `[batch, F]` |
//!
//! Weights are normalised over source positions independently for every
//! batch column and always sum to one per column. Coverage only ever grows:
//! the returned coverage is the input coverage plus the new weights. Weights
//! and coverage are returned in the reduction dtype (`f32` for reduced
//! precision parameters) so the sums hold at `f32` tolerance.

pub mod core;
pub mod coverage;
pub mod layout;

pub use crate::core::{Attention, AttentionConfig, AttentionError, AttentionOutput};
pub use coverage::CoverageAttention;
