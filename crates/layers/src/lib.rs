//! Building blocks for the recurrent summarization model.
//!
//! The crate hosts the dense projections, activations and LSTM cells that the
//! encoder, attention and decoder crates assemble from Candle primitives. All
//! layers return `candle_core::Result` so shape or dtype problems propagate to
//! the caller instead of panicking.

pub mod activations;
pub mod checks;
pub mod dtypes;
pub mod linear;
pub mod lstm;

pub use activations::{builtin, Activation, ActivationKind};
pub use dtypes::PrecisionPolicy;
pub use linear::{Linear, LinearConfig, LinearInit, LinearLayer};
pub use lstm::{BiLstm, LstmCell, LstmConfig, LstmState};
