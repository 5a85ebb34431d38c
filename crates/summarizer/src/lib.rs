//! Sequence-to-sequence summarizer: a bidirectional LSTM encoder, coverage
//! attention and a single-step LSTM decoder folded over a teacher-forced
//! target.
//!
//! All sequence tensors are position-major (`[len, batch]`); see
//! [`attention`] for the full layout table.

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod model;
pub mod readout;
pub mod state;

pub use config::{ConfigFile, SummarizerConfig};
pub use decoder::{Decoder, DecoderStep};
pub use encoder::{Encoder, EncoderOutput};
pub use error::{Result, SummarizerError};
pub use model::PointerGenerator;
pub use readout::{coverage_summary, greedy_tokens, StepStatistics};
pub use state::{DecoderState, SummaryOutput};
