use attention::AttentionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SummarizerError>;

/// Failures surfaced by model construction, configuration loading and forward runs.
///
/// Every variant is fatal for the call that produced it; nothing is retried
/// and no partial output is returned.
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported configuration: {0}")]
    Config(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{name} has batch size {got} but the model was built for {expected}")]
    BatchMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{name} has {got} positions, expected {expected}")]
    SequenceLength {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("attention failed: {0}")]
    Attention(#[from] AttentionError),

    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl SummarizerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
