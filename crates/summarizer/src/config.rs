use std::{fs, path::Path};

use candle_core::{DType, Device};
use serde::Deserialize;

use crate::error::{Result, SummarizerError};

pub const DEFAULT_EMBEDDING_DIM: usize = 128;
pub const DEFAULT_HIDDEN_SIZE: usize = 256;

/// Construction-time settings for [`PointerGenerator`](crate::PointerGenerator).
///
/// Immutable once the model is built; every forward run uses the same batch
/// size and the same number of decode steps.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub vocab_size: usize,
    pub batch_size: usize,
    pub max_summary_length: usize,
    pub embedding_dim: usize,
    pub hidden_size: usize,
    /// Blend a copy distribution over source ids into the output (off by default).
    pub copy_mechanism: bool,
    pub dtype: DType,
    pub device: Device,
}

impl SummarizerConfig {
    /// Configuration with the default widths, f32 parameters on the CPU.
    pub fn new(vocab_size: usize, batch_size: usize, max_summary_length: usize) -> Self {
        Self {
            vocab_size,
            batch_size,
            max_summary_length,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            hidden_size: DEFAULT_HIDDEN_SIZE,
            copy_mechanism: false,
            dtype: DType::F32,
            device: Device::Cpu,
        }
    }

    pub fn with_dims(mut self, embedding_dim: usize, hidden_size: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_copy_mechanism(mut self, enabled: bool) -> Self {
        self.copy_mechanism = enabled;
        self
    }

    /// Width of encoder outputs, attention features and context vectors.
    pub fn feature_dim(&self) -> usize {
        2 * self.hidden_size
    }

    /// Loads a TOML (`.toml` or no extension) or JSON (`.json`) file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let file: ConfigFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(SummarizerError::config(format!(
                    "unsupported configuration extension '{other}'"
                )))
            }
        };
        Self::try_from(file)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.vocab_size == 0 {
            errors.push("vocab_size must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be greater than 0".to_string());
        }
        if self.max_summary_length == 0 {
            errors.push("max_summary_length must be greater than 0".to_string());
        }
        if self.embedding_dim == 0 {
            errors.push("embedding_dim must be greater than 0".to_string());
        }
        if self.hidden_size == 0 {
            errors.push("hidden_size must be greater than 0".to_string());
        }
        if !matches!(self.dtype, DType::F32 | DType::F16 | DType::BF16) {
            errors.push(format!("dtype {:?} is not a supported parameter dtype", self.dtype));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SummarizerError::Validation(errors))
        }
    }
}

/// On-disk form of [`SummarizerConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub vocab_size: usize,
    pub batch_size: usize,
    pub max_summary_length: usize,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default)]
    pub copy_mechanism: bool,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

fn default_hidden_size() -> usize {
    DEFAULT_HIDDEN_SIZE
}

fn default_dtype() -> String {
    "f32".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

impl TryFrom<ConfigFile> for SummarizerConfig {
    type Error = SummarizerError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let config = Self {
            vocab_size: file.vocab_size,
            batch_size: file.batch_size,
            max_summary_length: file.max_summary_length,
            embedding_dim: file.embedding_dim,
            hidden_size: file.hidden_size,
            copy_mechanism: file.copy_mechanism,
            dtype: parse_dtype(&file.dtype)?,
            device: parse_device(&file.device)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses `f32`, `f16` or `bf16` (case-insensitive).
pub fn parse_dtype(value: &str) -> Result<DType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "f32" | "float32" => Ok(DType::F32),
        "f16" | "float16" | "half" => Ok(DType::F16),
        "bf16" | "bfloat16" => Ok(DType::BF16),
        other => Err(SummarizerError::config(format!("unknown dtype '{other}'"))),
    }
}

/// Parses `cpu`, `cuda`, `cuda:N`, `metal` or `metal:N`.
pub fn parse_device(value: &str) -> Result<Device> {
    let value = value.trim().to_ascii_lowercase();
    let (kind, ordinal) = match value.split_once(':') {
        Some((kind, ordinal)) => {
            let ordinal = ordinal.parse::<usize>().map_err(|_| {
                SummarizerError::config(format!("invalid device ordinal in '{value}'"))
            })?;
            (kind.to_string(), ordinal)
        }
        None => (value.clone(), 0),
    };
    match kind.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Ok(Device::new_cuda(ordinal)?),
        "metal" => Ok(Device::new_metal(ordinal)?),
        other => Err(SummarizerError::config(format!("unknown device '{other}'"))),
    }
}
