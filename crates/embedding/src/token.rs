//! Token embedding layer with a reserved padding row.
//!
//! Id [`PADDING_ID`] maps to an all-zero vector at every position so padded
//! source or target slots contribute nothing to the recurrent inputs. The row
//! is fixed at construction; keeping it out of gradient updates is the
//! trainer's responsibility.

use candle_core::{bail, DType, Device, Error, Result, Tensor, Var};
use layers::checks;

/// Vocabulary id reserved for padding.
pub const PADDING_ID: u32 = 0;

/// Configuration for building a token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbeddingConfig {
    /// Size of the vocabulary (number of distinct tokens).
    pub vocab_size: usize,
    /// Dimensionality of each embedding vector.
    pub hidden_dim: usize,
    /// Storage dtype used for the underlying parameters and outputs.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

/// Learnable token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
}

impl TokenEmbedding {
    /// Builds a new table sampled from `N(0, 1)` with a zero padding row.
    pub fn new(config: TokenEmbeddingConfig) -> Result<Self> {
        if config.vocab_size == 0 {
            bail!("token embedding requires vocab_size > 0");
        }
        if config.hidden_dim == 0 {
            bail!("token embedding requires hidden_dim > 0");
        }

        let padding = Tensor::zeros((1, config.hidden_dim), DType::F32, &config.device)?;
        let table = if config.vocab_size > 1 {
            let sampled = Tensor::randn(
                0f32,
                1f32,
                (config.vocab_size - 1, config.hidden_dim),
                &config.device,
            )?;
            Tensor::cat(&[&padding, &sampled], 0)?
        } else {
            padding
        };
        Self::from_weight(config, table)
    }

    /// Wraps an existing `[vocab_size, hidden_dim]` table, zeroing the padding row.
    pub fn from_weight(config: TokenEmbeddingConfig, weight: Tensor) -> Result<Self> {
        checks::expect_shape(
            "embedding.weight",
            &weight,
            &[config.vocab_size, config.hidden_dim],
        )?;
        let rest = match config.vocab_size.checked_sub(1) {
            Some(rest) => rest,
            None => bail!("token embedding requires vocab_size > 0"),
        };
        let weight = if rest > 0 {
            let padding = Tensor::zeros((1, config.hidden_dim), weight.dtype(), weight.device())?;
            Tensor::cat(&[&padding, &weight.narrow(0, 1, rest)?], 0)?
        } else {
            weight.zeros_like()?
        };
        let weight = weight.to_dtype(config.dtype)?.to_device(&config.device)?;
        log::debug!(
            "token embedding vocab={} dim={} dtype={:?}",
            config.vocab_size,
            config.hidden_dim,
            config.dtype
        );
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
        })
    }

    /// Returns the embedding configuration.
    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Returns the underlying weight tensor.
    pub fn weight(&self) -> &Tensor {
        self.weight.as_tensor()
    }

    /// Looks up embeddings for the provided token ids.
    ///
    /// Accepts `[batch]` (one decode step) or `[len, batch]` (a whole
    /// sequence) with an integer dtype. The output appends the embedding width:
    /// `[batch, hidden]` or `[len, batch, hidden]`.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        self.validate_token_ids(token_ids)?;

        self.ensure_id_range(token_ids)?;
        let flat = token_ids.flatten_all()?.to_dtype(DType::U32)?;

        let gathered = self.weight.as_tensor().index_select(&flat, 0)?;
        let mut output_dims = token_ids.dims().to_vec();
        output_dims.push(self.config.hidden_dim);
        gathered.reshape(output_dims)
    }

    /// Number of scalar parameters in the table.
    pub fn parameter_count(&self) -> usize {
        self.config.vocab_size * self.config.hidden_dim
    }

    /// Returns the trainable parameters for this embedding with an optional scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let prefix = if scope.is_empty() {
            "embedding".to_string()
        } else {
            scope.to_string()
        };
        vec![(format!("{}.weight", prefix), self.weight.clone())]
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<()> {
        checks::expect_integer("token_ids", token_ids)?;
        match token_ids.rank() {
            1 | 2 => checks::expect_non_empty("token_ids", token_ids),
            _ => Err(Error::Msg(format!(
                "token_ids must be shaped [batch] or [len, batch], got {:?}",
                token_ids.dims()
            ))),
        }
    }

    fn ensure_id_range(&self, token_ids: &Tensor) -> Result<()> {
        let ids = token_ids.flatten_all()?.to_dtype(DType::I64)?;
        let min_id = ids.min(0)?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(Error::Msg(format!(
                "encountered negative token id {} (minimum)",
                min_id
            )));
        }

        let max_id = ids.max(0)?.to_scalar::<i64>()?;
        let vocab = self.config.vocab_size as i64;
        if max_id >= vocab {
            return Err(Error::Msg(format!(
                "token id {} exceeds vocab size {}",
                max_id, vocab
            )));
        }
        Ok(())
    }
}
