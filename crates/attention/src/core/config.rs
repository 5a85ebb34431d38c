//! Configuration shared by attention implementations.

use candle_core::{DType, Device};

/// Widths and placement of the attention parameters.
#[derive(Debug, Clone)]
pub struct AttentionConfig {
    /// Recurrent hidden size `H`; attention features are `2 * H` wide.
    pub hidden_size: usize,
    /// Storage dtype of the projections.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

impl AttentionConfig {
    pub fn new(hidden_size: usize, dtype: DType, device: Device) -> Self {
        Self {
            hidden_size,
            dtype,
            device,
        }
    }

    /// Width of queries, encoder features and context vectors.
    pub fn feature_dim(&self) -> usize {
        2 * self.hidden_size
    }
}
