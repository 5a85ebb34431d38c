//! Named layout transitions used at component boundaries.
//!
//! The encoder works position-major (`[positions, batch, ..]`, the order in
//! which the recurrent scan visits the sequence) while batched reductions want
//! batch-major operands. Every reshape between the two lives here so call
//! sites read as the contract they implement.

use candle_core::{Result, Tensor};

/// `[positions, batch, F]` to `[batch, positions, F]`.
pub fn batch_major(sequence: &Tensor) -> Result<Tensor> {
    sequence.transpose(0, 1)?.contiguous()
}

/// `[positions, batch]` to `[batch, positions]`.
pub fn rows_per_batch(per_position: &Tensor) -> Result<Tensor> {
    per_position.t()?.contiguous()
}

/// `[batch, F]` repeated for each source position: `[positions, batch, F]`.
pub fn broadcast_over_positions(per_batch: &Tensor, positions: usize) -> Result<Tensor> {
    let (batch, width) = per_batch.dims2()?;
    per_batch
        .unsqueeze(0)?
        .broadcast_as((positions, batch, width))
}

/// One scalar per position as a width-1 feature: `[positions, batch, 1]`.
pub fn scalar_features(per_position: &Tensor) -> Result<Tensor> {
    per_position.unsqueeze(2)
}

/// Attention weights as one row vector per batch element: `[batch, 1, positions]`.
pub fn weight_rows(weights: &Tensor) -> Result<Tensor> {
    rows_per_batch(weights)?.unsqueeze(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn batch_major_swaps_leading_axes() -> Result<()> {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let seq = Tensor::from_vec(data, (3, 2, 2), &Device::Cpu)?;
        let swapped = batch_major(&seq)?;
        assert_eq!(swapped.dims(), &[2, 3, 2]);
        // position 2, batch 1 -> batch 1, position 2
        assert_eq!(
            swapped.get(1)?.get(2)?.to_vec1::<f32>()?,
            seq.get(2)?.get(1)?.to_vec1::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn weight_rows_transpose_positions_into_the_last_axis() -> Result<()> {
        let data = vec![0.1f32, 0.9, 0.2, 0.05, 0.7, 0.05];
        let weights = Tensor::from_vec(data, (3, 2), &Device::Cpu)?;
        let rows = weight_rows(&weights)?;
        assert_eq!(rows.dims(), &[2, 1, 3]);
        assert_eq!(rows.get(0)?.get(0)?.to_vec1::<f32>()?, vec![0.1, 0.2, 0.7]);
        assert_eq!(rows.get(1)?.get(0)?.to_vec1::<f32>()?, vec![0.9, 0.05, 0.05]);
        Ok(())
    }

    #[test]
    fn broadcast_repeats_each_batch_row() -> Result<()> {
        let per_batch = Tensor::ones((2, 4), DType::F32, &Device::Cpu)?;
        let spread = broadcast_over_positions(&per_batch, 5)?;
        assert_eq!(spread.dims(), &[5, 2, 4]);
        let coverage = Tensor::zeros((5, 2), DType::F32, &Device::Cpu)?;
        assert_eq!(scalar_features(&coverage)?.dims(), &[5, 2, 1]);
        Ok(())
    }
}
