//! Helpers for reading a [`SummaryOutput`] without touching the model again.

use candle_core::{DType, Tensor};
use serde::Serialize;

use crate::{error::Result, state::SummaryOutput};

/// Arg-max id per batch element for every step, `[steps][batch]`.
pub fn greedy_tokens(distributions: &[Tensor]) -> Result<Vec<Vec<u32>>> {
    distributions
        .iter()
        .map(|dist| -> Result<Vec<u32>> {
            Ok(dist.argmax(1)?.to_dtype(DType::U32)?.to_vec1::<u32>()?)
        })
        .collect()
}

/// Scalar view of one decode step, taken over the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatistics {
    pub step: usize,
    pub max_attention: f32,
    /// Largest coverage value consumed by the step.
    pub max_coverage: f32,
    pub max_probability: f32,
}

pub fn coverage_summary(output: &SummaryOutput) -> Result<Vec<StepStatistics>> {
    output
        .distributions
        .iter()
        .zip(&output.attentions)
        .zip(&output.coverages)
        .enumerate()
        .map(|(step, ((dist, attention), coverage))| -> Result<StepStatistics> {
            Ok(StepStatistics {
                step,
                max_attention: max_value(attention)?,
                max_coverage: max_value(coverage)?,
                max_probability: max_value(dist)?,
            })
        })
        .collect()
}

fn max_value(tensor: &Tensor) -> Result<f32> {
    Ok(tensor
        .to_dtype(DType::F32)?
        .flatten_all()?
        .max(0)?
        .to_scalar::<f32>()?)
}
