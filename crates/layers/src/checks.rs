//! Lightweight validation helpers shared across layer components.
//!
//! Every helper takes a `label` naming the tensor being checked so failures
//! read like `lstm.input: expected rank 2, got [3, 4, 5]`. They return
//! `candle_core::Result<()>` so call sites can propagate with `?`.

use candle_core::{DType, Error, Result, Tensor};

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(label: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    if tensor.rank() == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected rank {rank}, got {:?}",
            tensor.dims()
        )))
    }
}

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(label: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected shape {expected:?}, got {actual:?}"
        )))
    }
}

/// Ensures the trailing (feature) dimension equals `width`.
pub fn expect_last_dim(label: &str, tensor: &Tensor, width: usize) -> Result<()> {
    match tensor.dims().last() {
        Some(&actual) if actual == width => Ok(()),
        _ => Err(Error::Msg(format!(
            "{label}: expected trailing dim {width}, got {:?}",
            tensor.dims()
        ))),
    }
}

/// Rejects tensors with any zero-sized dimension.
pub fn expect_non_empty(label: &str, tensor: &Tensor) -> Result<()> {
    if tensor.dims().iter().all(|&dim| dim > 0) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: dimensions must be non-zero, got {:?}",
            tensor.dims()
        )))
    }
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(label: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected dtype in {allowed:?}, got {dtype:?}"
        )))
    }
}

/// Checks the tensor holds integer ids.
pub fn expect_integer(label: &str, tensor: &Tensor) -> Result<()> {
    if tensor.dtype().is_int() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{label}: expected integer dtype, got {:?}",
            tensor.dtype()
        )))
    }
}

/// Floating dtypes accepted for parameters and activations.
pub const FLOAT_DTYPES: &[DType] = &[DType::F16, DType::BF16, DType::F32];
