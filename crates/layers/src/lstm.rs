//! Long short-term memory cells and a bidirectional sequence runner.
//!
//! Layout contracts:
//!
//! * [`LstmCell::step`] consumes `x: [batch, input_dim]` and a state whose `h`
//!   and `c` are both `[batch, hidden_dim]`, returning the next state in the
//!   same layout. The cell output at a step is the new `h`.
//! * [`BiLstm::run`] consumes a position-major sequence `[seq, batch, input_dim]`
//!   and returns per-position outputs `[seq, batch, 2 * hidden_dim]` where the
//!   first half of the feature axis comes from the forward direction and the
//!   second half from the backward direction, together with each direction's
//!   final state (forward after position `seq - 1`, backward after position 0).
//!
//! Gates follow the usual `i, f, g, o` packing of a single `4 * hidden_dim`
//! projection:
//!
//! ```text
//! c' = sigmoid(f) * c + sigmoid(i) * tanh(g)
//! h' = sigmoid(o) * tanh(c')
//! ```

use std::fmt;
use std::sync::Arc;

use candle_core::{DType, Device, Result, Tensor, Var};

use crate::{
    activations::{builtin, Activation, ActivationKind},
    checks,
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
};

/// Dimensions of a single-layer LSTM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LstmConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
}

impl LstmConfig {
    pub fn new(input_dim: usize, hidden_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
        }
    }
}

/// Recurrent `(hidden, cell)` pair, each `[batch, width]`.
#[derive(Debug, Clone)]
pub struct LstmState {
    pub h: Tensor,
    pub c: Tensor,
}

impl LstmState {
    pub fn new(h: Tensor, c: Tensor) -> Self {
        Self { h, c }
    }

    /// All-zero state for `batch` rows of `width` features.
    pub fn zeros(batch: usize, width: usize, dtype: DType, device: &Device) -> Result<Self> {
        let h = Tensor::zeros((batch, width), dtype, device)?;
        let c = h.zeros_like()?;
        Ok(Self { h, c })
    }

    /// `concat(h, c)` along the feature axis: `[batch, 2 * width]`.
    pub fn joined(&self) -> Result<Tensor> {
        Tensor::cat(&[&self.h, &self.c], 1)
    }

    pub fn batch_size(&self) -> usize {
        self.h.dims().first().copied().unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.h.dims().last().copied().unwrap_or(0)
    }
}

/// Single LSTM cell advanced one position at a time.
#[derive(Clone)]
pub struct LstmCell {
    config: LstmConfig,
    input_proj: Linear,
    recurrent_proj: Linear,
    sigmoid: Arc<dyn Activation>,
    tanh: Arc<dyn Activation>,
    policy: PrecisionPolicy,
}

impl fmt::Debug for LstmCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LstmCell")
            .field("input_dim", &self.config.input_dim)
            .field("hidden_dim", &self.config.hidden_dim)
            .field("dtype", &self.policy.storage())
            .finish()
    }
}

impl LstmCell {
    /// Builds a cell with `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` gate weights.
    pub fn new(config: LstmConfig, device: &Device, dtype: DType) -> Result<Self> {
        let gates = 4 * config.hidden_dim;
        let input_proj = Linear::with_init(
            LinearConfig::new(config.input_dim, gates),
            &LinearInit::FanInUniform,
            device,
            dtype,
        )?;
        let recurrent_proj = Linear::with_init(
            LinearConfig::new(config.hidden_dim, gates).without_bias(),
            &LinearInit::FanInUniform,
            device,
            dtype,
        )?;
        Ok(Self {
            config,
            input_proj,
            recurrent_proj,
            sigmoid: builtin(ActivationKind::Sigmoid),
            tanh: builtin(ActivationKind::Tanh),
            policy: PrecisionPolicy::from_parameter_dtype(dtype),
        })
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    /// Zero state matching this cell's width and storage dtype.
    pub fn zero_state(&self, batch: usize, device: &Device) -> Result<LstmState> {
        LstmState::zeros(batch, self.config.hidden_dim, self.policy.storage(), device)
    }

    /// Advances the cell by one position.
    pub fn step(&self, x: &Tensor, state: &LstmState) -> Result<LstmState> {
        checks::expect_rank("lstm.input", x, 2)?;
        checks::expect_last_dim("lstm.input", x, self.config.input_dim)?;
        let batch = x.dims()[0];
        checks::expect_shape("lstm.h", &state.h, &[batch, self.config.hidden_dim])?;
        checks::expect_shape("lstm.c", &state.c, &[batch, self.config.hidden_dim])?;

        let policy = &self.policy;
        let gates = self
            .input_proj
            .forward(x, policy)?
            .add(&self.recurrent_proj.forward(&state.h, policy)?)?;
        let gates = policy.cast_for_matmul(&gates)?.chunk(4, 1)?;

        let input_gate = self.sigmoid.forward(&gates[0], policy)?;
        let forget_gate = self.sigmoid.forward(&gates[1], policy)?;
        let candidate = self.tanh.forward(&gates[2], policy)?;
        let output_gate = self.sigmoid.forward(&gates[3], policy)?;

        let c = forget_gate
            .mul(&state.c)?
            .add(&input_gate.mul(&candidate)?)?;
        let h = output_gate.mul(&self.tanh.forward(&c, policy)?)?;
        Ok(LstmState::new(h, c))
    }

    pub fn parameter_count(&self) -> usize {
        self.input_proj.parameter_count() + self.recurrent_proj.parameter_count()
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.input_proj.named_parameters(&format!("{scope}.input"));
        params.extend(
            self.recurrent_proj
                .named_parameters(&format!("{scope}.recurrent")),
        );
        params
    }
}

/// Result of running a [`BiLstm`] over a whole sequence.
#[derive(Debug, Clone)]
pub struct BiLstmOutput {
    /// Per-position `concat(h_forward, h_backward)`: `[seq, batch, 2 * hidden]`.
    pub outputs: Tensor,
    /// Forward direction state after the last position.
    pub forward_final: LstmState,
    /// Backward direction state after the first position.
    pub backward_final: LstmState,
}

/// Bidirectional single-layer LSTM.
#[derive(Debug, Clone)]
pub struct BiLstm {
    forward: LstmCell,
    backward: LstmCell,
}

impl BiLstm {
    pub fn new(config: LstmConfig, device: &Device, dtype: DType) -> Result<Self> {
        Ok(Self {
            forward: LstmCell::new(config, device, dtype)?,
            backward: LstmCell::new(config, device, dtype)?,
        })
    }

    pub fn config(&self) -> &LstmConfig {
        self.forward.config()
    }

    /// Runs both directions from zero state over `inputs: [seq, batch, input_dim]`.
    pub fn run(&self, inputs: &Tensor) -> Result<BiLstmOutput> {
        checks::expect_rank("bilstm.input", inputs, 3)?;
        checks::expect_non_empty("bilstm.input", inputs)?;
        let (seq_len, batch, _) = inputs.dims3()?;
        let device = inputs.device();

        let mut forward_state = self.forward.zero_state(batch, device)?;
        let mut forward_hidden = Vec::with_capacity(seq_len);
        for position in 0..seq_len {
            forward_state = self.forward.step(&inputs.get(position)?, &forward_state)?;
            forward_hidden.push(forward_state.h.clone());
        }

        let mut backward_state = self.backward.zero_state(batch, device)?;
        let mut backward_hidden = vec![None; seq_len];
        for position in (0..seq_len).rev() {
            backward_state = self.backward.step(&inputs.get(position)?, &backward_state)?;
            backward_hidden[position] = Some(backward_state.h.clone());
        }

        let per_position = forward_hidden
            .iter()
            .zip(backward_hidden.into_iter().flatten())
            .map(|(fwd, bwd)| Tensor::cat(&[fwd, &bwd], 1))
            .collect::<Result<Vec<_>>>()?;

        Ok(BiLstmOutput {
            outputs: Tensor::stack(&per_position, 0)?,
            forward_final: forward_state,
            backward_final: backward_state,
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.forward.parameter_count() + self.backward.parameter_count()
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.forward.named_parameters(&format!("{scope}.forward"));
        params.extend(self.backward.named_parameters(&format!("{scope}.backward")));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
        a.sub(b)?.abs()?.flatten_all()?.max(0)?.to_scalar::<f32>()
    }

    #[test]
    fn step_keeps_state_layout_and_bounds_hidden() -> Result<()> {
        let device = Device::Cpu;
        let cell = LstmCell::new(LstmConfig::new(6, 4), &device, DType::F32)?;
        let x = Tensor::randn(0f32, 3.0, (3, 6), &device)?;
        let state = cell.step(&x, &cell.zero_state(3, &device)?)?;

        assert_eq!(state.h.dims(), &[3, 4]);
        assert_eq!(state.c.dims(), &[3, 4]);
        assert_eq!(state.joined()?.dims(), &[3, 8]);
        let h = state.h.flatten_all()?.to_vec1::<f32>()?;
        assert!(h.iter().all(|v| v.abs() < 1.0));
        Ok(())
    }

    #[test]
    fn step_rejects_mismatched_state() -> Result<()> {
        let device = Device::Cpu;
        let cell = LstmCell::new(LstmConfig::new(2, 3), &device, DType::F32)?;
        let x = Tensor::zeros((2, 2), DType::F32, &device)?;
        let state = LstmState::zeros(4, 3, DType::F32, &device)?;
        assert!(cell.step(&x, &state).is_err());
        Ok(())
    }

    #[test]
    fn bidirectional_halves_match_manual_scans() -> Result<()> {
        let device = Device::Cpu;
        let lstm = BiLstm::new(LstmConfig::new(3, 2), &device, DType::F32)?;
        let inputs = Tensor::randn(0f32, 1.0, (4, 2, 3), &device)?;
        let out = lstm.run(&inputs)?;
        assert_eq!(out.outputs.dims(), &[4, 2, 4]);

        let mut state = lstm.forward.zero_state(2, &device)?;
        for t in 0..4 {
            state = lstm.forward.step(&inputs.get(t)?, &state)?;
            let half = out.outputs.get(t)?.narrow(1, 0, 2)?;
            assert!(max_abs_diff(&half, &state.h)? < 1e-6);
        }
        assert!(max_abs_diff(&out.forward_final.h, &state.h)? < 1e-6);

        let mut state = lstm.backward.zero_state(2, &device)?;
        for t in (0..4).rev() {
            state = lstm.backward.step(&inputs.get(t)?, &state)?;
            let half = out.outputs.get(t)?.narrow(1, 2, 2)?;
            assert!(max_abs_diff(&half, &state.h)? < 1e-6);
        }
        assert!(max_abs_diff(&out.backward_final.c, &state.c)? < 1e-6);
        Ok(())
    }

    #[test]
    fn named_parameters_are_scoped_per_direction() -> Result<()> {
        let lstm = BiLstm::new(LstmConfig::new(3, 2), &Device::Cpu, DType::F32)?;
        let names: Vec<String> = lstm
            .named_parameters("enc")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "enc.forward.input.weight",
                "enc.forward.input.bias",
                "enc.forward.recurrent.weight",
                "enc.backward.input.weight",
                "enc.backward.input.bias",
                "enc.backward.recurrent.weight",
            ]
        );
        // (4H x in + 4H) + 4H x H per direction
        assert_eq!(lstm.parameter_count(), 2 * (8 * 3 + 8 + 8 * 2));
        Ok(())
    }
}
