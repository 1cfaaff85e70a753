//! Fused gated-recurrent cell.

use super::{CellState, Gate};
use crate::error::{expect_len, NeuralError, NeuralResult};
use crate::kernels::{Kernels, NumericGuard, Tensor};
use crate::sampler::CounterRng;

/// Weights of one gated-recurrent layer.
///
/// A single `4H x (I + H)` block yields all four gate pre-activations in one
/// matrix-vector product. Rows are grouped by gate in [`Gate`] order.
///
/// Flat parameter order: weights row-major (without padding), then the
/// `4H` biases.
#[derive(Debug, Clone, PartialEq)]
pub struct CellParams {
    input_size: usize,
    hidden_size: usize,
    weights: Tensor,
    bias: Tensor,
}

impl CellParams {
    /// Deterministically initialized layer.
    ///
    /// Weights are uniform in `±sqrt(6 / (fan_in + fan_out))`; the forget
    /// gate starts with `forget_bias`, every other bias at zero.
    pub fn new(input_size: usize, hidden_size: usize, seed: u64, forget_bias: f32) -> Self {
        let concat = input_size + hidden_size;
        let mut weights = Tensor::zeros(4 * hidden_size, concat);
        let mut bias = Tensor::vector(4 * hidden_size);
        let limit = (6.0 / (concat + hidden_size).max(1) as f32).sqrt();
        let mut rng = CounterRng::new(seed);
        for r in 0..weights.rows() {
            for w in weights.row_mut(r) {
                *w = rng.next_symmetric(limit);
            }
        }
        bias.values_mut()[..hidden_size].fill(forget_bias);
        Self {
            input_size,
            hidden_size,
            weights,
            bias,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn concat_size(&self) -> usize {
        self.input_size + self.hidden_size
    }

    fn weight_count(&self) -> usize {
        4 * self.hidden_size * self.concat_size()
    }

    pub fn parameter_count(&self) -> usize {
        self.weight_count() + 4 * self.hidden_size
    }

    pub fn parameter(&self, index: usize) -> f32 {
        let weights = self.weight_count();
        if index < weights {
            let c = self.concat_size();
            self.weights.get(index / c, index % c)
        } else {
            self.bias.values()[index - weights]
        }
    }

    pub fn add_to_parameter(&mut self, index: usize, delta: f32) {
        let weights = self.weight_count();
        if index < weights {
            let c = self.concat_size();
            let (r, col) = (index / c, index % c);
            let value = self.weights.get(r, col) + delta;
            self.weights.set(r, col, value);
        } else {
            self.bias.values_mut()[index - weights] += delta;
        }
    }

    pub fn write_flat(&self, out: &mut Vec<f32>) {
        for row in self.weights.iter_rows() {
            out.extend_from_slice(row);
        }
        out.extend_from_slice(self.bias.values());
    }

    pub fn read_flat(&mut self, values: &[f32]) -> NeuralResult<()> {
        if values.len() != self.parameter_count() {
            return Err(NeuralError::ParameterCountMismatch {
                expected: self.parameter_count(),
                found: values.len(),
            });
        }
        let c = self.concat_size();
        let (weights, bias) = values.split_at(self.weight_count());
        if c > 0 {
            for (r, chunk) in weights.chunks_exact(c).enumerate() {
                self.weights.row_mut(r).copy_from_slice(chunk);
            }
        }
        self.bias.values_mut().copy_from_slice(bias);
        Ok(())
    }

    /// Advance `state` by one step on `input`. Returns how many values the
    /// guard had to repair.
    pub fn step(
        &self,
        kernels: &dyn Kernels,
        guard: NumericGuard,
        state: &mut CellState,
        input: &[f32],
    ) -> NeuralResult<usize> {
        expect_len("cell input", self.input_size, input.len())?;
        let h = self.hidden_size;
        let (hidden, cell, prev_cell, gates, concat) = state.parts_mut();

        let concat = concat.values_mut();
        concat[..self.input_size].copy_from_slice(input);
        concat[self.input_size..].copy_from_slice(hidden.values());

        let gates = gates.values_mut();
        kernels.matvec(gates, &self.weights, concat)?;
        kernels.add_assign(gates, self.bias.values());

        let (squashed, rest) = gates.split_at_mut(Gate::Candidate.index() * h);
        kernels.sigmoid(squashed);
        let (candidate, output) = rest.split_at_mut(h);
        kernels.tanh(candidate);
        kernels.sigmoid(output);

        prev_cell.values_mut().copy_from_slice(cell.values());
        let (forget, input_gate) = squashed.split_at(h);
        let cell = cell.values_mut();
        let hidden = hidden.values_mut();
        for k in 0..h {
            cell[k] = forget[k] * cell[k] + input_gate[k] * candidate[k];
            hidden[k] = output[k] * cell[k].tanh();
        }

        let repaired = guard.check("controller cell", cell) + guard.check("controller hidden", hidden);
        state.advance();
        Ok(repaired)
    }

    /// Visit `(local parameter index, dL/dθ)` for a loss whose gradient with
    /// respect to this layer's latest hidden output is `d_hidden`.
    ///
    /// The previous hidden and cell values are treated as constants, so this
    /// is exact for one step and truncated beyond it. Parameters whose
    /// gradient is exactly zero are skipped.
    pub fn for_each_gradient(
        &self,
        state: &CellState,
        d_hidden: &[f32],
        mut visit: impl FnMut(usize, f32),
    ) {
        let h = self.hidden_size;
        let c = self.concat_size();
        let weights = self.weight_count();
        let concat = state.concat();
        let (forget, input, candidate, output) = (
            state.gate(Gate::Forget),
            state.gate(Gate::Input),
            state.gate(Gate::Candidate),
            state.gate(Gate::Output),
        );
        let (cell, prev_cell) = (state.cell(), state.prev_cell());

        for (k, &dh) in d_hidden.iter().enumerate().take(h) {
            if dh == 0.0 {
                continue;
            }
            let tc = cell[k].tanh();
            let dc = dh * output[k] * (1.0 - tc * tc);
            let dz = [
                dc * prev_cell[k] * forget[k] * (1.0 - forget[k]),
                dc * candidate[k] * input[k] * (1.0 - input[k]),
                dc * input[k] * (1.0 - candidate[k] * candidate[k]),
                dh * tc * output[k] * (1.0 - output[k]),
            ];
            for gate in Gate::ALL {
                let g = dz[gate.index()];
                if g == 0.0 {
                    continue;
                }
                let row = gate.index() * h + k;
                for (col, &x) in concat.iter().enumerate() {
                    if x != 0.0 {
                        visit(row * c + col, g * x);
                    }
                }
                visit(weights + row, g);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{select_kernels, KernelBackend, NumericPolicy, TensorArena};

    #[test]
    fn test_parameter_layout() {
        let params = CellParams::new(3, 2, 1, 0.1);
        assert_eq!(params.concat_size(), 5);
        assert_eq!(params.parameter_count(), 4 * 2 * 5 + 8);
        let mut flat = Vec::new();
        params.write_flat(&mut flat);
        assert_eq!(flat.len(), params.parameter_count());
        for (i, v) in flat.iter().enumerate() {
            assert_eq!(params.parameter(i), *v);
        }
        // Forget biases come first among the biases.
        assert!((params.parameter(40) - 0.1).abs() < 1e-6);
        assert_eq!(params.parameter(42), 0.0);
    }

    #[test]
    fn test_init_is_deterministic() {
        assert_eq!(CellParams::new(4, 3, 9, 0.1), CellParams::new(4, 3, 9, 0.1));
        assert_ne!(CellParams::new(4, 3, 9, 0.1), CellParams::new(4, 3, 10, 0.1));
    }

    #[test]
    fn test_read_flat_rejects_wrong_count() {
        let mut params = CellParams::new(3, 2, 1, 0.1);
        let err = params.read_flat(&[0.0; 5]).unwrap_err();
        assert!(matches!(err, NeuralError::ParameterCountMismatch { expected: 48, found: 5 }));
    }

    #[test]
    fn test_step_bounds_and_counter() {
        let kernels = select_kernels(KernelBackend::Lanes);
        let params = CellParams::new(6, 4, 3, 0.1);
        let mut arena = TensorArena::new(1 << 12);
        let mut state = CellState::new_in(&mut arena, &params).unwrap();
        let guard = NumericGuard::new(NumericPolicy::Panic);
        for _ in 0..20 {
            params.step(kernels, guard, &mut state, &[5.0, -5.0, 1.0, 0.0, 2.0, -3.0]).unwrap();
        }
        assert_eq!(state.steps(), 20);
        assert!(state.hidden().iter().all(|h| h.abs() < 1.0));
        for gate in [Gate::Forget, Gate::Input, Gate::Output] {
            assert!(state.gate(gate).iter().all(|g| (0.0..=1.0).contains(g)));
        }
        assert!(state.gate(Gate::Candidate).iter().all(|g| g.abs() <= 1.0));
    }

    #[test]
    fn test_step_rejects_wrong_input_width() {
        let kernels = select_kernels(KernelBackend::Scalar);
        let params = CellParams::new(6, 4, 3, 0.1);
        let mut arena = TensorArena::new(1 << 12);
        let mut state = CellState::new_in(&mut arena, &params).unwrap();
        let result = params.step(kernels, NumericGuard::default(), &mut state, &[1.0; 5]);
        assert!(matches!(result, Err(NeuralError::DimensionMismatch { .. })));
        assert_eq!(state.steps(), 0);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let params = CellParams::new(3, 2, 17, 0.1);
        let input = [0.7, -0.4, 0.9];
        let d_hidden = [1.0, -0.5];

        let kernels = select_kernels(KernelBackend::Scalar);
        let mut arena = TensorArena::new(1 << 12);
        let mut state = CellState::new_in(&mut arena, &params).unwrap();
        // Prime the cell so the forget-gate path has a non-zero previous cell.
        params.step(kernels, NumericGuard::default(), &mut state, &input).unwrap();
        let primed = state.clone();
        params.step(kernels, NumericGuard::default(), &mut state, &input).unwrap();

        let mut analytic = vec![0.0; params.parameter_count()];
        params.for_each_gradient(&state, &d_hidden, |i, g| analytic[i] += g);

        let loss_from = |p: &CellParams| {
            let mut s = primed.clone();
            p.step(kernels, NumericGuard::default(), &mut s, &input).unwrap();
            s.hidden().iter().zip(&d_hidden).map(|(h, d)| h * d).sum::<f32>()
        };

        let eps = 1e-2;
        for i in 0..params.parameter_count() {
            let mut plus = params.clone();
            plus.add_to_parameter(i, eps);
            let mut minus = params.clone();
            minus.add_to_parameter(i, -eps);
            let numeric = (loss_from(&plus) - loss_from(&minus)) / (2.0 * eps);
            assert!(
                (numeric - analytic[i]).abs() < 2e-3,
                "param {i}: numeric {numeric} analytic {}",
                analytic[i]
            );
        }
    }
}
