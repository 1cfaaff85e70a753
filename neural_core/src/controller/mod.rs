//! Temporal controller: stacked gated-recurrent layers.
//!
//! Parameters are immutable once built and shared between every agent that
//! uses the same cell definition. Recurrent state lives in [`StatePools`],
//! one bounded pool per layer, and agents refer to their slots by handle.

mod cell;
mod state;

pub use cell::*;
pub use state::*;

use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::error::{expect_len, NeuralError, NeuralResult};
use crate::kernels::{Kernels, NumericGuard};
use crate::pool::SlotHandle;
use crate::sampler::mix;

/// Gates of the recurrent cell, in weight-block row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// How much of the old cell to keep, (0, 1).
    Forget,
    /// How much of the candidate to admit, (0, 1).
    Input,
    /// Proposed cell content, (-1, 1).
    Candidate,
    /// How much of the squashed cell to expose, (0, 1).
    Output,
}

impl Gate {
    pub const ALL: [Gate; 4] = [Gate::Forget, Gate::Input, Gate::Candidate, Gate::Output];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which layers feed the controller output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Only the last layer's hidden vector.
    #[default]
    FinalLayer,
    /// Every layer's hidden vector, concatenated input side first.
    AllLayers,
}

/// Who owns an agent's controller parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerBinding {
    /// Read-only parameters shared with every other shared agent.
    #[default]
    Shared,
    /// A private copy, free to adapt.
    PerAgent,
    /// No controller at all; the agent runs on fallback rules.
    Detached,
}

/// Read access to a flat parameter vector.
pub trait ParameterView {
    fn parameter_count(&self) -> usize;

    /// Value at a flat index. `index < parameter_count()`.
    fn parameter(&self, index: usize) -> f32;
}

impl ParameterView for [f32] {
    fn parameter_count(&self) -> usize {
        self.len()
    }

    fn parameter(&self, index: usize) -> f32 {
        self[index]
    }
}

impl ParameterView for Vec<f32> {
    fn parameter_count(&self) -> usize {
        self.len()
    }

    fn parameter(&self, index: usize) -> f32 {
        self[index]
    }
}

/// Parameters of the whole layer stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerParams {
    input_size: usize,
    layers: Vec<CellParams>,
    /// Flat offset of each layer.
    offsets: Vec<usize>,
    total: usize,
}

impl ControllerParams {
    pub fn new(input_size: usize, config: &ControllerConfig) -> NeuralResult<Self> {
        if config.hidden_sizes.is_empty() || config.hidden_sizes.contains(&0) {
            return Err(NeuralError::config("controller layers must be non-empty"));
        }
        let mut layers = Vec::with_capacity(config.hidden_sizes.len());
        let mut width = input_size;
        for (l, &hidden) in config.hidden_sizes.iter().enumerate() {
            let seed = mix(config.init_seed, l as u64);
            layers.push(CellParams::new(width, hidden, seed, config.forget_bias));
            width = hidden;
        }
        let mut offsets = Vec::with_capacity(layers.len());
        let mut total = 0;
        for layer in &layers {
            offsets.push(total);
            total += layer.parameter_count();
        }
        tracing::debug!(input_size, layers = layers.len(), parameters = total, "Built controller");
        Ok(Self {
            input_size,
            layers,
            offsets,
            total,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn layers(&self) -> &[CellParams] {
        &self.layers
    }

    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(CellParams::hidden_size).collect()
    }

    pub fn final_layer(&self) -> &CellParams {
        &self.layers[self.layers.len() - 1]
    }

    pub fn final_layer_offset(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn output_size(&self, mode: OutputMode) -> usize {
        match mode {
            OutputMode::FinalLayer => self.final_layer().hidden_size(),
            OutputMode::AllLayers => self.layers.iter().map(CellParams::hidden_size).sum(),
        }
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        let layer = self.offsets.partition_point(|&start| start <= index) - 1;
        (layer, index - self.offsets[layer])
    }

    pub fn add_to_parameter(&mut self, index: usize, delta: f32) {
        let (layer, local) = self.locate(index);
        self.layers[layer].add_to_parameter(local, delta);
    }

    pub fn flatten(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.total);
        for layer in &self.layers {
            layer.write_flat(&mut flat);
        }
        flat
    }

    /// Overwrite every parameter from a flat vector of exactly the right length.
    pub fn load_flat(&mut self, values: &[f32]) -> NeuralResult<()> {
        if values.len() != self.total {
            return Err(NeuralError::ParameterCountMismatch {
                expected: self.total,
                found: values.len(),
            });
        }
        for (layer, &offset) in self.layers.iter_mut().zip(&self.offsets) {
            let count = layer.parameter_count();
            layer.read_flat(&values[offset..offset + count])?;
        }
        Ok(())
    }

    /// Run one step through every layer and write the configured output.
    ///
    /// Returns how many non-finite values the guard repaired along the way.
    #[allow(clippy::too_many_arguments)]
    pub fn forward(
        &self,
        kernels: &dyn Kernels,
        guard: NumericGuard,
        pools: &mut StatePools,
        handles: &[SlotHandle],
        input: &[f32],
        mode: OutputMode,
        out: &mut [f32],
    ) -> NeuralResult<usize> {
        expect_len("controller layers", self.layers.len(), handles.len())?;
        expect_len("controller output", self.output_size(mode), out.len())?;
        let mut repaired = 0;
        for (l, layer) in self.layers.iter().enumerate() {
            let (before, pool) = pools.split_layer(l);
            let state = pool.get_mut(handles[l])?;
            let layer_input = match l {
                0 => input,
                _ => before[l - 1].get(handles[l - 1])?.hidden(),
            };
            repaired += layer.step(kernels, guard, state, layer_input)?;
        }

        match mode {
            OutputMode::FinalLayer => {
                let last = self.layers.len() - 1;
                out.copy_from_slice(pools.get(last, handles[last])?.hidden());
            }
            OutputMode::AllLayers => {
                let mut start = 0;
                for (l, layer) in self.layers.iter().enumerate() {
                    let end = start + layer.hidden_size();
                    out[start..end].copy_from_slice(pools.get(l, handles[l])?.hidden());
                    start = end;
                }
            }
        }
        Ok(repaired)
    }

    /// Visit `(flat index, gradient)` for a loss with gradient `d_hidden`
    /// on the final layer's latest output. See [`CellParams::for_each_gradient`].
    pub fn for_each_final_gradient(
        &self,
        pools: &StatePools,
        handles: &[SlotHandle],
        d_hidden: &[f32],
        mut visit: impl FnMut(usize, f32),
    ) -> NeuralResult<()> {
        expect_len("controller layers", self.layers.len(), handles.len())?;
        let last = self.layers.len() - 1;
        let offset = self.final_layer_offset();
        let state = pools.get(last, handles[last])?;
        self.final_layer()
            .for_each_gradient(state, d_hidden, |i, g| visit(offset + i, g));
        Ok(())
    }
}

impl ParameterView for ControllerParams {
    fn parameter_count(&self) -> usize {
        self.total
    }

    fn parameter(&self, index: usize) -> f32 {
        let (layer, local) = self.locate(index);
        self.layers[layer].parameter(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{select_kernels, KernelBackend, NumericPolicy, TensorArena};

    fn config(hidden: Vec<usize>) -> ControllerConfig {
        ControllerConfig {
            hidden_sizes: hidden,
            ..ControllerConfig::default()
        }
    }

    struct Rig {
        params: ControllerParams,
        pools: StatePools,
        arena: TensorArena,
    }

    impl Rig {
        fn new(input: usize, hidden: Vec<usize>, capacity: usize) -> Self {
            let params = ControllerParams::new(input, &config(hidden)).unwrap();
            let pools = StatePools::new(params.layers().len(), capacity);
            Self {
                params,
                pools,
                arena: TensorArena::new(1 << 16),
            }
        }

        fn run(&mut self, handles: &[SlotHandle], input: &[f32], mode: OutputMode) -> Vec<f32> {
            let mut out = vec![0.0; self.params.output_size(mode)];
            self.params
                .forward(
                    select_kernels(KernelBackend::Scalar),
                    NumericGuard::new(NumericPolicy::Panic),
                    &mut self.pools,
                    handles,
                    input,
                    mode,
                    &mut out,
                )
                .unwrap();
            out
        }
    }

    #[test]
    fn test_same_input_twice_differs_without_reset() {
        let mut rig = Rig::new(4, vec![6, 5], 2);
        let handles = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let input = [0.5, -1.0, 0.25, 2.0];
        let first = rig.run(&handles, &input, OutputMode::FinalLayer);
        let second = rig.run(&handles, &input, OutputMode::FinalLayer);
        assert_ne!(first, second);
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        let mut rig = Rig::new(4, vec![6, 5], 2);
        let handles = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let inputs: Vec<[f32; 4]> = (0..6)
            .map(|t| [t as f32 * 0.1, 1.0 - t as f32 * 0.2, 0.3, -0.7])
            .collect();

        let run_sequence = |rig: &mut Rig| -> Vec<Vec<f32>> {
            inputs
                .iter()
                .map(|x| rig.run(&handles, x, OutputMode::FinalLayer))
                .collect()
        };

        rig.pools.reset(&handles).unwrap();
        let first = run_sequence(&mut rig);
        rig.pools.reset(&handles).unwrap();
        let second = run_sequence(&mut rig);
        assert_eq!(first, second);
        assert_eq!(rig.pools.get(0, handles[0]).unwrap().steps(), 6);
    }

    #[test]
    fn test_agents_do_not_share_state() {
        let mut rig = Rig::new(3, vec![4], 2);
        let a = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let b = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let out_a = rig.run(&a, &[1.0, 0.0, -1.0], OutputMode::FinalLayer);
        rig.run(&a, &[0.3, 0.3, 0.3], OutputMode::FinalLayer);
        let out_b = rig.run(&b, &[1.0, 0.0, -1.0], OutputMode::FinalLayer);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_pool_exhaustion_is_explicit() {
        let mut rig = Rig::new(3, vec![4, 4], 1);
        let first = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let err = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap_err();
        assert!(err.is_capacity());
        // The first agent's slots are untouched.
        assert!(rig.pools.get(0, first[0]).is_ok());
        assert_eq!(rig.pools.in_use(), 1);

        rig.pools.release(&first);
        assert_eq!(rig.pools.in_use(), 0);
        assert!(rig.pools.acquire(&rig.params, &mut rig.arena).is_ok());
    }

    #[test]
    fn test_all_layers_output() {
        let mut rig = Rig::new(3, vec![4, 2], 1);
        let handles = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        let all = rig.run(&handles, &[0.2, 0.4, 0.6], OutputMode::AllLayers);
        assert_eq!(all.len(), 6);
        assert_eq!(&all[..4], rig.pools.get(0, handles[0]).unwrap().hidden());
        assert_eq!(&all[4..], rig.pools.get(1, handles[1]).unwrap().hidden());
    }

    #[test]
    fn test_flat_parameter_view() {
        let params = ControllerParams::new(3, &config(vec![4, 2])).unwrap();
        let flat = params.flatten();
        assert_eq!(flat.len(), params.parameter_count());
        for i in [0, 1, 50, params.final_layer_offset(), flat.len() - 1] {
            assert_eq!(params.parameter(i), flat[i]);
        }

        let mut copy = params.clone();
        let shifted: Vec<f32> = flat.iter().map(|v| v + 1.0).collect();
        copy.load_flat(&shifted).unwrap();
        assert_eq!(copy.flatten(), shifted);
        assert!(copy.load_flat(&shifted[1..]).is_err());

        copy.add_to_parameter(params.final_layer_offset(), 0.5);
        assert!((copy.parameter(params.final_layer_offset()) - shifted[params.final_layer_offset()] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_final_gradient_uses_global_indices() {
        let mut rig = Rig::new(3, vec![4, 2], 1);
        let handles = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        rig.run(&handles, &[0.2, 0.4, 0.6], OutputMode::FinalLayer);
        let mut indices = Vec::new();
        rig.params
            .for_each_final_gradient(&rig.pools, &handles, &[1.0, 0.0], |i, _| indices.push(i))
            .unwrap();
        assert!(!indices.is_empty());
        assert!(indices.iter().all(|&i| i >= rig.params.final_layer_offset()));
        assert!(indices.iter().all(|&i| i < rig.params.parameter_count()));
    }

    #[test]
    fn test_rejects_stale_handles() {
        let mut rig = Rig::new(3, vec![4], 1);
        let handles = rig.pools.acquire(&rig.params, &mut rig.arena).unwrap();
        rig.pools.release(&handles);
        let mut out = vec![0.0; 4];
        let result = rig.params.forward(
            select_kernels(KernelBackend::Scalar),
            NumericGuard::default(),
            &mut rig.pools,
            &handles,
            &[0.0; 3],
            OutputMode::FinalLayer,
            &mut out,
        );
        assert!(matches!(result, Err(NeuralError::StaleHandle { .. })));
    }
}
