//! Per-agent recurrent state and the bounded pools it is drawn from.

use serde::{Deserialize, Serialize};

use super::{CellParams, ControllerParams, Gate};
use crate::error::{expect_len, NeuralResult};
use crate::kernels::{Tensor, TensorArena};
use crate::pool::{SlotHandle, SlotPool};

/// Recurrent state of one layer for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct CellState {
    hidden: Tensor,
    cell: Tensor,
    /// Cell values before the latest step.
    prev_cell: Tensor,
    /// Post-activation gates from the latest step, in [`Gate`] order.
    gates: Tensor,
    /// `[input; previous hidden]` as fed to the latest step.
    concat: Tensor,
    steps: u64,
}

impl CellState {
    /// Carve a zeroed state for `params` out of an agent's arena.
    pub fn new_in(arena: &mut TensorArena, params: &CellParams) -> NeuralResult<Self> {
        let hidden = params.hidden_size();
        Ok(Self {
            hidden: arena.alloc_vector(hidden)?,
            cell: arena.alloc_vector(hidden)?,
            prev_cell: arena.alloc_vector(hidden)?,
            gates: arena.alloc_vector(4 * hidden)?,
            concat: arena.alloc_vector(params.concat_size())?,
            steps: 0,
        })
    }

    pub fn hidden(&self) -> &[f32] {
        self.hidden.values()
    }

    pub fn cell(&self) -> &[f32] {
        self.cell.values()
    }

    pub fn prev_cell(&self) -> &[f32] {
        self.prev_cell.values()
    }

    pub fn concat(&self) -> &[f32] {
        self.concat.values()
    }

    /// Cached activations of one gate.
    pub fn gate(&self, gate: Gate) -> &[f32] {
        let h = self.hidden.cols();
        let start = gate.index() * h;
        &self.gates.values()[start..start + h]
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Zero cell, hidden and step counter.
    pub fn reset(&mut self) {
        self.hidden.zero();
        self.cell.zero();
        self.prev_cell.zero();
        self.gates.zero();
        self.concat.zero();
        self.steps = 0;
    }

    pub fn is_finite(&self) -> bool {
        self.hidden.is_finite() && self.cell.is_finite()
    }

    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&mut Tensor, &mut Tensor, &mut Tensor, &mut Tensor, &mut Tensor) {
        (
            &mut self.hidden,
            &mut self.cell,
            &mut self.prev_cell,
            &mut self.gates,
            &mut self.concat,
        )
    }

    pub(crate) fn advance(&mut self) {
        self.steps += 1;
    }

    pub fn to_record(&self) -> StateRecord {
        StateRecord {
            hidden: self.hidden().to_vec(),
            cell: self.cell().to_vec(),
            steps: self.steps,
        }
    }

    /// Restore the recurrent part of a saved state.
    pub fn restore(&mut self, record: &StateRecord) -> NeuralResult<()> {
        expect_len("state restore", self.hidden.cols(), record.hidden.len())?;
        expect_len("state restore", self.cell.cols(), record.cell.len())?;
        self.reset();
        self.hidden.values_mut().copy_from_slice(&record.hidden);
        self.cell.values_mut().copy_from_slice(&record.cell);
        self.steps = record.steps;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn hidden_mut(&mut self) -> &mut [f32] {
        self.hidden.values_mut()
    }
}

/// Serializable recurrent state of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub hidden: Vec<f32>,
    pub cell: Vec<f32>,
    pub steps: u64,
}

/// One bounded pool of states per controller layer.
#[derive(Debug)]
pub struct StatePools {
    layers: Vec<SlotPool<CellState>>,
}

impl StatePools {
    pub fn new(layer_count: usize, capacity: usize) -> Self {
        Self {
            layers: (0..layer_count)
                .map(|_| SlotPool::with_capacity("controller state pool", capacity))
                .collect(),
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn capacity(&self) -> usize {
        self.layers.first().map_or(0, |pool| pool.capacity())
    }

    pub fn in_use(&self) -> usize {
        self.layers.first().map_or(0, |pool| pool.len())
    }

    /// Draw one state per layer. Either every layer gets a slot or none does.
    pub fn acquire(
        &mut self,
        params: &ControllerParams,
        arena: &mut TensorArena,
    ) -> NeuralResult<Vec<SlotHandle>> {
        expect_len("state pools", self.layers.len(), params.layers().len())?;
        let mut handles = Vec::with_capacity(self.layers.len());
        for (pool, layer) in self.layers.iter_mut().zip(params.layers()) {
            let inserted = CellState::new_in(arena, layer).and_then(|state| pool.insert(state));
            match inserted {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    self.release(&handles);
                    return Err(err);
                }
            }
        }
        Ok(handles)
    }

    /// Return an agent's slots. Unknown handles are ignored.
    pub fn release(&mut self, handles: &[SlotHandle]) {
        for (pool, handle) in self.layers.iter_mut().zip(handles) {
            let _ = pool.remove(*handle);
        }
    }

    pub fn get(&self, layer: usize, handle: SlotHandle) -> NeuralResult<&CellState> {
        self.layers[layer].get(handle)
    }

    pub fn get_mut(&mut self, layer: usize, handle: SlotHandle) -> NeuralResult<&mut CellState> {
        self.layers[layer].get_mut(handle)
    }

    pub fn reset(&mut self, handles: &[SlotHandle]) -> NeuralResult<()> {
        for (pool, handle) in self.layers.iter_mut().zip(handles) {
            pool.get_mut(*handle)?.reset();
        }
        Ok(())
    }

    pub fn is_finite(&self, handles: &[SlotHandle]) -> bool {
        self.layers
            .iter()
            .zip(handles)
            .all(|(pool, handle)| pool.get(*handle).map_or(false, |s| s.is_finite()))
    }

    pub fn records(&self, handles: &[SlotHandle]) -> NeuralResult<Vec<StateRecord>> {
        self.layers
            .iter()
            .zip(handles)
            .map(|(pool, handle)| pool.get(*handle).map(CellState::to_record))
            .collect()
    }

    pub fn restore(&mut self, handles: &[SlotHandle], records: &[StateRecord]) -> NeuralResult<()> {
        expect_len("state records", handles.len(), records.len())?;
        for ((pool, handle), record) in self.layers.iter_mut().zip(handles).zip(records) {
            pool.get_mut(*handle)?.restore(record)?;
        }
        Ok(())
    }

    /// Split around one layer: earlier layers shared, the given layer mutable.
    pub(crate) fn split_layer(
        &mut self,
        layer: usize,
    ) -> (&[SlotPool<CellState>], &mut SlotPool<CellState>) {
        let (before, rest) = self.layers.split_at_mut(layer);
        (before, &mut rest[0])
    }
}
