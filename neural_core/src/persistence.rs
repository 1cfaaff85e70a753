//! Versioned per-agent snapshots.
//!
//! A snapshot holds everything needed to resume an agent exactly where it
//! stopped: identity, affect, attention, recurrent state, sampler position,
//! memory contents and the full consolidation history. Parameters are only
//! included for agents that own a private copy.

use serde::{Deserialize, Serialize};
use std::path::Path;

use game_bridge::AgentProfile;

use crate::agent::AffectState;
use crate::consolidation::{AccumulatorRecord, ConsolidatorRecord};
use crate::controller::{ControllerBinding, ControllerParams, ParameterView, StateRecord};
use crate::error::{NeuralError, NeuralResult};
use crate::memory::MemoryRecord;
use crate::sampler::CounterRng;

/// Bumped whenever the snapshot layout changes.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub version: u32,
    pub profile: AgentProfile,
    pub binding: ControllerBinding,
    /// Controller input width; zero for detached agents.
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    pub parameter_count: usize,
    /// Present only for [`ControllerBinding::PerAgent`].
    pub parameters: Option<Vec<f32>>,
    pub states: Vec<StateRecord>,
    pub affect: AffectState,
    pub attention: Vec<f32>,
    pub expectation: Vec<f32>,
    pub working_memory: Vec<f32>,
    pub long_term_context: Vec<f32>,
    pub sampler: CounterRng,
    pub ticks: u64,
    pub memory: MemoryRecord,
    pub consolidator: ConsolidatorRecord,
    pub accumulator: AccumulatorRecord,
    pub writes_since_consolidation: u32,
    pub importance_sum: f32,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

fn check_version(found: u32) -> NeuralResult<()> {
    if found == SNAPSHOT_VERSION {
        Ok(())
    } else {
        Err(NeuralError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found,
        })
    }
}

impl AgentSnapshot {
    /// Reject snapshots taken against a different controller shape.
    pub fn check_compatible(&self, params: &ControllerParams) -> NeuralResult<()> {
        check_version(self.version)?;
        if self.binding == ControllerBinding::Detached {
            return Ok(());
        }
        let hidden_sizes = params.hidden_sizes();
        if self.input_size != params.input_size() || self.hidden_sizes != hidden_sizes {
            return Err(NeuralError::config(format!(
                "snapshot controller {}→{:?} does not match {}→{:?}",
                self.input_size,
                self.hidden_sizes,
                params.input_size(),
                hidden_sizes
            )));
        }
        let expected = params.parameter_count();
        let found = match &self.parameters {
            Some(parameters) if parameters.len() != self.parameter_count => parameters.len(),
            _ => self.parameter_count,
        };
        if found != expected {
            return Err(NeuralError::ParameterCountMismatch { expected, found });
        }
        if self.states.len() != hidden_sizes.len() {
            return Err(NeuralError::config(format!(
                "snapshot has {} recurrent states for {} layers",
                self.states.len(),
                hidden_sizes.len()
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> NeuralResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot, checking the version before anything else.
    pub fn from_json(source: &str) -> NeuralResult<Self> {
        let header: VersionHeader = serde_json::from_str(source)?;
        check_version(header.version)?;
        Ok(serde_json::from_str(source)?)
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> NeuralResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from_path(path: impl AsRef<Path>) -> NeuralResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}
