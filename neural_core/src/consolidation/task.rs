//! Consolidated tasks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SparseFisher;
use crate::controller::ParameterView;

/// Unique identifier for consolidated tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A behavior worth protecting: the parameters it was learned with and how
/// much each of them mattered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationTask {
    pub id: TaskId,
    pub name: String,

    /// Flat parameter snapshot taken when the task was consolidated.
    pub optimal: Vec<f32>,

    pub fisher: SparseFisher,

    /// Weight of this task in the penalty.
    pub importance: f32,

    /// Agent tick at which the task was consolidated.
    pub created_tick: u64,
}

impl ConsolidationTask {
    /// `Σ F_i (θ_i − θ*_i)²` over this task's Fisher entries, and how many
    /// entries were visited.
    pub fn drift<P: ParameterView + ?Sized>(&self, current: &P) -> (f32, usize) {
        let mut sum = 0.0;
        let mut visited = 0;
        for (index, fisher) in self.fisher.iter() {
            let i = index as usize;
            let delta = current.parameter(i) - self.optimal[i];
            sum += fisher * delta * delta;
            visited += 1;
        }
        (sum, visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_only_counts_entries() {
        let task = ConsolidationTask {
            id: TaskId::new(),
            name: "patrol".into(),
            optimal: vec![0.0; 6],
            fisher: SparseFisher::from_entries(6, [(1, 2.0), (4, 0.5)]).unwrap(),
            importance: 1.0,
            created_tick: 0,
        };
        let current = vec![1.0, 1.0, 1.0, 1.0, 2.0, 1.0];
        let (sum, visited) = task.drift(&current);
        assert!((sum - 4.0).abs() < 1e-6);
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
