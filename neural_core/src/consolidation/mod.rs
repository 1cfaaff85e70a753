//! Continual-learning consolidator.
//!
//! Each consolidated task keeps a snapshot of the parameters it was learned
//! with plus a sparse Fisher table saying which of them mattered. Moving an
//! important parameter away from its snapshot costs
//!
//! ```text
//! λ · Σ_tasks importance · Σ_entries F_i · (θ_i − θ*_i)²
//! ```
//!
//! and evaluating that cost only touches stored Fisher entries, never the
//! full parameter vector.

mod fisher;
mod task;

pub use fisher::*;
pub use task::*;

use serde::{Deserialize, Serialize};

use crate::config::ConsolidationConfig;
use crate::controller::ParameterView;
use crate::error::{expect_len, NeuralError, NeuralResult};

/// Which task makes room when the task list is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrunePolicy {
    #[default]
    LeastImportant,
    Oldest,
}

/// Penalty value plus how much work it took.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenaltyReport {
    pub value: f32,
    /// Fisher entries visited; grows with non-zero entries only.
    pub entries_visited: usize,
    pub tasks: usize,
}

/// Serializable consolidator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatorRecord {
    pub parameter_count: usize,
    pub lambda: f32,
    pub previous_validation: Option<f32>,
    pub consolidations: u64,
    pub tasks: Vec<ConsolidationTask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consolidator {
    parameter_count: usize,
    tasks: Vec<ConsolidationTask>,
    max_tasks: usize,
    lambda: f32,
    min_lambda: f32,
    max_lambda: f32,
    lambda_decay: f32,
    prune_policy: PrunePolicy,
    previous_validation: Option<f32>,
    consolidations: u64,
}

impl Consolidator {
    pub fn new(parameter_count: usize, config: &ConsolidationConfig) -> Self {
        Self {
            parameter_count,
            tasks: Vec::with_capacity(config.max_tasks),
            max_tasks: config.max_tasks,
            lambda: config.lambda.clamp(config.min_lambda, config.max_lambda),
            min_lambda: config.min_lambda,
            max_lambda: config.max_lambda,
            lambda_decay: config.lambda_decay,
            prune_policy: config.prune_policy,
            previous_validation: None,
            consolidations: 0,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn tasks(&self) -> &[ConsolidationTask] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    pub fn lambda(&self) -> f32 {
        self.lambda
    }

    /// Total consolidations performed, including pruned tasks.
    pub fn consolidations(&self) -> u64 {
        self.consolidations
    }

    /// Stored Fisher entries across every task.
    pub fn total_entries(&self) -> usize {
        self.tasks.iter().map(|t| t.fisher.nnz()).sum()
    }

    /// Set λ, clamped to the configured range.
    pub fn set_lambda(&mut self, lambda: f32) {
        self.lambda = lambda.clamp(self.min_lambda, self.max_lambda);
    }

    pub fn set_lambda_range(&mut self, min_lambda: f32, max_lambda: f32) -> NeuralResult<()> {
        if min_lambda < 0.0 || min_lambda > max_lambda {
            return Err(NeuralError::config("lambda range is inverted or negative"));
        }
        self.min_lambda = min_lambda;
        self.max_lambda = max_lambda;
        self.set_lambda(self.lambda);
        Ok(())
    }

    /// Store a new task. A full task list first drops one task according to
    /// the prune policy, and that task is returned.
    pub fn consolidate(
        &mut self,
        name: impl Into<String>,
        optimal: Vec<f32>,
        fisher: SparseFisher,
        importance: f32,
        tick: u64,
    ) -> NeuralResult<(TaskId, Option<ConsolidationTask>)> {
        if optimal.len() != self.parameter_count {
            return Err(NeuralError::ParameterCountMismatch {
                expected: self.parameter_count,
                found: optimal.len(),
            });
        }
        fisher.validate(self.parameter_count)?;

        let pruned = if self.tasks.len() >= self.max_tasks {
            self.prune_one()
        } else {
            None
        };
        let task = ConsolidationTask {
            id: TaskId::new(),
            name: name.into(),
            optimal,
            fisher,
            importance: importance.max(0.0),
            created_tick: tick,
        };
        let id = task.id;
        tracing::info!(
            task = %id,
            name = %task.name,
            entries = task.fisher.nnz(),
            sparsity = task.fisher.sparsity(),
            tasks = self.tasks.len() + 1,
            "Consolidated task"
        );
        self.tasks.push(task);
        self.consolidations += 1;
        Ok((id, pruned))
    }

    fn prune_one(&mut self) -> Option<ConsolidationTask> {
        let victim = match self.prune_policy {
            PrunePolicy::LeastImportant => (0..self.tasks.len()).min_by(|&a, &b| {
                let (ta, tb) = (&self.tasks[a], &self.tasks[b]);
                ta.importance
                    .total_cmp(&tb.importance)
                    .then(ta.created_tick.cmp(&tb.created_tick))
            }),
            PrunePolicy::Oldest => {
                (0..self.tasks.len()).min_by_key(|&i| self.tasks[i].created_tick)
            }
        }?;
        let task = self.tasks.remove(victim);
        tracing::debug!(task = %task.id, name = %task.name, "Pruned consolidated task");
        Some(task)
    }

    pub fn remove_task(&mut self, id: TaskId) -> Option<ConsolidationTask> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.previous_validation = None;
    }

    /// Penalty for the given parameters; exactly zero with no tasks.
    pub fn penalty<P: ParameterView + ?Sized>(&self, current: &P) -> PenaltyReport {
        let mut report = PenaltyReport {
            tasks: self.tasks.len(),
            ..PenaltyReport::default()
        };
        let mut total = 0.0;
        for task in &self.tasks {
            let (drift, visited) = task.drift(current);
            total += task.importance * drift;
            report.entries_visited += visited;
        }
        report.value = self.lambda * total;
        report
    }

    /// Visit `(index, ∂penalty/∂θ_index)` for every stored Fisher entry.
    ///
    /// Indices shared by several tasks are visited once per task.
    pub fn for_each_penalty_gradient<P: ParameterView + ?Sized>(
        &self,
        current: &P,
        mut visit: impl FnMut(usize, f32),
    ) {
        for task in &self.tasks {
            let scale = 2.0 * self.lambda * task.importance;
            for (index, fisher) in task.fisher.iter() {
                let i = index as usize;
                visit(i, scale * fisher * (current.parameter(i) - task.optimal[i]));
            }
        }
    }

    /// Add the penalty gradient into a dense buffer. Returns entries visited.
    pub fn penalty_gradient<P: ParameterView + ?Sized>(
        &self,
        current: &P,
        gradient: &mut [f32],
    ) -> NeuralResult<usize> {
        expect_len("penalty gradient", self.parameter_count, gradient.len())?;
        let mut visited = 0;
        self.for_each_penalty_gradient(current, |i, g| {
            gradient[i] += g;
            visited += 1;
        });
        Ok(visited)
    }

    /// Adapt λ from the latest losses and return the new value.
    ///
    /// A validation loss rising by more than 0.01 since the last call means
    /// earlier tasks are being forgotten, so λ grows by 10%. A falling
    /// validation loss while the current loss stays above 1.5× validation
    /// means learning is over-constrained, so λ shrinks by 10%. Either way λ
    /// then decays and is clamped to its range.
    pub fn update_lambda(&mut self, current_loss: f32, validation_loss: f32) -> f32 {
        if let Some(previous) = self.previous_validation {
            let change = validation_loss - previous;
            if change > 0.01 {
                self.lambda = (self.lambda * 1.1).min(self.max_lambda);
            } else if change < -0.01 && current_loss > validation_loss * 1.5 {
                self.lambda = (self.lambda * 0.9).max(self.min_lambda);
            }
        }
        self.previous_validation = Some(validation_loss);
        self.lambda = (self.lambda * self.lambda_decay).clamp(self.min_lambda, self.max_lambda);
        self.lambda
    }

    /// Heuristic λ for the current model size and task count.
    pub fn recommended_lambda(&self) -> f32 {
        let base = (self.parameter_count.max(1) as f32).ln();
        100.0 * base * (1.0 + 0.5 * self.tasks.len() as f32)
    }

    pub fn to_record(&self) -> ConsolidatorRecord {
        ConsolidatorRecord {
            parameter_count: self.parameter_count,
            lambda: self.lambda,
            previous_validation: self.previous_validation,
            consolidations: self.consolidations,
            tasks: self.tasks.clone(),
        }
    }

    /// Restore saved state, re-validating every task against this model.
    pub fn restore(&mut self, record: ConsolidatorRecord) -> NeuralResult<()> {
        if record.parameter_count != self.parameter_count {
            return Err(NeuralError::ParameterCountMismatch {
                expected: self.parameter_count,
                found: record.parameter_count,
            });
        }
        if record.tasks.len() > self.max_tasks {
            return Err(NeuralError::exhausted("consolidation tasks", self.max_tasks));
        }
        for task in &record.tasks {
            if task.optimal.len() != self.parameter_count {
                return Err(NeuralError::ParameterCountMismatch {
                    expected: self.parameter_count,
                    found: task.optimal.len(),
                });
            }
            task.fisher.validate(self.parameter_count)?;
        }
        self.tasks = record.tasks;
        self.set_lambda(record.lambda);
        self.previous_validation = record.previous_validation;
        self.consolidations = record.consolidations;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consolidator(parameter_count: usize) -> Consolidator {
        Consolidator::new(parameter_count, &ConsolidationConfig::default())
    }

    /// Fisher table with an entry on every `step`-th parameter.
    fn strided_fisher(parameter_count: usize, step: usize) -> SparseFisher {
        SparseFisher::from_entries(
            parameter_count,
            (0..parameter_count).step_by(step).map(|i| (i as u32, 1.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_no_tasks_no_penalty() {
        let c = consolidator(100);
        let report = c.penalty(&vec![5.0; 100]);
        assert_eq!(report.value, 0.0);
        assert_eq!(report.entries_visited, 0);
    }

    #[test]
    fn test_zero_fisher_contributes_nothing() {
        let mut c = consolidator(50);
        let fisher = SparseFisher::from_entries(50, (0..50).map(|i| (i, 0.0))).unwrap();
        c.consolidate("idle", vec![0.0; 50], fisher, 1.0, 0).unwrap();
        let drifted: Vec<f32> = (0..50).map(|i| i as f32 * 100.0).collect();
        assert_eq!(c.penalty(&drifted).value, 0.0);
    }

    #[test]
    fn test_penalty_value() {
        let mut c = consolidator(4);
        c.set_lambda(10.0);
        let fisher = SparseFisher::from_entries(4, [(0, 1.0), (3, 2.0)]).unwrap();
        c.consolidate("a", vec![0.0; 4], fisher, 0.5, 0).unwrap();
        let report = c.penalty(&vec![1.0, 9.0, 9.0, 2.0]);
        // 10 * 0.5 * (1 * 1 + 2 * 4)
        assert!((report.value - 45.0).abs() < 1e-4);
        assert_eq!(report.entries_visited, 2);
    }

    #[test]
    fn test_penalty_cost_follows_entries_not_parameters() {
        let parameter_count = 10_000;
        let current = vec![0.5; parameter_count];

        let mut sparse = consolidator(parameter_count);
        sparse
            .consolidate("sparse", vec![0.0; parameter_count], strided_fisher(parameter_count, 100), 1.0, 0)
            .unwrap();
        let mut dense = consolidator(parameter_count);
        dense
            .consolidate("dense", vec![0.0; parameter_count], strided_fisher(parameter_count, 2), 1.0, 0)
            .unwrap();

        let sparse_report = sparse.penalty(&current);
        let dense_report = dense.penalty(&current);
        assert_eq!(sparse_report.entries_visited, 100);
        assert_eq!(dense_report.entries_visited, 5_000);
        assert_eq!(dense_report.entries_visited / sparse_report.entries_visited, 50);
        assert!((dense_report.value / sparse_report.value - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_penalty_gradient_matches_finite_difference() {
        let mut c = consolidator(3);
        c.set_lambda(2.0);
        let fisher = SparseFisher::from_entries(3, [(0, 1.5), (2, 0.5)]).unwrap();
        c.consolidate("a", vec![0.2, 0.0, -0.3], fisher, 0.8, 0).unwrap();
        let theta = vec![0.5, 1.0, 0.1];
        let mut grad = vec![0.0; 3];
        assert_eq!(c.penalty_gradient(&theta, &mut grad).unwrap(), 2);
        let eps = 1e-3;
        for i in 0..3 {
            let mut plus = theta.clone();
            plus[i] += eps;
            let mut minus = theta.clone();
            minus[i] -= eps;
            let numeric = (c.penalty(&plus).value - c.penalty(&minus).value) / (2.0 * eps);
            assert!((numeric - grad[i]).abs() < 1e-2, "param {i}: {numeric} vs {}", grad[i]);
        }
        assert!(c.penalty_gradient(&theta, &mut [0.0; 2]).is_err());
    }

    #[test]
    fn test_consolidate_rejects_bad_input() {
        let mut c = consolidator(10);
        let bad_fisher = SparseFisher::from_entries(20, [(15, 1.0)]).unwrap();
        assert!(c.consolidate("x", vec![0.0; 10], bad_fisher, 1.0, 0).is_err());
        assert!(matches!(
            c.consolidate("x", vec![0.0; 9], SparseFisher::new(10), 1.0, 0),
            Err(NeuralError::ParameterCountMismatch { expected: 10, found: 9 })
        ));
        assert_eq!(c.task_count(), 0);
    }

    #[test]
    fn test_prune_least_important() {
        let config = ConsolidationConfig {
            max_tasks: 2,
            ..ConsolidationConfig::default()
        };
        let mut c = Consolidator::new(4, &config);
        c.consolidate("a", vec![0.0; 4], SparseFisher::new(4), 0.9, 1).unwrap();
        c.consolidate("b", vec![0.0; 4], SparseFisher::new(4), 0.1, 2).unwrap();
        let (_, pruned) = c.consolidate("c", vec![0.0; 4], SparseFisher::new(4), 0.5, 3).unwrap();
        assert_eq!(pruned.unwrap().name, "b");
        let names: Vec<&str> = c.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_prune_oldest() {
        let config = ConsolidationConfig {
            max_tasks: 2,
            prune_policy: PrunePolicy::Oldest,
            ..ConsolidationConfig::default()
        };
        let mut c = Consolidator::new(4, &config);
        c.consolidate("a", vec![0.0; 4], SparseFisher::new(4), 0.9, 1).unwrap();
        c.consolidate("b", vec![0.0; 4], SparseFisher::new(4), 0.1, 2).unwrap();
        let (_, pruned) = c.consolidate("c", vec![0.0; 4], SparseFisher::new(4), 0.5, 3).unwrap();
        assert_eq!(pruned.unwrap().name, "a");
        assert_eq!(c.task_count(), 2);
        assert_eq!(c.consolidations(), 3);
    }

    #[test]
    fn test_lambda_grows_when_forgetting() {
        let config = ConsolidationConfig {
            lambda_decay: 1.0,
            ..ConsolidationConfig::default()
        };
        let mut c = Consolidator::new(10, &config);
        assert_eq!(c.update_lambda(1.0, 1.0), 400.0);
        let grown = c.update_lambda(1.0, 1.5);
        assert!((grown - 440.0).abs() < 1e-3);
    }

    #[test]
    fn test_lambda_shrinks_when_over_constrained() {
        let config = ConsolidationConfig {
            lambda_decay: 1.0,
            ..ConsolidationConfig::default()
        };
        let mut c = Consolidator::new(10, &config);
        c.update_lambda(3.0, 1.0);
        let shrunk = c.update_lambda(3.0, 0.5);
        assert!((shrunk - 360.0).abs() < 1e-3);
    }

    #[test]
    fn test_lambda_decays_to_floor() {
        let config = ConsolidationConfig {
            lambda: 2.0,
            lambda_decay: 0.5,
            ..ConsolidationConfig::default()
        };
        let mut c = Consolidator::new(10, &config);
        for _ in 0..10 {
            c.update_lambda(1.0, 1.0);
        }
        assert_eq!(c.lambda(), config.min_lambda);
    }

    #[test]
    fn test_recommended_lambda() {
        let mut c = consolidator(1000);
        let expected = 100.0 * (1000.0f32).ln();
        assert!((c.recommended_lambda() - expected).abs() < 1e-2);
        c.consolidate("a", vec![0.0; 1000], SparseFisher::new(1000), 1.0, 0).unwrap();
        assert!((c.recommended_lambda() - expected * 1.5).abs() < 1e-2);
    }

    #[test]
    fn test_record_round_trip() {
        let mut c = consolidator(8);
        let fisher = SparseFisher::from_entries(8, [(2, 0.3)]).unwrap();
        c.consolidate("a", vec![1.0; 8], fisher, 0.7, 5).unwrap();
        c.update_lambda(1.0, 2.0);

        let json = serde_json::to_string(&c.to_record()).unwrap();
        let record: ConsolidatorRecord = serde_json::from_str(&json).unwrap();
        let mut restored = consolidator(8);
        restored.restore(record.clone()).unwrap();
        assert_eq!(c, restored);

        assert!(consolidator(9).restore(record).is_err());
    }
}
