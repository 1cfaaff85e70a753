//! Sparse Fisher information tables and their estimation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{NeuralError, NeuralResult};

/// Per-parameter importance, keyed by flat parameter index.
///
/// Iteration is always in ascending index order, so two tables with the same
/// entries compare and serialize identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseFisher {
    parameter_count: usize,
    entries: BTreeMap<u32, f32>,
}

impl SparseFisher {
    /// Empty table over `parameter_count` parameters.
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            entries: BTreeMap::new(),
        }
    }

    /// Build from `(index, value)` pairs, rejecting out-of-range indices.
    pub fn from_entries(
        parameter_count: usize,
        entries: impl IntoIterator<Item = (u32, f32)>,
    ) -> NeuralResult<Self> {
        let mut table = Self::new(parameter_count);
        for (index, value) in entries {
            table.insert(index, value)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, index: u32, value: f32) -> NeuralResult<()> {
        if index as usize >= self.parameter_count {
            return Err(NeuralError::FisherIndexOutOfRange {
                index,
                parameter_count: self.parameter_count,
            });
        }
        self.entries.insert(index, value);
        Ok(())
    }

    pub fn get(&self, index: u32) -> Option<f32> {
        self.entries.get(&index).copied()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fraction of parameters without an entry.
    pub fn sparsity(&self) -> f32 {
        if self.parameter_count == 0 {
            return 1.0;
        }
        1.0 - self.entries.len() as f32 / self.parameter_count as f32
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.entries.iter().map(|(&i, &v)| (i, v))
    }

    /// Check every entry against a model of `parameter_count` parameters.
    ///
    /// Tables decoded from disk bypass [`insert`](Self::insert), so this is
    /// also how loaded data is vetted.
    pub fn validate(&self, parameter_count: usize) -> NeuralResult<()> {
        if self.parameter_count != parameter_count {
            return Err(NeuralError::ParameterCountMismatch {
                expected: parameter_count,
                found: self.parameter_count,
            });
        }
        if let Some((&index, _)) = self.entries.last_key_value() {
            if index as usize >= parameter_count {
                return Err(NeuralError::FisherIndexOutOfRange {
                    index,
                    parameter_count,
                });
            }
        }
        if self.entries.values().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(NeuralError::NonFinite {
                site: "fisher table",
            });
        }
        Ok(())
    }
}

/// Running sums of squared gradients over sampled inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FisherAccumulator {
    sums: Vec<f32>,
    samples: u32,
}

/// Sparse snapshot of an accumulator's pending sums.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccumulatorRecord {
    pub samples: u32,
    pub sums: BTreeMap<u32, f32>,
}

impl FisherAccumulator {
    pub fn new(parameter_count: usize) -> Self {
        Self {
            sums: vec![0.0; parameter_count],
            samples: 0,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.sums.len()
    }

    /// Samples completed since the last reset.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Add one gradient component of the current sample.
    pub fn add(&mut self, index: usize, gradient: f32) {
        debug_assert!(index < self.sums.len(), "gradient index {index} out of range");
        if let Some(sum) = self.sums.get_mut(index) {
            if gradient.is_finite() {
                *sum += gradient * gradient;
            }
        }
    }

    /// Close the current sample.
    pub fn end_sample(&mut self) {
        self.samples += 1;
    }

    pub fn reset(&mut self) {
        self.sums.fill(0.0);
        self.samples = 0;
    }

    /// Average the sums into a sparse table.
    ///
    /// Entries at or below `min_fisher` are dropped, then only the largest
    /// `max_density` fraction of parameters is kept (ties favor the lower
    /// index). The accumulator itself is left untouched.
    pub fn finish(&self, min_fisher: f32, max_density: f32) -> SparseFisher {
        let parameter_count = self.sums.len();
        let mut table = SparseFisher::new(parameter_count);
        if self.samples == 0 {
            return table;
        }
        let scale = 1.0 / self.samples as f32;
        let mut kept: Vec<(u32, f32)> = self
            .sums
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32, s * scale))
            .filter(|(_, f)| *f > min_fisher)
            .collect();

        let cap = ((max_density.clamp(0.0, 1.0) * parameter_count as f32) as usize).max(1);
        if kept.len() > cap {
            kept.select_nth_unstable_by(cap - 1, |a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            kept.truncate(cap);
        }
        table.entries.extend(kept);
        table
    }

    pub fn to_record(&self) -> AccumulatorRecord {
        AccumulatorRecord {
            samples: self.samples,
            sums: self
                .sums
                .iter()
                .enumerate()
                .filter(|(_, s)| **s != 0.0)
                .map(|(i, s)| (i as u32, *s))
                .collect(),
        }
    }

    pub fn restore(&mut self, record: &AccumulatorRecord) -> NeuralResult<()> {
        let parameter_count = self.sums.len();
        if let Some((&index, _)) = record.sums.last_key_value() {
            if index as usize >= parameter_count {
                return Err(NeuralError::FisherIndexOutOfRange {
                    index,
                    parameter_count,
                });
            }
        }
        self.sums.fill(0.0);
        for (&i, &s) in &record.sums {
            self.sums[i as usize] = s;
        }
        self.samples = record.samples;
        Ok(())
    }
}

/// Estimate a Fisher table from per-sample gradients.
///
/// `gradient` is called once per sample and reports `(index, gradient)` pairs
/// through the visitor it is handed.
pub fn estimate_fisher<S>(
    parameter_count: usize,
    samples: impl IntoIterator<Item = S>,
    min_fisher: f32,
    max_density: f32,
    mut gradient: impl FnMut(S, &mut dyn FnMut(usize, f32)) -> NeuralResult<()>,
) -> NeuralResult<SparseFisher> {
    let mut accumulator = FisherAccumulator::new(parameter_count);
    for sample in samples {
        gradient(sample, &mut |i: usize, g: f32| accumulator.add(i, g))?;
        accumulator.end_sample();
    }
    Ok(accumulator.finish(min_fisher, max_density))
}
