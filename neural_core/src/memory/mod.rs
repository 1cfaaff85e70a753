//! Associative memory: a fixed-capacity, content-addressable slot store.
//!
//! Writes pick a slot by usage: a free slot if there is one, otherwise the
//! least-used slot, and once every slot is saturated the least important
//! one. Reads score every occupied slot against a query and return the best
//! match, or a softmax blend of the top matches with several read heads.
//! Reads never mutate; a read against an empty memory yields zeros.
//!
//! Writes are also linked in the order they happened, so a content match
//! can serve as an anchor for stepping through memories forward or
//! backward in time.

mod addressing;
mod linkage;
mod shared;

pub use addressing::*;
pub use linkage::*;
pub use shared::*;

use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::error::{expect_len, NeuralError, NeuralResult};
use crate::kernels::{Kernels, Tensor, TensorArena};

/// Result of a read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReadOutcome {
    pub best_slot: Option<usize>,
    /// Similarity of the best match; zero when nothing matched.
    pub best_score: f32,
    /// Number of slots blended into the result.
    pub heads_used: usize,
}

/// Result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub slot: usize,
    /// An occupied slot was overwritten.
    pub evicted: bool,
}

/// Summary statistics for debugging and tuning.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryAnalysis {
    pub capacity: usize,
    pub occupied: usize,
    pub average_usage: f32,
    pub max_usage: f32,
    pub average_importance: f32,
    pub writes: u64,
}

/// Serializable memory contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub slots: usize,
    pub width: usize,
    /// Slot contents, row-major.
    pub contents: Vec<f32>,
    pub usage: Vec<f32>,
    pub importance: Vec<f32>,
    pub occupied: Vec<bool>,
    pub links: TemporalLinks,
    pub writes: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociativeMemory {
    contents: Tensor,
    usage: Tensor,
    importance: Tensor,
    occupied: Vec<bool>,
    links: TemporalLinks,
    read_heads: usize,
    usage_decay: f32,
    saturation: f32,
    metric: SimilarityMetric,
    sharpness: f32,
    writes: u64,
}

impl AssociativeMemory {
    /// Memory backed by an agent's arena.
    pub fn new_in(arena: &mut TensorArena, config: &MemoryConfig) -> NeuralResult<Self> {
        let contents = arena.alloc_matrix(config.slots, config.width)?;
        let usage = arena.alloc_vector(config.slots)?;
        let importance = arena.alloc_vector(config.slots)?;
        Self::from_parts(contents, usage, importance, config)
    }

    /// Memory with its own storage, outside any agent arena.
    pub fn new(config: &MemoryConfig) -> NeuralResult<Self> {
        Self::from_parts(
            Tensor::zeros(config.slots, config.width),
            Tensor::vector(config.slots),
            Tensor::vector(config.slots),
            config,
        )
    }

    fn from_parts(
        contents: Tensor,
        usage: Tensor,
        importance: Tensor,
        config: &MemoryConfig,
    ) -> NeuralResult<Self> {
        if config.read_heads > MAX_READ_HEADS {
            return Err(NeuralError::config(format!(
                "{} read heads requested, at most {MAX_READ_HEADS} supported",
                config.read_heads
            )));
        }
        Ok(Self {
            occupied: vec![false; config.slots],
            links: TemporalLinks::new(config.slots),
            contents,
            usage,
            importance,
            read_heads: config.read_heads,
            usage_decay: config.usage_decay,
            saturation: config.saturation,
            metric: config.metric,
            sharpness: config.sharpness,
            writes: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.contents.rows()
    }

    pub fn width(&self) -> usize {
        self.contents.cols()
    }

    pub fn read_heads(&self) -> usize {
        self.read_heads
    }

    pub fn occupied(&self) -> usize {
        self.occupied.iter().filter(|o| **o).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.occupied.iter().any(|o| *o)
    }

    pub fn slot(&self, index: usize) -> &[f32] {
        self.contents.row(index)
    }

    pub fn usage(&self) -> &[f32] {
        self.usage.values()
    }

    pub fn importance(&self) -> &[f32] {
        self.importance.values()
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    pub fn links(&self) -> &TemporalLinks {
        &self.links
    }

    fn select_target(&self) -> Option<usize> {
        if let Some(free) = self.occupied.iter().position(|o| !*o) {
            return Some(free);
        }
        let usage = self.usage.values();
        let importance = self.importance.values();
        let least_used = (0..usage.len()).min_by(|&a, &b| usage[a].total_cmp(&usage[b]))?;
        if usage[least_used] < self.saturation {
            return Some(least_used);
        }
        (0..importance.len()).min_by(|&a, &b| {
            importance[a]
                .total_cmp(&importance[b])
                .then(usage[a].total_cmp(&usage[b]))
        })
    }

    /// Store `value` scaled by `strength` (clamped to [0, 1]).
    ///
    /// Returns `None` for a zero-capacity memory. Only the chosen slot's
    /// content changes; every other slot's usage decays geometrically.
    pub fn write(&mut self, value: &[f32], strength: f32) -> NeuralResult<Option<WriteOutcome>> {
        expect_len("memory write", self.width(), value.len())?;
        let Some(slot) = self.select_target() else {
            return Ok(None);
        };
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let evicted = self.occupied[slot];
        for (dst, src) in self.contents.row_mut(slot).iter_mut().zip(value) {
            *dst = src * strength;
        }
        self.occupied[slot] = true;
        self.links.record_write(slot);
        self.importance.values_mut()[slot] = strength;
        for (i, u) in self.usage.values_mut().iter_mut().enumerate() {
            *u = if i == slot { 1.0 } else { *u * self.usage_decay };
        }
        self.writes += 1;
        Ok(Some(WriteOutcome { slot, evicted }))
    }

    /// Read the best match (or a blend of the top matches) into `out`.
    pub fn read(
        &self,
        kernels: &dyn Kernels,
        query: &[f32],
        out: &mut [f32],
    ) -> NeuralResult<ReadOutcome> {
        expect_len("memory query", self.width(), query.len())?;
        expect_len("memory read", self.width(), out.len())?;
        out.fill(0.0);

        let mut top = TopK::new(self.read_heads);
        for (slot, occupied) in self.occupied.iter().enumerate() {
            if *occupied {
                top.offer(slot, self.metric.score(kernels, query, self.contents.row(slot)));
            }
        }
        let Some((best_slot, best_score)) = top.best() else {
            return Ok(ReadOutcome::default());
        };

        let matches = top.as_slice();
        if matches.len() == 1 {
            out.copy_from_slice(self.contents.row(best_slot));
        } else {
            let mut weights = [0.0; MAX_READ_HEADS];
            blend_weights(matches, self.sharpness, &mut weights);
            for ((slot, _), w) in matches.iter().zip(weights) {
                kernels.axpy(w, self.contents.row(*slot), out);
            }
        }
        Ok(ReadOutcome {
            best_slot: Some(best_slot),
            best_score,
            heads_used: matches.len(),
        })
    }

    /// Read the memory written just after (or before) the best content
    /// match of `query`.
    ///
    /// `best_slot` is the linked slot and `best_score` the anchor's
    /// similarity. With no anchor, no read heads or no linked slot the
    /// result is zero, like any empty read.
    pub fn read_linked(
        &self,
        kernels: &dyn Kernels,
        query: &[f32],
        direction: TemporalDirection,
        out: &mut [f32],
    ) -> NeuralResult<ReadOutcome> {
        expect_len("memory query", self.width(), query.len())?;
        expect_len("memory read", self.width(), out.len())?;
        out.fill(0.0);
        if self.read_heads == 0 {
            return Ok(ReadOutcome::default());
        }

        let mut top = TopK::new(1);
        for (slot, occupied) in self.occupied.iter().enumerate() {
            if *occupied {
                top.offer(slot, self.metric.score(kernels, query, self.contents.row(slot)));
            }
        }
        let Some((anchor, score)) = top.best() else {
            return Ok(ReadOutcome::default());
        };
        let Some(linked) = self.links.follow(anchor, direction) else {
            return Ok(ReadOutcome::default());
        };
        out.copy_from_slice(self.contents.row(linked));
        Ok(ReadOutcome {
            best_slot: Some(linked),
            best_score: score,
            heads_used: 1,
        })
    }

    /// Softmax content weighting over all slots. Free slots get zero; with
    /// nothing stored every weight is zero.
    pub fn addressing_weights(
        &self,
        kernels: &dyn Kernels,
        query: &[f32],
        weights: &mut [f32],
    ) -> NeuralResult<()> {
        expect_len("memory query", self.width(), query.len())?;
        expect_len("memory weighting", self.capacity(), weights.len())?;
        let mut max = f32::NEG_INFINITY;
        for (slot, w) in weights.iter_mut().enumerate() {
            *w = if self.occupied[slot] {
                let s = self.sharpness * self.metric.score(kernels, query, self.contents.row(slot));
                max = max.max(s);
                s
            } else {
                f32::NEG_INFINITY
            };
        }
        if max == f32::NEG_INFINITY {
            weights.fill(0.0);
            return Ok(());
        }
        let mut total = 0.0;
        for w in weights.iter_mut() {
            *w = if *w == f32::NEG_INFINITY { 0.0 } else { (*w - max).exp() };
            total += *w;
        }
        for w in weights.iter_mut() {
            *w /= total;
        }
        Ok(())
    }

    pub fn analyze(&self) -> MemoryAnalysis {
        let capacity = self.capacity();
        let occupied = self.occupied();
        let usage = self.usage.values();
        let (mut total_usage, mut max_usage) = (0.0f32, 0.0f32);
        for u in usage {
            total_usage += u;
            max_usage = max_usage.max(*u);
        }
        let total_importance: f32 = self
            .importance
            .values()
            .iter()
            .zip(&self.occupied)
            .filter(|(_, o)| **o)
            .map(|(i, _)| i)
            .sum();
        MemoryAnalysis {
            capacity,
            occupied,
            average_usage: if capacity > 0 { total_usage / capacity as f32 } else { 0.0 },
            max_usage,
            average_importance: if occupied > 0 { total_importance / occupied as f32 } else { 0.0 },
            writes: self.writes,
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.contents.zero();
        self.usage.zero();
        self.importance.zero();
        self.occupied.fill(false);
        self.links.clear();
        self.writes = 0;
    }

    pub fn to_record(&self) -> MemoryRecord {
        let mut contents = Vec::with_capacity(self.capacity() * self.width());
        for row in self.contents.iter_rows() {
            contents.extend_from_slice(row);
        }
        MemoryRecord {
            slots: self.capacity(),
            width: self.width(),
            contents,
            usage: self.usage.values().to_vec(),
            importance: self.importance.values().to_vec(),
            occupied: self.occupied.clone(),
            links: self.links.clone(),
            writes: self.writes,
        }
    }

    /// Restore contents saved from a memory of identical shape.
    pub fn restore(&mut self, record: &MemoryRecord) -> NeuralResult<()> {
        let (n, m) = (self.capacity(), self.width());
        expect_len("memory slots", n, record.slots)?;
        expect_len("memory width", m, record.width)?;
        expect_len("memory contents", n * m, record.contents.len())?;
        expect_len("memory usage", n, record.usage.len())?;
        expect_len("memory importance", n, record.importance.len())?;
        expect_len("memory occupancy", n, record.occupied.len())?;
        record.links.validate(n)?;
        if m > 0 {
            for (r, chunk) in record.contents.chunks_exact(m).enumerate() {
                self.contents.row_mut(r).copy_from_slice(chunk);
            }
        }
        self.usage.values_mut().copy_from_slice(&record.usage);
        self.importance.values_mut().copy_from_slice(&record.importance);
        self.occupied.copy_from_slice(&record.occupied);
        self.links = record.links.clone();
        self.writes = record.writes;
        Ok(())
    }
}
