//! Cross-agent gossip board.
//!
//! A [`SharedMemory`] is an ordinary associative memory that agents may only
//! read while ticking. The owning system publishes important experiences into
//! it between agent updates, so agents updated in the same frame never observe
//! each other's partial writes.
//!
//! The board belongs to no agent: resetting or saving an agent leaves it
//! untouched. Callers that need exact replay clear it or save it alongside.

use crate::config::MemoryConfig;
use crate::error::NeuralResult;
use crate::kernels::Kernels;

use super::{AssociativeMemory, MemoryAnalysis, MemoryRecord, ReadOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct SharedMemory {
    memory: AssociativeMemory,
    threshold: f32,
    published: u64,
    rejected: u64,
}

impl SharedMemory {
    /// `threshold` is the importance an experience needs to be published.
    pub fn new(config: &MemoryConfig, threshold: f32) -> NeuralResult<Self> {
        Ok(Self {
            memory: AssociativeMemory::new(config)?,
            threshold,
            published: 0,
            rejected: 0,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn width(&self) -> usize {
        self.memory.width()
    }

    /// Offer an experience; returns whether it was stored.
    pub fn publish(&mut self, record: &[f32], importance: f32) -> NeuralResult<bool> {
        if importance < self.threshold {
            self.rejected += 1;
            return Ok(false);
        }
        let stored = self.memory.write(record, importance)?.is_some();
        if stored {
            self.published += 1;
            tracing::debug!(importance, published = self.published, "Published to shared memory");
        }
        Ok(stored)
    }

    /// Read without mutating, exactly like an agent's own memory.
    pub fn recall(
        &self,
        kernels: &dyn Kernels,
        query: &[f32],
        out: &mut [f32],
    ) -> NeuralResult<ReadOutcome> {
        self.memory.read(kernels, query, out)
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn analyze(&self) -> MemoryAnalysis {
        self.memory.analyze()
    }

    pub fn clear(&mut self) {
        self.memory.clear();
        self.published = 0;
        self.rejected = 0;
    }

    pub fn to_record(&self) -> MemoryRecord {
        self.memory.to_record()
    }

    /// Replace the board's contents. Publish counters restart from the
    /// record's write count.
    pub fn restore(&mut self, record: &MemoryRecord) -> NeuralResult<()> {
        self.memory.restore(record)?;
        self.published = record.writes;
        self.rejected = 0;
        Ok(())
    }
}
