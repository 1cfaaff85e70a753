//! Temporal links between slots, in write order.
//!
//! Each write is a single hard slot write, so the link matrix collapses to a
//! doubly linked list: every slot knows the slot written just before it and
//! the one written just after it. Overwriting a slot cuts both of its old
//! links and appends it after the previous write.

use serde::{Deserialize, Serialize};

use crate::error::{expect_len, NeuralError, NeuralResult};

/// Which way to follow the write order from an anchor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalDirection {
    /// The slot written right after the anchor.
    Forward,
    /// The slot written right before the anchor.
    Backward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalLinks {
    next: Vec<Option<usize>>,
    prev: Vec<Option<usize>>,
    last: Option<usize>,
}

impl TemporalLinks {
    pub fn new(slots: usize) -> Self {
        Self {
            next: vec![None; slots],
            prev: vec![None; slots],
            last: None,
        }
    }

    pub fn last_written(&self) -> Option<usize> {
        self.last
    }

    pub fn follow(&self, slot: usize, direction: TemporalDirection) -> Option<usize> {
        let links = match direction {
            TemporalDirection::Forward => &self.next,
            TemporalDirection::Backward => &self.prev,
        };
        links.get(slot).copied().flatten()
    }

    /// Slots from the latest write back to the oldest still linked.
    pub fn recent(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.last, |&slot| self.prev[slot]).take(self.prev.len())
    }

    /// Book a write to `slot`.
    pub fn record_write(&mut self, slot: usize) {
        if let Some(before) = self.prev[slot].take() {
            self.next[before] = None;
        }
        if let Some(after) = self.next[slot].take() {
            self.prev[after] = None;
        }
        if let Some(last) = self.last.filter(|&last| last != slot) {
            self.next[last] = Some(slot);
            self.prev[slot] = Some(last);
        }
        self.last = Some(slot);
    }

    pub fn clear(&mut self) {
        self.next.fill(None);
        self.prev.fill(None);
        self.last = None;
    }

    /// Reject links that do not fit a memory of `slots` slots.
    pub fn validate(&self, slots: usize) -> NeuralResult<()> {
        expect_len("temporal links", slots, self.next.len())?;
        expect_len("temporal links", slots, self.prev.len())?;
        let in_range = |slot: &Option<usize>| slot.map_or(true, |s| s < slots);
        if self.next.iter().chain(&self.prev).chain([&self.last]).all(in_range) {
            Ok(())
        } else {
            Err(NeuralError::config(format!(
                "temporal link points past {slots} memory slots"
            )))
        }
    }
}
