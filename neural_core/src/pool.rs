//! Capacity-bounded slot pool with generational handles.
//!
//! Slots never move, so a handle stays valid until its slot is released.
//! Releasing bumps the slot's generation; any older handle is then rejected
//! instead of silently reaching the new occupant.

use serde::{Deserialize, Serialize};

use crate::error::{NeuralError, NeuralResult};

/// Stable reference to a pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotHandle {
    index: u32,
    generation: u32,
}

impl SlotHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity pool.
#[derive(Debug)]
pub struct SlotPool<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> SlotPool<T> {
    /// Reserve `capacity` slots up front.
    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 0,
                value: None,
            })
            .collect();
        // Pop from the back so slot 0 is handed out first.
        let free = (0..capacity as u32).rev().collect();
        Self { name, slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    /// Place a value in a free slot, or fail when the pool is full.
    pub fn insert(&mut self, value: T) -> NeuralResult<SlotHandle> {
        let index = self
            .free
            .pop()
            .ok_or_else(|| NeuralError::exhausted(self.name, self.slots.len()))?;
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        Ok(SlotHandle {
            index,
            generation: slot.generation,
        })
    }

    fn slot(&self, handle: SlotHandle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: SlotHandle) -> NeuralResult<&T> {
        self.slot(handle)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(NeuralError::StaleHandle {
                index: handle.index(),
            })
    }

    pub fn get_mut(&mut self, handle: SlotHandle) -> NeuralResult<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(NeuralError::StaleHandle {
                index: handle.index(),
            })
    }

    /// Free a slot and hand back its value.
    pub fn remove(&mut self, handle: SlotHandle) -> NeuralResult<T> {
        let slot = self
            .slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
            .ok_or(NeuralError::StaleHandle {
                index: handle.index(),
            })?;
        slot.generation = slot.generation.wrapping_add(1);
        let value = slot.value.take().ok_or(NeuralError::StaleHandle {
            index: handle.index(),
        })?;
        self.free.push(handle.index);
        Ok(value)
    }

    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Iterate over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    SlotHandle {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_until_full() {
        let mut pool = SlotPool::with_capacity("test pool", 2);
        let a = pool.insert("a").unwrap();
        let b = pool.insert("b").unwrap();
        assert!(pool.is_full());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);

        let err = pool.insert("c").unwrap_err();
        assert!(matches!(err, NeuralError::PoolExhausted { capacity: 2, .. }));
        assert_eq!(*pool.get(a).unwrap(), "a");
        assert_eq!(*pool.get(b).unwrap(), "b");
    }

    #[test]
    fn test_stale_handle_rejected_after_reuse() {
        let mut pool = SlotPool::with_capacity("test pool", 1);
        let old = pool.insert(1).unwrap();
        assert_eq!(pool.remove(old).unwrap(), 1);
        let new = pool.insert(2).unwrap();
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(matches!(pool.get(old), Err(NeuralError::StaleHandle { .. })));
        assert!(pool.remove(old).is_err());
        assert_eq!(*pool.get(new).unwrap(), 2);
    }

    #[test]
    fn test_get_mut_and_iter() {
        let mut pool = SlotPool::with_capacity("test pool", 3);
        let a = pool.insert(10).unwrap();
        let b = pool.insert(20).unwrap();
        *pool.get_mut(b).unwrap() += 5;
        pool.remove(a).unwrap();
        let items: Vec<i32> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(items, vec![25]);
        assert_eq!(pool.len(), 1);
    }
}
