use std::collections::BTreeMap;

use thiserror::Error;

use super::value::{BufferHandle, Value};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("already allocated: buffer '{name}' is live")]
    AlreadyAllocated { name: String },
    #[error("unknown buffer '{name}'")]
    UnknownBuffer { name: String },
    #[error("index out of bounds: index {index} in buffer '{name}' of capacity {capacity}")]
    OutOfBounds {
        name: String,
        index: i64,
        capacity: usize,
    },
    #[error("use after free: buffer '{name}'")]
    UseAfterFree { name: String },
    #[error("invalid size {size} for buffer '{name}': size must be a positive integer")]
    InvalidSize { name: String, size: i64 },
}

#[derive(Debug, Clone)]
struct Buffer {
    slots: Vec<Option<Value>>,
    live: bool,
    generation: u64,
}

/// Read-only view of one buffer for debugger listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferView {
    pub name: String,
    pub capacity: usize,
    pub live: bool,
    /// Rendered slot contents; `None` marks a slot never written.
    pub slots: Vec<Option<String>>,
}

/// Named fixed-capacity buffers with explicit lifetimes.
///
/// Every access is bounds- and liveness-checked. A freed buffer keeps its
/// entry so later accesses report use-after-free instead of an unknown name;
/// allocating the same name again replaces it with a fresh, empty buffer.
#[derive(Debug, Default)]
pub struct MemoryTable {
    buffers: BTreeMap<String, Buffer>,
    generations: u64,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str, size: i64) -> Result<BufferHandle, MemoryError> {
        if size <= 0 {
            return Err(MemoryError::InvalidSize {
                name: name.to_string(),
                size,
            });
        }
        if self.buffers.get(name).is_some_and(|buffer| buffer.live) {
            return Err(MemoryError::AlreadyAllocated {
                name: name.to_string(),
            });
        }
        let capacity = size as usize;
        self.generations += 1;
        let generation = self.generations;
        self.buffers.insert(
            name.to_string(),
            Buffer {
                slots: vec![None; capacity],
                live: true,
                generation,
            },
        );
        Ok(BufferHandle {
            name: name.to_string(),
            capacity,
            generation,
        })
    }

    pub fn write(&mut self, name: &str, index: i64, value: Value) -> Result<(), MemoryError> {
        let buffer = self.live_mut(name)?;
        let slot = slot_index(name, index, buffer.slots.len())?;
        buffer.slots[slot] = Some(value);
        Ok(())
    }

    /// Reads a slot; a slot never written reads as `null`.
    pub fn read(&self, name: &str, index: i64) -> Result<Value, MemoryError> {
        let buffer = self.live(name)?;
        let slot = slot_index(name, index, buffer.slots.len())?;
        Ok(buffer.slots[slot].clone().unwrap_or(Value::Null))
    }

    pub fn is_written(&self, name: &str, index: i64) -> Result<bool, MemoryError> {
        let buffer = self.live(name)?;
        let slot = slot_index(name, index, buffer.slots.len())?;
        Ok(buffer.slots[slot].is_some())
    }

    pub fn free(&mut self, name: &str) -> Result<(), MemoryError> {
        let buffer = self.live_mut(name)?;
        buffer.live = false;
        buffer.slots.clear();
        Ok(())
    }

    /// Capacity of the allocation `handle` names. Stale handles fail with
    /// use-after-free even when the name has been allocated again.
    pub fn capacity(&self, handle: &BufferHandle) -> Result<usize, MemoryError> {
        let buffer = self.live(&handle.name)?;
        if buffer.generation != handle.generation {
            return Err(MemoryError::UseAfterFree {
                name: handle.name.clone(),
            });
        }
        Ok(buffer.slots.len())
    }

    pub fn views(&self) -> Vec<BufferView> {
        self.buffers
            .iter()
            .map(|(name, buffer)| BufferView {
                name: name.clone(),
                capacity: buffer.slots.len(),
                live: buffer.live,
                slots: buffer
                    .slots
                    .iter()
                    .map(|slot| slot.as_ref().map(Value::to_string))
                    .collect(),
            })
            .collect()
    }

    fn live(&self, name: &str) -> Result<&Buffer, MemoryError> {
        match self.buffers.get(name) {
            Some(buffer) if buffer.live => Ok(buffer),
            Some(_) => Err(MemoryError::UseAfterFree {
                name: name.to_string(),
            }),
            None => Err(MemoryError::UnknownBuffer {
                name: name.to_string(),
            }),
        }
    }

    fn live_mut(&mut self, name: &str) -> Result<&mut Buffer, MemoryError> {
        match self.buffers.get_mut(name) {
            Some(buffer) if buffer.live => Ok(buffer),
            Some(_) => Err(MemoryError::UseAfterFree {
                name: name.to_string(),
            }),
            None => Err(MemoryError::UnknownBuffer {
                name: name.to_string(),
            }),
        }
    }
}

fn slot_index(name: &str, index: i64, capacity: usize) -> Result<usize, MemoryError> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < capacity)
        .ok_or_else(|| MemoryError::OutOfBounds {
            name: name.to_string(),
            index,
            capacity,
        })
}
