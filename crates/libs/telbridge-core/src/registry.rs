use std::collections::HashMap;
use thiserror::Error;

/// Identifier allocation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The fixed slot range is fully allocated. Surfaced to the
    /// downstream caller as a typed resource error, never swallowed.
    #[error("no free slot in range 1..={limit}")]
    Exhausted { limit: u32 },
}

/// Fixed-range handle pool, e.g. call indexes 1..=7.
///
/// The downstream protocol hard-limits simultaneous calls, so handles
/// come from a small contiguous range and released slots are reused.
/// Callers must never cache a handle across a known removal.
#[derive(Debug)]
pub struct SlotPool {
    limit: u32,
    forward: HashMap<String, u32>,
    reverse: HashMap<u32, String>,
}

impl SlotPool {
    pub fn new(limit: u32) -> Self {
        Self { limit, forward: HashMap::new(), reverse: HashMap::new() }
    }

    /// Allocate the lowest free slot for `key`. Idempotent: a key that
    /// already holds a slot gets the same slot back.
    pub fn allocate(&mut self, key: &str) -> Result<u32, RegistryError> {
        if let Some(slot) = self.forward.get(key) {
            return Ok(*slot);
        }
        let slot = (1..=self.limit)
            .find(|candidate| !self.reverse.contains_key(candidate))
            .ok_or(RegistryError::Exhausted { limit: self.limit })?;
        self.forward.insert(key.to_string(), slot);
        self.reverse.insert(slot, key.to_string());
        Ok(slot)
    }

    /// Return the slot held by `key` to the pool.
    pub fn release(&mut self, key: &str) {
        match self.forward.remove(key) {
            Some(slot) => {
                self.reverse.remove(&slot);
            }
            None => log::debug!("release for untracked key {key}"),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<u32> {
        self.forward.get(key).copied()
    }

    pub fn reverse(&self, slot: u32) -> Option<&str> {
        self.reverse.get(&slot).map(String::as_str)
    }

    pub fn in_use(&self) -> usize {
        self.forward.len()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

/// Monotonic handle map, e.g. data connection ids.
///
/// Released numeric values are never reused within the process
/// lifetime, so a quickly recycled id can never refer to a different
/// connection downstream.
#[derive(Debug)]
pub struct SequenceMap {
    next: u32,
    forward: HashMap<String, u32>,
    reverse: HashMap<u32, String>,
}

impl SequenceMap {
    pub fn new() -> Self {
        Self { next: 1, forward: HashMap::new(), reverse: HashMap::new() }
    }

    /// Allocate (or return the existing) id for `key`.
    pub fn allocate(&mut self, key: &str) -> u32 {
        if let Some(id) = self.forward.get(key) {
            return *id;
        }
        let id = self.next;
        self.next += 1;
        self.forward.insert(key.to_string(), id);
        self.reverse.insert(id, key.to_string());
        id
    }

    pub fn release(&mut self, key: &str) {
        match self.forward.remove(key) {
            Some(id) => {
                self.reverse.remove(&id);
            }
            None => log::debug!("release for untracked key {key}"),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<u32> {
        self.forward.get(key).copied()
    }

    pub fn reverse(&self, id: u32) -> Option<&str> {
        self.reverse.get(&id).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

impl Default for SequenceMap {
    fn default() -> Self {
        Self::new()
    }
}
