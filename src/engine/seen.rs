//! Set of addresses already processed.
//!
//! Monotonic for the lifetime of the process: entries are never evicted,
//! so a marked address is never evaluated again. Memory grows with the
//! number of distinct addresses seen, which stays small for a top-N
//! listing over a bounded run.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SeenStore {
    entries: HashMap<String, DateTime<Utc>>,
}

impl SeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    /// Mark an address as processed. Idempotent: the first mark time wins.
    pub fn mark(&mut self, address: &str) {
        self.mark_at(address, Utc::now());
    }

    pub fn mark_at(&mut self, address: &str, at: DateTime<Utc>) {
        self.entries.entry(address.to_string()).or_insert(at);
    }

    pub fn marked_at(&self, address: &str) -> Option<DateTime<Utc>> {
        self.entries.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
