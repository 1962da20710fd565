// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pattern registry.
//!
//! A named store of mutable event lists, shared between the ingest thread
//! (which appends and clears) and the scheduling workers (which read).
//! Every read is a snapshot taken under the registry lock, so an expansion
//! in progress is never affected by concurrent edits.

use parking_lot::Mutex;
use std::collections::HashMap;

use super::events::Event;

/// Named, mutable event sequences with get-or-create semantics.
#[derive(Default)]
pub struct PatternRegistry {
    patterns: Mutex<HashMap<String, Vec<Event>>>,
}

impl PatternRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the pattern's current events, creating an empty pattern if
    /// the name is unknown.
    pub fn snapshot(&self, name: &str) -> Vec<Event> {
        let mut patterns = self.patterns.lock();
        patterns.entry(name.to_string()).or_default().clone()
    }

    /// Append events to the pattern in order, creating it if absent
    pub fn append(&self, name: &str, events: impl IntoIterator<Item = Event>) {
        let mut patterns = self.patterns.lock();
        patterns.entry(name.to_string()).or_default().extend(events);
    }

    /// Empty the pattern's event list, creating it if absent
    pub fn clear(&self, name: &str) {
        let mut patterns = self.patterns.lock();
        patterns.entry(name.to_string()).or_default().clear();
    }

    /// Number of events currently in the pattern
    pub fn len(&self, name: &str) -> usize {
        self.patterns.lock().get(name).map_or(0, Vec::len)
    }

    /// Whether the pattern is absent or empty
    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }
}
