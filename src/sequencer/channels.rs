// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI channel allocation.
//!
//! Each melodic track is lazily assigned one channel from a shared pool on
//! its first note-producing event; the assignment is stable for the
//! track's lifetime. Channel 9 is reserved for percussion routing and is
//! never part of the pool.

use std::collections::{BTreeMap, BTreeSet};

/// The channel the General MIDI standard reserves for percussion
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Lazy, idempotent channel assignment for tracks.
///
/// Never fails: an exhausted pool is a normal `None` result, and callers
/// drop the affected event with a warning.
#[derive(Debug)]
pub struct ChannelAllocator {
    available: BTreeSet<u8>,
    assigned: BTreeMap<u32, u8>,
}

impl ChannelAllocator {
    /// Create an allocator drawing from the given pool. Channel 9 and
    /// out-of-range values are excluded regardless of the input.
    pub fn new(pool: impl IntoIterator<Item = u8>) -> Self {
        Self {
            available: pool
                .into_iter()
                .filter(|&ch| ch <= 15 && ch != PERCUSSION_CHANNEL)
                .collect(),
            assigned: BTreeMap::new(),
        }
    }

    /// Return the track's channel, drawing the smallest available one on
    /// first demand. `None` once the pool is exhausted.
    pub fn acquire(&mut self, track: u32) -> Option<u8> {
        if let Some(&channel) = self.assigned.get(&track) {
            return Some(channel);
        }
        let channel = self.available.pop_first()?;
        self.assigned.insert(track, channel);
        Some(channel)
    }

    /// Route the track through the percussion channel. Does not touch the
    /// pool; a previously drawn melodic channel stays out of circulation.
    pub fn force_percussion(&mut self, track: u32) {
        self.assigned.insert(track, PERCUSSION_CHANNEL);
    }

    /// Channel currently assigned to the track, if any
    pub fn channel(&self, track: u32) -> Option<u8> {
        self.assigned.get(&track).copied()
    }

    /// Number of channels still available
    pub fn remaining(&self) -> usize {
        self.available.len()
    }
}

impl Default for ChannelAllocator {
    fn default() -> Self {
        Self::new(0..16)
    }
}
