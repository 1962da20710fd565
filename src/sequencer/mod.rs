// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Scheduling core.
//!
//! This module provides the playback machinery:
//! - Event model and per-variant partitioning
//! - Lazy MIDI channel allocation with percussion routing
//! - The pattern registry shared between ingest and scheduling
//! - Per-track workers that serialize bursts onto the engine timeline
//! - Just-in-time pattern expansion against engine barriers

pub mod channels;
pub mod events;
pub mod patterns;

mod expander;
mod track;

pub use channels::{ChannelAllocator, PERCUSSION_CHANNEL};
pub use events::{Event, EventBuckets, LoopEvent, NoteEvent, PatchEvent, PatternEvent, PercussionEvent};
pub use patterns::PatternRegistry;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::midi::MidiEngine;
use track::TrackHandle;

/// State shared between the sequencer facade and its track workers.
///
/// One explicit value instead of process-wide singletons; workers borrow
/// it through an `Arc`. The track map itself stays outside so that
/// dropping the [`Sequencer`] closes every burst FIFO and the workers
/// exit.
pub(crate) struct Core {
    pub(crate) config: SchedulerConfig,
    pub(crate) engine: Arc<dyn MidiEngine>,
    pub(crate) channels: Mutex<ChannelAllocator>,
    pub(crate) patterns: PatternRegistry,
}

/// The playback core: tracks, channels, and patterns over one engine.
pub struct Sequencer {
    core: Arc<Core>,
    tracks: Mutex<HashMap<u32, TrackHandle>>,
}

impl Sequencer {
    /// Create a sequencer over the given engine
    pub fn new(engine: Arc<dyn MidiEngine>, config: SchedulerConfig) -> Self {
        let allocator = ChannelAllocator::new(config.channels.iter().copied());
        Self {
            core: Arc::new(Core {
                config,
                engine,
                channels: Mutex::new(allocator),
                patterns: PatternRegistry::new(),
            }),
            tracks: Mutex::new(HashMap::new()),
        }
    }

    /// The engine this sequencer schedules on
    pub fn engine(&self) -> &Arc<dyn MidiEngine> {
        &self.core.engine
    }

    /// The shared pattern registry
    pub fn patterns(&self) -> &PatternRegistry {
        &self.core.patterns
    }

    /// Enqueue one burst on a track, spawning its worker on first
    /// reference. Blocks while the track's FIFO is full.
    pub fn enqueue(&self, track: u32, events: Vec<Event>) {
        // The map lock covers only get-or-create; a full FIFO must
        // backpressure this caller without stalling other tracks.
        let sender = {
            let mut tracks = self.tracks.lock();
            tracks
                .entry(track)
                .or_insert_with(|| TrackHandle::spawn(track, Arc::clone(&self.core)))
                .sender()
        };
        let sent = sender.map_or(false, |tx| tx.send(events).is_ok());
        if !sent {
            log::warn!("track {}: worker is gone, dropping burst", track);
        }
    }

    /// Channel assigned to the track, if it has produced sound yet
    pub fn track_channel(&self, track: u32) -> Option<u8> {
        self.core.channels.lock().channel(track)
    }

    /// The track's start-offset cursor. `None` for a track that was never
    /// referenced; blocks while that track is mid-burst, but without
    /// holding the track map, so other tracks are unaffected.
    pub fn track_cursor_ms(&self, track: u32) -> Option<i64> {
        let cursor = self.tracks.lock().get(&track).map(TrackHandle::cursor)?;
        let guard = cursor.lock();
        Some(*guard)
    }

    /// Number of tracks referenced so far
    pub fn track_count(&self) -> usize {
        self.tracks.lock().len()
    }
}
