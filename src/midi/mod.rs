// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI engine abstraction layer.
//!
//! This module provides a trait-based abstraction for the underlying MIDI
//! sequencer, allowing different backends (a hardware driver, the bundled
//! console engine, a test mock) to be used interchangeably. The scheduling
//! core only ever talks to [`MidiEngine`].

pub mod console;

pub use console::ConsoleEngine;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};

/// Outcome of waiting on a [`PatternBarrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// The playhead reached the marker (or the marker was already due).
    Released,
    /// The engine abandoned the barrier, e.g. because the sequencer was
    /// stopped or shut down. The waiter should stop scheduling.
    Abandoned,
}

/// One-shot latch released when the playhead reaches a pattern marker.
///
/// Returned by [`MidiEngine::pattern_marker`]. The waiting side blocks in
/// [`PatternBarrier::wait`]; the engine side holds the matching
/// [`BarrierHandle`] and either releases it at the marker time or drops it
/// to abandon the wait.
pub struct PatternBarrier {
    signal: Receiver<()>,
}

/// Engine-side handle for a [`PatternBarrier`].
///
/// Calling [`BarrierHandle::release`] wakes the waiter with
/// [`BarrierWait::Released`]; dropping the handle without releasing wakes
/// it with [`BarrierWait::Abandoned`].
pub struct BarrierHandle {
    signal: Sender<()>,
}

impl PatternBarrier {
    /// Create a barrier together with its releasing handle.
    pub fn pair() -> (BarrierHandle, PatternBarrier) {
        let (tx, rx) = bounded(1);
        (BarrierHandle { signal: tx }, PatternBarrier { signal: rx })
    }

    /// Create a barrier that is already released.
    ///
    /// Engines return this when the marker time has already passed or
    /// playback is stopped.
    pub fn open() -> Self {
        let (handle, barrier) = Self::pair();
        handle.release();
        barrier
    }

    /// Block until the barrier is released or abandoned.
    pub fn wait(&self) -> BarrierWait {
        match self.signal.recv() {
            Ok(()) => BarrierWait::Released,
            Err(_) => BarrierWait::Abandoned,
        }
    }
}

impl BarrierHandle {
    /// Release the barrier, waking the waiter.
    pub fn release(self) {
        // One slot, one send per handle: this never blocks. A send error
        // means the waiter is already gone.
        let _ = self.signal.send(());
    }
}

/// The sequencer capability consumed by the scheduling core.
///
/// Implementations must keep `current_offset_ms` wall-clock monotonic,
/// deliver each barrier exactly once at or immediately after its marker
/// time (immediately when playback is stopped or the time has passed), and
/// release or abandon every in-flight barrier from `stop_sequencer` so no
/// scheduling task waits forever.
pub trait MidiEngine: Send + Sync {
    /// Schedule an instrument program change.
    fn patch(&self, at_ms: i64, channel: u8, patch: u8) -> Result<()>;

    /// Schedule a note-on/note-off pair.
    fn note(&self, start_ms: i64, end_ms: i64, channel: u8, note: u8, velocity: u8) -> Result<()>;

    /// Schedule a percussion strike. The engine maps the track number to a
    /// drum note and routes it through the percussion channel.
    fn percussion(&self, at_ms: i64, track: u32) -> Result<()>;

    /// Insert a pattern marker and return a barrier that releases when the
    /// playhead reaches `at_ms`.
    fn pattern_marker(&self, at_ms: i64, pattern: &str) -> PatternBarrier;

    /// Current playhead position in milliseconds.
    fn current_offset_ms(&self) -> f64;

    /// Whether playback has been requested (transport intent).
    fn is_playing(&self) -> bool;

    /// Set the transport intent. The sequencer clock itself is started
    /// separately via `start_sequencer`.
    fn set_playing(&self, playing: bool);

    /// Start the sequencer clock. Idempotent.
    fn start_sequencer(&self);

    /// Stop the sequencer clock and release or abandon all in-flight
    /// barriers.
    fn stop_sequencer(&self);
}
