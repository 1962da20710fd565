// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Console MIDI engine.
//!
//! A reference [`MidiEngine`] for running the playback core without MIDI
//! hardware. Scheduled primitives are written to the log, the playhead
//! follows the wall clock, and pattern barriers are released by a small
//! timer thread when the playhead reaches their marker time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;

use super::{BarrierHandle, MidiEngine, PatternBarrier};

/// How often the timer thread checks for due markers.
const TICK_INTERVAL: Duration = Duration::from_millis(5);

struct Clock {
    /// Milliseconds accumulated across previous run periods.
    accumulated_ms: f64,
    /// Start of the current run period, if the clock is advancing.
    started_at: Option<Instant>,
}

struct PendingMarker {
    release_at_ms: i64,
    pattern: String,
    handle: BarrierHandle,
}

struct Inner {
    playing: AtomicBool,
    running: AtomicBool,
    shutdown: AtomicBool,
    clock: Mutex<Clock>,
    markers: Mutex<Vec<PendingMarker>>,
}

impl Inner {
    fn offset_ms(&self) -> f64 {
        let clock = self.clock.lock();
        let elapsed = clock
            .started_at
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        clock.accumulated_ms + elapsed
    }

    /// Release every pending marker whose time has come.
    fn release_due_markers(&self) {
        let now = self.offset_ms() as i64;
        let mut markers = self.markers.lock();
        if markers.is_empty() {
            return;
        }

        let mut held = Vec::with_capacity(markers.len());
        for marker in markers.drain(..) {
            if marker.release_at_ms <= now {
                log::debug!(
                    "marker for pattern {:?} due at {}ms, releasing",
                    marker.pattern,
                    marker.release_at_ms
                );
                marker.handle.release();
            } else {
                held.push(marker);
            }
        }
        *markers = held;
    }

    /// Abandon every pending marker (sequencer stopped or engine dropped).
    fn abandon_markers(&self) {
        let mut markers = self.markers.lock();
        if !markers.is_empty() {
            log::debug!("abandoning {} pending pattern markers", markers.len());
        }
        markers.clear();
    }
}

/// Log-backed engine whose playhead follows the wall clock.
pub struct ConsoleEngine {
    inner: Arc<Inner>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ConsoleEngine {
    /// Create the engine and start its marker timer thread.
    pub fn new() -> Self {
        let inner = Arc::new(Inner {
            playing: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            clock: Mutex::new(Clock {
                accumulated_ms: 0.0,
                started_at: None,
            }),
            markers: Mutex::new(Vec::new()),
        });

        let ticker_inner = Arc::clone(&inner);
        let ticker = thread::spawn(move || {
            while !ticker_inner.shutdown.load(Ordering::Relaxed) {
                if ticker_inner.running.load(Ordering::Relaxed) {
                    ticker_inner.release_due_markers();
                }
                thread::sleep(TICK_INTERVAL);
            }
        });

        Self {
            inner,
            ticker: Mutex::new(Some(ticker)),
        }
    }
}

impl Default for ConsoleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiEngine for ConsoleEngine {
    fn patch(&self, at_ms: i64, channel: u8, patch: u8) -> Result<()> {
        log::info!("patch   {:>8}ms  ch {:<2} program {}", at_ms, channel, patch);
        Ok(())
    }

    fn note(&self, start_ms: i64, end_ms: i64, channel: u8, note: u8, velocity: u8) -> Result<()> {
        log::info!(
            "note    {:>8}ms..{}ms  ch {:<2} note {:<3} vel {}",
            start_ms,
            end_ms,
            channel,
            note,
            velocity
        );
        Ok(())
    }

    fn percussion(&self, at_ms: i64, track: u32) -> Result<()> {
        log::info!("perc    {:>8}ms  track {}", at_ms, track);
        Ok(())
    }

    fn pattern_marker(&self, at_ms: i64, pattern: &str) -> PatternBarrier {
        let now = self.inner.offset_ms() as i64;
        if !self.inner.running.load(Ordering::Relaxed) || at_ms <= now {
            log::trace!("marker for pattern {:?} at {}ms already due", pattern, at_ms);
            return PatternBarrier::open();
        }

        let (handle, barrier) = PatternBarrier::pair();
        self.inner.markers.lock().push(PendingMarker {
            release_at_ms: at_ms,
            pattern: pattern.to_string(),
            handle,
        });
        barrier
    }

    fn current_offset_ms(&self) -> f64 {
        self.inner.offset_ms()
    }

    fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::Relaxed)
    }

    fn set_playing(&self, playing: bool) {
        self.inner.playing.store(playing, Ordering::Relaxed);
    }

    fn start_sequencer(&self) {
        if !self.inner.running.swap(true, Ordering::Relaxed) {
            let mut clock = self.inner.clock.lock();
            if clock.started_at.is_none() {
                clock.started_at = Some(Instant::now());
            }
            log::info!("sequencer started at {:.0}ms", clock.accumulated_ms);
        }
    }

    fn stop_sequencer(&self) {
        if self.inner.running.swap(false, Ordering::Relaxed) {
            let mut clock = self.inner.clock.lock();
            if let Some(started) = clock.started_at.take() {
                clock.accumulated_ms += started.elapsed().as_secs_f64() * 1000.0;
            }
            log::info!("sequencer stopped at {:.0}ms", clock.accumulated_ms);
        }
        self.inner.abandon_markers();
    }
}

impl Drop for ConsoleEngine {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        if let Some(ticker) = self.ticker.lock().take() {
            let _ = ticker.join();
        }
        self.inner.abandon_markers();
    }
}
