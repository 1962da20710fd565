// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-track scheduling workers.
//!
//! Each track owns a bounded FIFO of event bursts and one dedicated worker
//! thread draining it. A burst is scheduled under the track's fair mutex,
//! which also guards the rolling start-offset cursor, so bursts always
//! schedule in arrival order and each burst sees the end time of the one
//! before it. Scheduling may block for a long time inside the pattern
//! expander; meanwhile the FIFO keeps accepting new bursts up to its bound.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::FairMutex;

use super::events::{Event, EventBuckets, NoteEvent};
use super::{expander, Core};

/// Ingest-side handle to one track's worker.
pub(crate) struct TrackHandle {
    burst_tx: Option<Sender<Vec<Event>>>,
    cursor: Arc<FairMutex<i64>>,
    worker: Option<JoinHandle<()>>,
}

impl TrackHandle {
    /// Spawn the track's worker thread.
    pub(crate) fn spawn(number: u32, core: Arc<Core>) -> Self {
        let (burst_tx, burst_rx) = bounded(core.config.burst_queue_depth);
        let cursor = Arc::new(FairMutex::new(0));
        let worker = TrackWorker {
            number,
            core,
            cursor: Arc::clone(&cursor),
        };
        let join = thread::spawn(move || worker.run(burst_rx));

        Self {
            burst_tx: Some(burst_tx),
            cursor,
            worker: Some(join),
        }
    }

    /// Clone of the burst FIFO's sender. Sending on it may block when the
    /// FIFO is full, so callers must not hold shared locks across a send.
    pub(crate) fn sender(&self) -> Option<Sender<Vec<Event>>> {
        self.burst_tx.clone()
    }

    /// Clone of the cursor handle. Locking it blocks while a burst is
    /// scheduling, so callers must not hold shared locks across it.
    pub(crate) fn cursor(&self) -> Arc<FairMutex<i64>> {
        Arc::clone(&self.cursor)
    }
}

impl Drop for TrackHandle {
    fn drop(&mut self) {
        // Closing the FIFO lets the worker drain what is queued and exit.
        self.burst_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct TrackWorker {
    number: u32,
    core: Arc<Core>,
    cursor: Arc<FairMutex<i64>>,
}

impl TrackWorker {
    fn run(&self, bursts: Receiver<Vec<Event>>) {
        log::debug!("track {}: worker started", self.number);
        while let Ok(burst) = bursts.recv() {
            let mut cursor = self.cursor.lock();
            match self.schedule_events(&burst, *cursor) {
                Ok(next) => *cursor = next,
                Err(e) => log::error!("track {}: burst abandoned: {:#}", self.number, e),
            }
        }
        log::debug!("track {}: queue closed, worker exiting", self.number);
    }

    /// Schedule one burst against the engine timeline.
    ///
    /// Returns the new start offset: the maximum end time over the notes
    /// this burst materialized, or the unadjusted input offset when the
    /// burst produced no notes.
    fn schedule_events(&self, events: &[Event], start_offset_ms: i64) -> Result<i64> {
        let engine = self.core.engine.as_ref();
        let original = start_offset_ms;

        // Never schedule in the past, and keep a lead-time buffer between
        // the playhead and the earliest new event while audio is running.
        let now = engine.current_offset_ms().round() as i64;
        let mut start = start_offset_ms.max(now);
        if engine.is_playing() && start - now < self.core.config.schedule_buffer_ms {
            start += self.core.config.schedule_buffer_ms;
        }

        let buckets = EventBuckets::partition(events);
        let mut notes: Vec<NoteEvent> = Vec::new();

        for patch in &buckets.patches {
            match self.acquire_channel() {
                Some(channel) => engine.patch(start + patch.offset_ms, channel, patch.patch)?,
                None => log::warn!(
                    "track {}: no MIDI channel left, dropping program change",
                    self.number
                ),
            }
        }

        for percussion in &buckets.percussion {
            self.core.channels.lock().force_percussion(self.number);
            engine.percussion(start + percussion.offset_ms, self.number)?;
        }

        for note in &buckets.notes {
            match self.acquire_channel() {
                Some(channel) => {
                    let shifted = note.shifted(start);
                    engine.note(
                        shifted.offset_ms,
                        shifted.offset_ms + shifted.audible_duration_ms(),
                        channel,
                        shifted.note,
                        shifted.velocity,
                    )?;
                    notes.push(shifted);
                }
                None => log::warn!(
                    "track {}: no MIDI channel left, dropping note {}",
                    self.number,
                    note.note
                ),
            }
        }

        for pattern in &buckets.patterns {
            notes.extend(expander::schedule_pattern(
                &self.core,
                self.number,
                pattern,
                start,
            )?);
        }

        // Ingest raises the transport intent; the first track to finish a
        // burst actually starts the clock, so events exist before it runs.
        if engine.is_playing() {
            engine.start_sequencer();
        }

        Ok(notes
            .iter()
            .map(|n| n.offset_ms + n.duration_ms)
            .max()
            .unwrap_or(original))
    }

    fn acquire_channel(&self) -> Option<u8> {
        self.core.channels.lock().acquire(self.number)
    }
}
