// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Just-in-time pattern expansion.
//!
//! A pattern reference is not materialized into notes when its burst
//! arrives. The expander asks the engine for a marker barrier a buffer
//! ahead of the pattern's play time, blocks until the playhead gets there,
//! and only then snapshots the pattern's current definition and schedules
//! it. Edits made while the expansion waits are honored; edits made after
//! the snapshot appear in a later iteration or not at all.

use anyhow::Result;

use super::events::{EventBuckets, NoteEvent, PatternEvent};
use super::Core;
use crate::midi::BarrierWait;

/// Expand a pattern reference and schedule its notes on the track's
/// channel. Returns the materialized notes with absolute offsets.
pub(crate) fn schedule_pattern(
    core: &Core,
    track: u32,
    event: &PatternEvent,
    base_offset_ms: i64,
) -> Result<Vec<NoteEvent>> {
    let mut chain = Vec::new();
    expand(core, track, event, base_offset_ms, &mut chain)
}

/// One level of expansion. `chain` holds the pattern names currently being
/// expanded above this frame; re-entering one of them would recurse
/// forever, so that branch is skipped with a warning.
///
/// Repetition is handled iteratively with one barrier wait per iteration;
/// recursion depth is bounded by pattern nesting alone.
fn expand(
    core: &Core,
    track: u32,
    event: &PatternEvent,
    base_offset_ms: i64,
    chain: &mut Vec<String>,
) -> Result<Vec<NoteEvent>> {
    let mut materialized = Vec::new();
    if event.times < 1 {
        return Ok(materialized);
    }
    if chain.iter().any(|name| name == &event.name) {
        log::warn!(
            "pattern {:?} references itself through {:?}; skipping to avoid a cycle",
            event.name,
            chain
        );
        return Ok(materialized);
    }
    chain.push(event.name.clone());

    let engine = core.engine.as_ref();
    let buffer_ms = core.config.schedule_buffer_ms;
    let mut base = base_offset_ms;
    let mut start = base_offset_ms + event.offset_ms;

    for _ in 0..event.times {
        let marker = base.max(start - buffer_ms);
        let barrier = engine.pattern_marker(marker, &event.name);
        if barrier.wait() == BarrierWait::Abandoned {
            log::debug!(
                "pattern {:?}: marker at {}ms abandoned, dropping the rest of the expansion",
                event.name,
                marker
            );
            break;
        }

        let snapshot = core.patterns.snapshot(&event.name);
        let buckets = EventBuckets::partition(&snapshot);

        for note in &buckets.notes {
            let channel = core.channels.lock().acquire(track);
            match channel {
                Some(channel) => {
                    let shifted = note.shifted(start);
                    engine.note(
                        shifted.offset_ms,
                        shifted.offset_ms + shifted.audible_duration_ms(),
                        channel,
                        shifted.note,
                        shifted.velocity,
                    )?;
                    materialized.push(shifted);
                }
                None => log::warn!(
                    "track {}: no MIDI channel left, dropping note {} of pattern {:?}",
                    track,
                    note.note,
                    event.name
                ),
            }
        }

        for nested in &buckets.patterns {
            materialized.extend(expand(core, track, nested, start, chain)?);
        }

        // The next iteration starts where this one's direct notes end. A
        // snapshot with no positive length cannot advance, so repeating it
        // would stack identical copies at the same instant.
        let advance = buckets.natural_length_ms();
        if advance <= 0 {
            break;
        }
        base = start;
        start += advance;
    }

    chain.pop();
    Ok(materialized)
}
