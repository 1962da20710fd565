// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Musical event model.
//!
//! Events are the unit of musical instruction delivered to tracks and
//! stored in patterns. All offsets are in milliseconds, relative to a
//! scheduling base supplied by the caller.

use serde::{Deserialize, Serialize};

/// An instrument program change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEvent {
    /// Offset from the scheduling base
    pub offset_ms: i64,
    /// MIDI program number (0-127)
    pub patch: u8,
}

/// A single note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Offset from the scheduling base
    pub offset_ms: i64,
    /// MIDI note number (0-127)
    pub note: u8,
    /// MIDI velocity (0-127)
    pub velocity: u8,
    /// How far this note advances the track cursor
    pub duration_ms: i64,
    /// How long the note actually sounds. Capped at `duration_ms`;
    /// nonpositive means "sound for the full duration".
    #[serde(default)]
    pub audible_ms: i64,
}

/// A percussion strike, routed through the percussion channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercussionEvent {
    /// Offset from the scheduling base
    pub offset_ms: i64,
}

/// A reference to a named pattern, scheduled `times` consecutive times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEvent {
    /// Offset from the scheduling base
    pub offset_ms: i64,
    /// Pattern name in the registry
    pub name: String,
    /// Consecutive repetitions; values below 1 schedule nothing
    #[serde(default = "default_times")]
    pub times: i32,
}

/// A loop bracket marker. Reserved; carries no behavior yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEvent {
    /// Offset from the scheduling base
    pub offset_ms: i64,
}

fn default_times() -> i32 {
    1
}

/// The unit of musical instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Instrument program change
    Patch(PatchEvent),
    /// A note with explicit duration
    Note(NoteEvent),
    /// A percussion strike
    Percussion(PercussionEvent),
    /// A reference to another pattern
    Pattern(PatternEvent),
    /// Start of a loop bracket (reserved)
    PatternLoop(LoopEvent),
    /// End of a loop bracket (reserved)
    FinishLoop(LoopEvent),
}

impl Event {
    /// Create a program change event
    pub fn patch(offset_ms: i64, patch: u8) -> Self {
        Event::Patch(PatchEvent {
            offset_ms,
            patch: patch.min(127),
        })
    }

    /// Create a note event sounding for its full duration
    pub fn note(offset_ms: i64, note: u8, velocity: u8, duration_ms: i64) -> Self {
        Event::Note(NoteEvent {
            offset_ms,
            note: note.min(127),
            velocity: velocity.min(127),
            duration_ms,
            audible_ms: duration_ms,
        })
    }

    /// Create a percussion event
    pub fn percussion(offset_ms: i64) -> Self {
        Event::Percussion(PercussionEvent { offset_ms })
    }

    /// Create a pattern reference event
    pub fn pattern(offset_ms: i64, name: impl Into<String>, times: i32) -> Self {
        Event::Pattern(PatternEvent {
            offset_ms,
            name: name.into(),
            times,
        })
    }

    /// Shorten the audible portion of a note event
    pub fn with_audible(self, audible_ms: i64) -> Self {
        match self {
            Event::Note(mut note) => {
                note.audible_ms = audible_ms.min(note.duration_ms);
                Event::Note(note)
            }
            other => other,
        }
    }
}

impl NoteEvent {
    /// Effective audible length: capped at the duration, with nonpositive
    /// values meaning the full duration.
    pub fn audible_duration_ms(&self) -> i64 {
        if self.audible_ms <= 0 {
            self.duration_ms
        } else {
            self.audible_ms.min(self.duration_ms)
        }
    }

    /// Copy of this note shifted to an absolute base
    pub fn shifted(&self, base_ms: i64) -> NoteEvent {
        NoteEvent {
            offset_ms: base_ms + self.offset_ms,
            ..self.clone()
        }
    }
}

/// Per-variant buckets for one scheduling pass.
///
/// The scheduler partitions a burst once instead of filtering the mixed
/// list repeatedly per variant. Loop bracket markers are reserved and do
/// not partition into any bucket.
#[derive(Debug, Default)]
pub struct EventBuckets {
    /// Program changes in arrival order
    pub patches: Vec<PatchEvent>,
    /// Notes in arrival order
    pub notes: Vec<NoteEvent>,
    /// Percussion strikes in arrival order
    pub percussion: Vec<PercussionEvent>,
    /// Pattern references in arrival order
    pub patterns: Vec<PatternEvent>,
}

impl EventBuckets {
    /// Partition a mixed event list in a single pass
    pub fn partition(events: &[Event]) -> Self {
        let mut buckets = EventBuckets::default();
        for event in events {
            match event {
                Event::Patch(e) => buckets.patches.push(e.clone()),
                Event::Note(e) => buckets.notes.push(e.clone()),
                Event::Percussion(e) => buckets.percussion.push(e.clone()),
                Event::Pattern(e) => buckets.patterns.push(e.clone()),
                Event::PatternLoop(_) | Event::FinishLoop(_) => {}
            }
        }
        buckets
    }

    /// Natural length of the direct notes: `max(offset + duration)`, or
    /// zero when there are none.
    pub fn natural_length_ms(&self) -> i64 {
        self.notes
            .iter()
            .map(|n| n.offset_ms + n.duration_ms)
            .max()
            .unwrap_or(0)
    }
}
