// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Update batches and their application.
//!
//! An [`Updates`] value is one atomic unit of ingest: transport actions,
//! pattern edits, and track bursts decoded from the wire by an external
//! parser. The [`Applier`] applies each batch in a fixed four-phase order
//! so that pattern edits always land before the bursts that reference
//! them, and transport comes up only after events exist.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::sequencer::{Event, Sequencer};

/// Transport-level action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    /// Stop the sequencer clock
    Stop,
    /// Wipe scheduler state (reserved)
    Clear,
    /// Raise the transport intent
    Play,
}

/// Per-track action (all reserved)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackAction {
    /// Silence the track (reserved)
    Mute,
    /// Unsilence the track (reserved)
    Unmute,
    /// Drop the track's queued bursts (reserved)
    Clear,
}

/// Per-pattern action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternAction {
    /// Empty the pattern's event list
    Clear,
}

/// One atomic ingest unit.
///
/// Every field defaults to empty so sparse wire batches parse; the default
/// value is the empty batch, and applying it changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    /// Transport actions
    #[serde(default)]
    pub system_actions: BTreeSet<SystemAction>,
    /// Per-track actions
    #[serde(default)]
    pub track_actions: BTreeMap<u32, BTreeSet<TrackAction>>,
    /// Per-pattern actions
    #[serde(default)]
    pub pattern_actions: BTreeMap<String, BTreeSet<PatternAction>>,
    /// Events appended to patterns
    #[serde(default)]
    pub pattern_events: BTreeMap<String, Vec<Event>>,
    /// Events enqueued to tracks, one burst per track
    #[serde(default)]
    pub track_events: BTreeMap<u32, Vec<Event>>,
}

impl Updates {
    /// Whether the batch contains nothing to apply
    pub fn is_empty(&self) -> bool {
        self.system_actions.is_empty()
            && self.track_actions.is_empty()
            && self.pattern_actions.is_empty()
            && self.pattern_events.is_empty()
            && self.track_events.is_empty()
    }

    /// Add a transport action
    pub fn with_system_action(mut self, action: SystemAction) -> Self {
        self.system_actions.insert(action);
        self
    }

    /// Clear a pattern before this batch's edits apply
    pub fn with_pattern_clear(mut self, name: impl Into<String>) -> Self {
        self.pattern_actions
            .entry(name.into())
            .or_default()
            .insert(PatternAction::Clear);
        self
    }

    /// Append events to a pattern
    pub fn with_pattern_events(mut self, name: impl Into<String>, events: Vec<Event>) -> Self {
        self.pattern_events.entry(name.into()).or_default().extend(events);
        self
    }

    /// Enqueue a burst on a track
    pub fn with_track_events(mut self, track: u32, events: Vec<Event>) -> Self {
        self.track_events.entry(track).or_default().extend(events);
        self
    }
}

/// Single-threaded applier of update batches.
///
/// All batches must flow through one applier so that phase 4 of batch *n*
/// happens before phase 1 of batch *n+1*.
pub struct Applier {
    sequencer: Sequencer,
}

impl Applier {
    /// Create an applier over the sequencer
    pub fn new(sequencer: Sequencer) -> Self {
        Self { sequencer }
    }

    /// The sequencer this applier feeds
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Apply one batch in four ordered phases:
    /// teardown, pattern edits, track enqueues, transport up.
    pub fn apply(&self, updates: Updates) {
        let engine = self.sequencer.engine();

        // Phase 1: teardown. Stop before anything else so a stop-and-
        // redefine batch never plays stale material.
        if updates.system_actions.contains(&SystemAction::Stop) {
            engine.set_playing(false);
            engine.stop_sequencer();
        }
        if updates.system_actions.contains(&SystemAction::Clear) {
            log::debug!("system clear requested (reserved, ignored)");
        }
        for (track, actions) in &updates.track_actions {
            for action in actions {
                log::debug!("track {}: {:?} requested (reserved, ignored)", track, action);
            }
        }
        for (name, actions) in &updates.pattern_actions {
            if actions.contains(&PatternAction::Clear) {
                self.sequencer.patterns().clear(name);
            }
        }

        // Phase 2: pattern edits, strictly before the enqueues below so a
        // burst referencing an edited pattern sees the new definition.
        for (name, events) in updates.pattern_events {
            self.sequencer.patterns().append(&name, events);
        }

        // Phase 3: track enqueues.
        for (track, events) in updates.track_events {
            self.sequencer.enqueue(track, events);
        }

        // Phase 4: transport up. The clock itself is started by the first
        // track worker to finish a burst.
        if updates.system_actions.contains(&SystemAction::Play) {
            engine.set_playing(true);
        }
    }
}
