// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! LIVESEQ - playback core for a live-programmable MIDI player.
//!
//! The crate receives batches of musical update messages describing tracks,
//! patterns, and transport actions, and schedules MIDI events on an
//! underlying sequencer so that notes sound at the correct wall-clock
//! moments. Patterns are resolved just in time: a pattern reference is not
//! materialized into notes until the playhead is within a configurable
//! buffer of its play time, so pattern definitions can be edited while
//! playback continues.
//!
//! Main pieces:
//! - [`midi::MidiEngine`] - the consumed sequencer capability
//! - [`sequencer::Sequencer`] - per-track scheduling workers
//! - [`ingest::Applier`] - four-phase application of update batches
//! - [`player::Player`] - blocking loop over the inbound instruction queue

pub mod config;
pub mod ingest;
pub mod midi;
pub mod player;
pub mod sequencer;

pub use config::SchedulerConfig;
pub use ingest::{Applier, PatternAction, SystemAction, TrackAction, Updates};
pub use midi::{BarrierHandle, BarrierWait, MidiEngine, PatternBarrier};
pub use player::{Player, UpdateParser};
pub use sequencer::{Event, NoteEvent, PatternEvent, Sequencer, PERCUSSION_CHANNEL};
