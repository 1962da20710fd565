// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for LIVESEQ
//!
//! These tests drive the full pipeline (applier, track workers, pattern
//! expander) against a recording mock engine with a controllable clock
//! and holdable pattern barriers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use liveseq::midi::{BarrierHandle, MidiEngine, PatternBarrier};
use liveseq::{
    Applier, Event, SchedulerConfig, Sequencer, SystemAction, Updates, PERCUSSION_CHANNEL,
};

/// A primitive recorded by the mock engine
#[derive(Debug, Clone, PartialEq)]
enum EngineCall {
    Patch {
        at_ms: i64,
        channel: u8,
        patch: u8,
    },
    Note {
        start_ms: i64,
        end_ms: i64,
        channel: u8,
        note: u8,
        velocity: u8,
    },
    Percussion {
        at_ms: i64,
        track: u32,
    },
    SequencerStarted,
    SequencerStopped,
}

/// Recording engine with a manually advanced clock.
///
/// Markers are released immediately by default; with `hold_markers` set,
/// they are parked until the test releases them.
#[derive(Default)]
struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    offset_ms: Mutex<f64>,
    playing: AtomicBool,
    hold_markers: AtomicBool,
    held: Mutex<Vec<(i64, String, BarrierHandle)>>,
    markers_requested: Mutex<Vec<(i64, String)>>,
}

impl MockEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    fn notes(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Note { .. }))
            .collect()
    }

    fn set_offset(&self, offset_ms: f64) {
        *self.offset_ms.lock().unwrap() = offset_ms;
    }

    fn set_hold_markers(&self, hold: bool) {
        self.hold_markers.store(hold, Ordering::SeqCst);
    }

    fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    fn release_held(&self) {
        for (_, _, handle) in self.held.lock().unwrap().drain(..) {
            handle.release();
        }
    }

    fn markers_requested(&self) -> Vec<(i64, String)> {
        self.markers_requested.lock().unwrap().clone()
    }
}

impl MidiEngine for MockEngine {
    fn patch(&self, at_ms: i64, channel: u8, patch: u8) -> Result<()> {
        self.calls.lock().unwrap().push(EngineCall::Patch {
            at_ms,
            channel,
            patch,
        });
        Ok(())
    }

    fn note(&self, start_ms: i64, end_ms: i64, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.calls.lock().unwrap().push(EngineCall::Note {
            start_ms,
            end_ms,
            channel,
            note,
            velocity,
        });
        Ok(())
    }

    fn percussion(&self, at_ms: i64, track: u32) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Percussion { at_ms, track });
        Ok(())
    }

    fn pattern_marker(&self, at_ms: i64, pattern: &str) -> PatternBarrier {
        self.markers_requested
            .lock()
            .unwrap()
            .push((at_ms, pattern.to_string()));
        if self.hold_markers.load(Ordering::SeqCst) {
            let (handle, barrier) = PatternBarrier::pair();
            self.held
                .lock()
                .unwrap()
                .push((at_ms, pattern.to_string(), handle));
            barrier
        } else {
            PatternBarrier::open()
        }
    }

    fn current_offset_ms(&self) -> f64 {
        *self.offset_ms.lock().unwrap()
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }

    fn start_sequencer(&self) {
        self.calls.lock().unwrap().push(EngineCall::SequencerStarted);
    }

    fn stop_sequencer(&self) {
        self.calls.lock().unwrap().push(EngineCall::SequencerStopped);
        self.release_held();
    }
}

fn setup() -> (Arc<MockEngine>, Applier) {
    let engine = MockEngine::new();
    let sequencer = Sequencer::new(engine.clone(), SchedulerConfig::default());
    (engine, Applier::new(sequencer))
}

/// Poll until the condition holds; scheduling runs on worker threads.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// S1: a single note draws the first channel and advances the cursor by
/// its duration.
#[test]
fn test_basic_note() {
    let (engine, applier) = setup();

    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 60, 100, 500)]));

    assert!(wait_until(|| engine.notes().len() == 1));
    assert_eq!(
        engine.notes()[0],
        EngineCall::Note {
            start_ms: 0,
            end_ms: 500,
            channel: 0,
            note: 60,
            velocity: 100,
        }
    );
    assert_eq!(applier.sequencer().track_channel(1), Some(0));
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(500)));
}

/// S2: a past-due burst is coerced up to the playhead plus the schedule
/// buffer while playing.
#[test]
fn test_past_due_coercion() {
    let (engine, applier) = setup();
    engine.set_playing(true);
    engine.set_offset(1000.0);

    applier.apply(Updates::default().with_track_events(2, vec![Event::note(0, 62, 80, 200)]));

    assert!(wait_until(|| engine.notes().len() == 1));
    assert_eq!(
        engine.notes()[0],
        EngineCall::Note {
            start_ms: 1400,
            end_ms: 1600,
            channel: 0,
            note: 62,
            velocity: 80,
        }
    );
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(2) == Some(1600)));
}

/// S3: a pattern scheduled twice expands into both iterations, the second
/// shifted by the first's natural length.
#[test]
fn test_pattern_expansion() {
    let (engine, applier) = setup();

    applier.apply(
        Updates::default()
            .with_pattern_events(
                "A",
                vec![Event::note(0, 64, 100, 250), Event::note(250, 67, 100, 250)],
            )
            .with_track_events(1, vec![Event::pattern(0, "A", 2)]),
    );

    assert!(wait_until(|| engine.notes().len() == 4));
    let starts: Vec<i64> = engine
        .notes()
        .iter()
        .map(|c| match c {
            EngineCall::Note { start_ms, .. } => *start_ms,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(starts, vec![0, 250, 500, 750]);

    // First marker sits at max(0, 0 - 400) = 0.
    assert_eq!(engine.markers_requested()[0], (0, "A".to_string()));
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(1000)));
}

/// S4: an edit applied while the expansion waits on its barrier is
/// honored by every remaining iteration.
#[test]
fn test_jit_edit_under_held_barrier() {
    let (engine, applier) = setup();
    engine.set_hold_markers(true);

    applier.apply(
        Updates::default()
            .with_pattern_events(
                "A",
                vec![Event::note(0, 64, 100, 250), Event::note(250, 67, 100, 250)],
            )
            .with_track_events(1, vec![Event::pattern(0, "A", 2)]),
    );

    // The expansion is parked on its first marker.
    assert!(wait_until(|| engine.held_count() == 1));
    assert!(engine.notes().is_empty());

    // Redefine the pattern while it waits.
    applier.apply(
        Updates::default()
            .with_pattern_clear("A")
            .with_pattern_events("A", vec![Event::note(0, 72, 100, 100)]),
    );

    engine.set_hold_markers(false);
    engine.release_held();

    assert!(wait_until(|| engine.notes().len() == 2));
    assert_eq!(
        engine.notes(),
        vec![
            EngineCall::Note {
                start_ms: 0,
                end_ms: 100,
                channel: 0,
                note: 72,
                velocity: 100,
            },
            EngineCall::Note {
                start_ms: 100,
                end_ms: 200,
                channel: 0,
                note: 72,
                velocity: 100,
            },
        ]
    );
}

/// S5: the sixteenth melodic track finds the pool empty, logs and drops,
/// and keeps accepting bursts.
#[test]
fn test_channel_exhaustion() {
    let (engine, applier) = setup();

    for track in 1..=16 {
        applier.apply(Updates::default().with_track_events(track, vec![Event::patch(0, 5)]));
    }

    assert!(wait_until(|| {
        engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Patch { .. }))
            .count()
            == 15
    }));

    let mut channels: Vec<u8> = engine
        .calls()
        .iter()
        .filter_map(|c| match c {
            EngineCall::Patch { channel, .. } => Some(*channel),
            _ => None,
        })
        .collect();
    channels.sort_unstable();
    channels.dedup();
    assert_eq!(channels.len(), 15);
    assert!(!channels.contains(&PERCUSSION_CHANNEL));

    // Exactly one track came away empty-handed.
    let unassigned: Vec<u32> = (1..=16)
        .filter(|&t| applier.sequencer().track_channel(t).is_none())
        .collect();
    assert_eq!(unassigned.len(), 1);

    // The starved track still accepts work without crashing.
    let starved = unassigned[0];
    applier.apply(Updates::default().with_track_events(starved, vec![Event::note(0, 60, 100, 100)]));
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(starved) == Some(0)));
}

/// S6: percussion routes through channel 9 without touching the pool.
#[test]
fn test_percussion_routing() {
    let (engine, applier) = setup();

    applier.apply(Updates::default().with_track_events(3, vec![Event::percussion(100)]));

    assert!(wait_until(|| !engine.calls().is_empty()));
    assert_eq!(
        engine.calls(),
        vec![EngineCall::Percussion { at_ms: 100, track: 3 }]
    );
    assert_eq!(applier.sequencer().track_channel(3), Some(PERCUSSION_CHANNEL));

    // The pool was untouched: the next melodic track still gets channel 0.
    applier.apply(Updates::default().with_track_events(4, vec![Event::note(0, 60, 100, 100)]));
    assert!(wait_until(|| applier.sequencer().track_channel(4) == Some(0)));
}

/// Bursts on one track schedule in arrival order; the second burst starts
/// where the first ended.
#[test]
fn test_bursts_schedule_in_order() {
    let (engine, applier) = setup();

    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 60, 100, 500)]));
    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 62, 100, 250)]));

    assert!(wait_until(|| engine.notes().len() == 2));
    assert_eq!(
        engine.notes(),
        vec![
            EngineCall::Note {
                start_ms: 0,
                end_ms: 500,
                channel: 0,
                note: 60,
                velocity: 100,
            },
            EngineCall::Note {
                start_ms: 500,
                end_ms: 750,
                channel: 0,
                note: 62,
                velocity: 100,
            },
        ]
    );
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(750)));
}

/// An empty batch leaves every piece of state untouched.
#[test]
fn test_empty_updates_is_a_noop() {
    let (engine, applier) = setup();

    applier.apply(Updates::default());

    std::thread::sleep(Duration::from_millis(20));
    assert!(engine.calls().is_empty());
    assert_eq!(applier.sequencer().track_count(), 0);
    assert!(!engine.is_playing());
}

/// An empty burst leaves the cursor where the previous burst put it.
#[test]
fn test_empty_burst_keeps_the_cursor() {
    let (engine, applier) = setup();

    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 60, 100, 500)]));
    assert!(wait_until(|| engine.notes().len() == 1));

    applier.apply(Updates::default().with_track_events(1, vec![]));
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(500)));
}

/// Play raises the transport intent and the finishing worker starts the
/// clock; Stop tears both down.
#[test]
fn test_play_and_stop_transport() {
    let (engine, applier) = setup();

    // Raise the intent first so the next burst reliably hits the start
    // gate with it set.
    applier.apply(Updates::default().with_system_action(SystemAction::Play));
    assert!(engine.is_playing());

    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 60, 100, 100)]));
    assert!(wait_until(|| engine
        .calls()
        .contains(&EngineCall::SequencerStarted)));

    applier.apply(Updates::default().with_system_action(SystemAction::Stop));
    assert!(!engine.is_playing());
    assert!(engine.calls().contains(&EngineCall::SequencerStopped));
}

/// An unknown pattern reference is a silent empty expansion, not an error.
#[test]
fn test_unknown_pattern_expands_to_nothing() {
    let (engine, applier) = setup();

    applier.apply(Updates::default().with_track_events(1, vec![Event::pattern(0, "ghost", 3)]));

    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(0)));
    assert!(engine.notes().is_empty());
    // The registry auto-created the pattern.
    assert!(applier.sequencer().patterns().is_empty("ghost"));
}

/// `times < 1` schedules nothing.
#[test]
fn test_nonpositive_times_schedules_nothing() {
    let (engine, applier) = setup();

    applier.apply(
        Updates::default()
            .with_pattern_events("A", vec![Event::note(0, 64, 100, 250)])
            .with_track_events(1, vec![Event::pattern(0, "A", 0)]),
    );

    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(0)));
    assert!(engine.notes().is_empty());
}

/// Nested patterns expand relative to their parent's start.
#[test]
fn test_nested_pattern_expansion() {
    let (engine, applier) = setup();

    applier.apply(
        Updates::default()
            .with_pattern_events("inner", vec![Event::note(0, 60, 100, 100)])
            .with_pattern_events(
                "outer",
                vec![Event::note(0, 72, 100, 200), Event::pattern(200, "inner", 1)],
            )
            .with_track_events(1, vec![Event::pattern(100, "outer", 1)]),
    );

    assert!(wait_until(|| engine.notes().len() == 2));
    let starts: Vec<i64> = engine
        .notes()
        .iter()
        .map(|c| match c {
            EngineCall::Note { start_ms, .. } => *start_ms,
            _ => unreachable!(),
        })
        .collect();
    // outer starts at 100; inner starts at 100 + 200.
    assert_eq!(starts, vec![100, 300]);
}

/// A self-referential pattern aborts the nested branch instead of
/// recursing forever.
#[test]
fn test_self_referential_pattern_is_cut() {
    let (engine, applier) = setup();

    applier.apply(
        Updates::default()
            .with_pattern_events(
                "loop",
                vec![Event::note(0, 60, 100, 100), Event::pattern(100, "loop", 2)],
            )
            .with_track_events(1, vec![Event::pattern(0, "loop", 1)]),
    );

    assert!(wait_until(|| engine.notes().len() == 1));
    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(100)));
}

/// Edits landing after an iteration's snapshot appear in the next
/// iteration only.
#[test]
fn test_edit_between_iterations() {
    let (engine, applier) = setup();
    engine.set_hold_markers(true);

    applier.apply(
        Updates::default()
            .with_pattern_events("A", vec![Event::note(0, 60, 100, 200)])
            .with_track_events(1, vec![Event::pattern(0, "A", 2)]),
    );

    // Release the first iteration with the original definition.
    assert!(wait_until(|| engine.held_count() == 1));
    engine.release_held();
    assert!(wait_until(|| engine.notes().len() == 1));

    // Edit lands while the second iteration is parked on its marker.
    assert!(wait_until(|| engine.held_count() == 1));
    applier.apply(
        Updates::default()
            .with_pattern_clear("A")
            .with_pattern_events("A", vec![Event::note(0, 67, 100, 200)]),
    );
    engine.set_hold_markers(false);
    engine.release_held();

    assert!(wait_until(|| engine.notes().len() == 2));
    let notes: Vec<(i64, u8)> = engine
        .notes()
        .iter()
        .map(|c| match c {
            EngineCall::Note { start_ms, note, .. } => (*start_ms, *note),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(notes, vec![(0, 60), (200, 67)]);
}

/// Stopping the engine abandons held barriers and the burst is dropped
/// cleanly; the track keeps working afterwards.
#[test]
fn test_stop_abandons_inflight_expansion() {
    let (engine, applier) = setup();
    engine.set_hold_markers(true);

    applier.apply(
        Updates::default()
            .with_pattern_events("A", vec![Event::note(0, 60, 100, 200)])
            .with_track_events(1, vec![Event::pattern(0, "A", 2)]),
    );

    assert!(wait_until(|| engine.held_count() == 1));

    // Drop the handles without releasing: the expansion abandons.
    engine.held.lock().unwrap().clear();
    engine.set_hold_markers(false);

    assert!(wait_until(|| applier.sequencer().track_cursor_ms(1) == Some(0)));
    assert!(engine.notes().is_empty());

    // The worker is still alive.
    applier.apply(Updates::default().with_track_events(1, vec![Event::note(0, 62, 100, 100)]));
    assert!(wait_until(|| engine.notes().len() == 1));
}
