// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;

use liveseq::midi::ConsoleEngine;
use liveseq::{Applier, Event, Player, SchedulerConfig, Sequencer, SystemAction, Updates};

fn print_usage() {
    println!("LIVESEQ - Live-Programmable MIDI Player");
    println!();
    println!("Usage: liveseq [OPTIONS]");
    println!();
    println!("Reads YAML update batches from stdin (separated by '---' lines)");
    println!("and plays them through the console engine.");
    println!();
    println!("Options:");
    println!("  --demo              Play a built-in demo instead of reading stdin");
    println!("  --config <FILE>     Load scheduler settings from a YAML file");
    println!("  --buffer-ms <N>     Override the schedule buffer (default 400)");
    println!("  --help              Show this help message");
}

/// Read stdin into YAML documents and feed them through the player loop.
fn run_stdin(applier: Applier) -> Result<()> {
    let (tx, rx) = bounded::<String>(16);

    let reader = thread::spawn(move || {
        let stdin = io::stdin();
        let mut document = String::new();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    break;
                }
            };
            if line.trim_end() == "---" {
                if !document.trim().is_empty() && tx.send(std::mem::take(&mut document)).is_err() {
                    break;
                }
                document.clear();
            } else {
                document.push_str(&line);
                document.push('\n');
            }
        }
        if !document.trim().is_empty() {
            let _ = tx.send(document);
        }
    });

    let player = Player::new(rx, applier);
    player.run(|document: String| {
        serde_yaml::from_str::<Updates>(&document).context("malformed update batch")
    });

    let _ = reader.join();
    Ok(())
}

/// Play a short built-in sequence: define a pattern, loop it, edit it
/// while it plays, then stop.
fn run_demo(applier: Applier) -> Result<()> {
    println!("Playing demo (edit lands mid-playback)...");

    // Define the pattern and get the clock running with a pickup note;
    // markers are only held once the sequencer is live.
    applier.apply(
        Updates::default()
            .with_pattern_events(
                "riff",
                vec![
                    Event::note(0, 60, 100, 250),
                    Event::note(250, 64, 100, 250),
                    Event::note(500, 67, 100, 250),
                    Event::note(750, 64, 100, 250),
                ],
            )
            .with_track_events(1, vec![Event::note(0, 48, 90, 100)])
            .with_system_action(SystemAction::Play),
    );
    thread::sleep(Duration::from_millis(200));

    // Loop the pattern; each iteration expands just in time.
    applier.apply(Updates::default().with_track_events(1, vec![Event::pattern(0, "riff", 4)]));

    thread::sleep(Duration::from_millis(1500));

    // Redefine the pattern while the track is still looping it; the
    // remaining iterations pick up the new notes.
    applier.apply(
        Updates::default()
            .with_pattern_clear("riff")
            .with_pattern_events(
                "riff",
                vec![
                    Event::note(0, 72, 100, 125),
                    Event::note(125, 71, 100, 125),
                    Event::note(250, 69, 100, 250),
                ],
            ),
    );

    thread::sleep(Duration::from_millis(3000));

    applier.apply(Updates::default().with_system_action(SystemAction::Stop));
    println!("Demo complete!");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = SchedulerConfig::default();
    let mut demo = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--demo" => {
                demo = true;
            }
            "--config" => {
                i += 1;
                let path = args.get(i).context("--config requires a file path")?;
                config = SchedulerConfig::load(path)?;
            }
            "--buffer-ms" => {
                i += 1;
                let value = args.get(i).context("--buffer-ms requires a number")?;
                config.schedule_buffer_ms = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid buffer value: {}", value))?;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config.validate()?;

    let engine = Arc::new(ConsoleEngine::new());
    let sequencer = Sequencer::new(engine, config);
    let applier = Applier::new(sequencer);

    if demo {
        run_demo(applier)
    } else {
        run_stdin(applier)
    }
}
