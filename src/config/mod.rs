// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the scheduling core.
//!
//! Provides the scheduler settings as a serde structure loadable from
//! YAML, with defaults matching a live-performance setup.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sequencer::PERCUSSION_CHANNEL;

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Minimum lead time between "now" and the earliest note emitted while
    /// playing, and the window before a pattern's play time at which its
    /// marker barrier fires.
    #[serde(default = "default_schedule_buffer_ms")]
    pub schedule_buffer_ms: i64,
    /// Channel pool for melodic tracks
    #[serde(default = "default_channels")]
    pub channels: Vec<u8>,
    /// Bound of each track's burst FIFO; a full queue backpressures ingest
    #[serde(default = "default_burst_queue_depth")]
    pub burst_queue_depth: usize,
}

fn default_schedule_buffer_ms() -> i64 {
    400
}

fn default_channels() -> Vec<u8> {
    (0..16).filter(|&ch| ch != PERCUSSION_CHANNEL).collect()
}

fn default_burst_queue_depth() -> usize {
    64
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_buffer_ms: default_schedule_buffer_ms(),
            channels: default_channels(),
            burst_queue_depth: default_burst_queue_depth(),
        }
    }
}

impl SchedulerConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings for values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.schedule_buffer_ms <= 0 {
            bail!("schedule_buffer_ms must be positive");
        }
        if self.burst_queue_depth == 0 {
            bail!("burst_queue_depth must be at least 1");
        }
        for &channel in &self.channels {
            if channel > 15 {
                bail!("channel {} is outside the MIDI range 0-15", channel);
            }
            if channel == PERCUSSION_CHANNEL {
                bail!("channel 9 is reserved for percussion");
            }
        }
        Ok(())
    }
}
