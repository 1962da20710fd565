// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The player loop.
//!
//! A blocking consumer over the inbound instruction queue. Raw
//! instructions are whatever the transport delivers (OSC bundles, YAML
//! documents, test fixtures); a caller-supplied [`UpdateParser`] turns
//! each one into an [`Updates`] batch, which is handed to the applier.
//! Disconnecting the queue is the sole shutdown signal.

use anyhow::Result;
use crossbeam_channel::Receiver;

use crate::ingest::{Applier, Updates};

/// Parser from raw instructions to update batches.
///
/// Implemented for any `FnMut(M) -> Result<Updates>` closure.
pub trait UpdateParser<M> {
    /// Parse one raw instruction value
    fn parse(&mut self, raw: M) -> Result<Updates>;
}

impl<M, F> UpdateParser<M> for F
where
    F: FnMut(M) -> Result<Updates>,
{
    fn parse(&mut self, raw: M) -> Result<Updates> {
        self(raw)
    }
}

/// Blocking consumer of the inbound instruction queue
pub struct Player<M> {
    instructions: Receiver<M>,
    applier: Applier,
}

impl<M> Player<M> {
    /// Create a player over an instruction queue and an applier
    pub fn new(instructions: Receiver<M>, applier: Applier) -> Self {
        Self {
            instructions,
            applier,
        }
    }

    /// Consume instructions until the queue disconnects.
    ///
    /// A batch that fails to parse is logged and dropped; playback
    /// continues with the next one.
    pub fn run<P: UpdateParser<M>>(self, mut parser: P) {
        while let Ok(raw) = self.instructions.recv() {
            match parser.parse(raw) {
                Ok(updates) => self.applier.apply(updates),
                Err(e) => log::warn!("dropping malformed instruction batch: {:#}", e),
            }
        }
        log::info!("instruction queue closed, player loop exiting");
    }
}
