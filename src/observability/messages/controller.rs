// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the controller link.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// Link callbacks and endpoint were (re)armed.
///
/// # Log Level
/// `info!`, `warn!` when a previous session was overwritten
pub struct LinkInitialized<'a> {
    pub address: &'a str,
    pub replaced: bool,
}

impl Display for LinkInitialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.replaced {
            write!(f, "Controller link re-initialized for {}; previous session dropped", self.address)
        } else {
            write!(f, "Controller link initialized for {}", self.address)
        }
    }
}

impl StructuredLog for LinkInitialized<'_> {
    fn log(&self) {
        if self.replaced {
            tracing::warn!(address = self.address, "{}", self);
        } else {
            tracing::info!(address = self.address, "{}", self);
        }
    }
}

/// Streaming channel established.
///
/// # Log Level
/// `info!`
pub struct ControllerConnected<'a> {
    pub address: &'a str,
    pub command_channel: bool,
}

impl Display for ControllerConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connected to controller stream at {}", self.address)?;
        if !self.command_channel {
            write!(f, " (no command channel)")?;
        }
        Ok(())
    }
}

impl StructuredLog for ControllerConnected<'_> {
    fn log(&self) {
        tracing::info!(
            address = self.address,
            command_channel = self.command_channel,
            "{}", self
        );
    }
}

/// The command channel could not be opened; scale commands will fail until
/// the next connect.
///
/// # Log Level
/// `warn!`
pub struct CommandChannelUnavailable<'a> {
    pub address: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for CommandChannelUnavailable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not open controller command channel at {}: {}", self.address, self.error)
    }
}

impl StructuredLog for CommandChannelUnavailable<'_> {
    fn log(&self) {
        tracing::warn!(address = self.address, error = %self.error, "{}", self);
    }
}

/// # Log Level
/// `info!`
pub struct CommandSent<'a> {
    pub command: &'a str,
}

impl Display for CommandSent<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Sent controller command `{}`", self.command)
    }
}

impl StructuredLog for CommandSent<'_> {
    fn log(&self) {
        tracing::info!(command = self.command, "{}", self);
    }
}

/// Buffered bytes did not decode yet; waiting for more.
///
/// # Log Level
/// `debug!`
pub struct SnapshotPending {
    pub buffered: usize,
    pub failures: u32,
}

impl Display for SnapshotPending {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Snapshot incomplete after {} attempts ({} bytes buffered)",
            self.failures, self.buffered
        )
    }
}

impl StructuredLog for SnapshotPending {
    fn log(&self) {
        tracing::debug!(buffered = self.buffered, failures = self.failures, "{}", self);
    }
}

/// Too many consecutive decode failures; the buffer was dropped.
///
/// # Log Level
/// `warn!`
pub struct SnapshotBufferDiscarded {
    pub discarded: usize,
    pub failures: u32,
}

impl Display for SnapshotBufferDiscarded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarding {} buffered bytes after {} failed snapshot decodes",
            self.discarded, self.failures
        )
    }
}

impl StructuredLog for SnapshotBufferDiscarded {
    fn log(&self) {
        tracing::warn!(discarded = self.discarded, failures = self.failures, "{}", self);
    }
}

/// A complete snapshot was received but does not describe a valid graph.
///
/// # Log Level
/// `warn!`
pub struct SnapshotRejected<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for SnapshotRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rejected controller snapshot: {}", self.error)
    }
}

impl StructuredLog for SnapshotRejected<'_> {
    fn log(&self) {
        tracing::warn!(error = %self.error, "{}", self);
    }
}

/// The streaming channel ended, cleanly or not.
///
/// # Log Level
/// `info!` on close, `error!` on failure
pub struct ControllerStreamEnded<'a> {
    pub address: &'a str,
    pub error: Option<&'a dyn std::error::Error>,
}

impl Display for ControllerStreamEnded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.error {
            None => write!(f, "Controller at {} closed the stream", self.address),
            Some(error) => write!(f, "Controller stream at {} failed: {}", self.address, error),
        }
    }
}

impl StructuredLog for ControllerStreamEnded<'_> {
    fn log(&self) {
        match self.error {
            None => tracing::info!(address = self.address, "{}", self),
            Some(error) => tracing::error!(address = self.address, error = %error, "{}", self),
        }
    }
}
