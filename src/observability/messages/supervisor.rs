// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for remote process supervision.
//!
//! This module contains message types for logging events related to:
//! * Target registration and connection
//! * Process launch, exit and termination
//! * Deployment file distribution

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A remote target was added to the registry.
///
/// # Log Level
/// `info!`, or `warn!` when an existing target was replaced
pub struct TargetRegistered<'a> {
    pub target_id: &'a str,
    pub address: &'a str,
    pub replaced: bool,
}

impl Display for TargetRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.replaced {
            write!(f, "Replacing target '{}' with {}", self.target_id, self.address)
        } else {
            write!(f, "Registered target '{}' at {}", self.target_id, self.address)
        }
    }
}

impl StructuredLog for TargetRegistered<'_> {
    fn log(&self) {
        if self.replaced {
            tracing::warn!(target_id = self.target_id, address = self.address, "{}", self);
        } else {
            tracing::info!(target_id = self.target_id, address = self.address, "{}", self);
        }
    }
}

/// The registry was dropped wholesale.
///
/// # Log Level
/// `info!`
pub struct RegistryCleared {
    pub target_count: usize,
}

impl Display for RegistryCleared {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Cleared {} remote targets", self.target_count)
    }
}

impl StructuredLog for RegistryCleared {
    fn log(&self) {
        tracing::info!(target_count = self.target_count, "{}", self);
    }
}

/// Connecting to a target failed.
///
/// # Log Level
/// `warn!` - Target stays registered for retry
pub struct TargetConnectFailed<'a> {
    pub target_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TargetConnectFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not connect to target '{}': {}", self.target_id, self.error)
    }
}

impl StructuredLog for TargetConnectFailed<'_> {
    fn log(&self) {
        tracing::warn!(target_id = self.target_id, error = %self.error, "{}", self);
    }
}

/// A remote command exited non-zero.
///
/// # Log Level
/// `warn!`
pub struct RemoteCommandFailed<'a> {
    pub target_id: &'a str,
    pub command: &'a str,
    pub status: i32,
    pub output: &'a str,
}

impl Display for RemoteCommandFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Command `{}` on '{}' exited with status {}",
            self.command, self.target_id, self.status
        )
    }
}

impl StructuredLog for RemoteCommandFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            target_id = self.target_id,
            command = self.command,
            status = self.status,
            output = self.output,
            "{}", self
        );
    }
}

/// A long-running remote process was launched.
///
/// # Log Level
/// `info!`
///
/// # Example
/// ```
/// use the_switchboard::observability::messages::supervisor::ProcessLaunched;
///
/// let msg = ProcessLaunched {
///     target_id: "1",
///     command: "/opt/dedos/bin/rt -j /opt/dedos/dfgs/app.json -i 1",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ProcessLaunched<'a> {
    pub target_id: &'a str,
    pub command: &'a str,
}

impl Display for ProcessLaunched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Launched `{}` on '{}'", self.command, self.target_id)
    }
}

impl StructuredLog for ProcessLaunched<'_> {
    fn log(&self) {
        tracing::info!(target_id = self.target_id, command = self.command, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "remote_process",
            span_name = name,
            target_id = self.target_id,
            command = self.command,
        )
    }
}

/// A launched remote process exited.
///
/// # Log Level
/// `info!` on a clean exit, `warn!` otherwise
pub struct ProcessExited<'a> {
    pub target_id: &'a str,
    pub exit_code: i32,
}

impl Display for ProcessExited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Process on '{}' exited with code {}", self.target_id, self.exit_code)
    }
}

impl StructuredLog for ProcessExited<'_> {
    fn log(&self) {
        if self.exit_code == 0 {
            tracing::info!(target_id = self.target_id, exit_code = self.exit_code, "{}", self);
        } else {
            tracing::warn!(target_id = self.target_id, exit_code = self.exit_code, "{}", self);
        }
    }
}

/// A start was requested while a previous one is still outstanding.
///
/// # Log Level
/// `warn!` - The request is ignored
pub struct StartAlreadyOutstanding<'a> {
    pub target_id: &'a str,
}

impl Display for StartAlreadyOutstanding<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Already started a process on '{}'; not starting again", self.target_id)
    }
}

impl StructuredLog for StartAlreadyOutstanding<'_> {
    fn log(&self) {
        tracing::warn!(target_id = self.target_id, "{}", self);
    }
}

/// Pattern-based termination finished (whether or not anything matched).
///
/// # Log Level
/// `info!` when delivered, `warn!` when it could not be delivered
pub struct KillAttempted<'a> {
    pub target_id: &'a str,
    pub pattern: &'a str,
    pub error: Option<&'a dyn std::error::Error>,
}

impl Display for KillAttempted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.error {
            None => write!(f, "Sent kill for '{}' on '{}'", self.pattern, self.target_id),
            Some(error) => write!(
                f,
                "Could not kill '{}' on '{}': {}",
                self.pattern, self.target_id, error
            ),
        }
    }
}

impl StructuredLog for KillAttempted<'_> {
    fn log(&self) {
        match self.error {
            None => tracing::info!(target_id = self.target_id, pattern = self.pattern, "{}", self),
            Some(error) => tracing::warn!(
                target_id = self.target_id,
                pattern = self.pattern,
                error = %error,
                "{}", self
            ),
        }
    }
}

/// A supervisor operation named a target that is no longer registered.
///
/// # Log Level
/// `warn!`
pub struct UnknownTarget<'a> {
    pub target_id: &'a str,
    pub operation: &'a str,
}

impl Display for UnknownTarget<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: target '{}' is not registered", self.operation, self.target_id)
    }
}

impl StructuredLog for UnknownTarget<'_> {
    fn log(&self) {
        tracing::warn!(target_id = self.target_id, operation = self.operation, "{}", self);
    }
}

/// A file was copied to one target.
///
/// # Log Level
/// `debug!`
pub struct FileCopied<'a> {
    pub target_id: &'a str,
    pub remote_path: &'a str,
}

impl Display for FileCopied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Copied file to {}:{}", self.target_id, self.remote_path)
    }
}

impl StructuredLog for FileCopied<'_> {
    fn log(&self) {
        tracing::debug!(target_id = self.target_id, remote_path = self.remote_path, "{}", self);
    }
}

/// A file broadcast to every target finished.
///
/// # Log Level
/// `info!` on success, `error!` on the first failure
pub struct FileBroadcastFinished<'a> {
    pub local_path: &'a str,
    pub target_count: usize,
    pub error: Option<&'a dyn std::error::Error>,
}

impl Display for FileBroadcastFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.error {
            None => write!(
                f,
                "Broadcast {} to {} targets",
                self.local_path, self.target_count
            ),
            Some(error) => write!(f, "Failed to broadcast {}: {}", self.local_path, error),
        }
    }
}

impl StructuredLog for FileBroadcastFinished<'_> {
    fn log(&self) {
        match self.error {
            None => tracing::info!(
                local_path = self.local_path,
                target_count = self.target_count,
                "{}", self
            ),
            Some(error) => tracing::error!(
                local_path = self.local_path,
                target_count = self.target_count,
                error = %error,
                "{}", self
            ),
        }
    }
}
