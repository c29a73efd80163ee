// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::path::Path;

use crate::errors::SupervisorError;

/// Identity and address of one remote target, as handed to a [`RemoteShell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub id: String,
    pub host: String,
}

/// Result of a remote command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Everything the command printed, stdout first.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Resolves with the exit code of a launched remote process.
pub type ExitFuture = BoxFuture<'static, i32>;

/// Transport used by the process supervisor to reach remote targets.
///
/// Implementations only report transport-level failures as errors
/// ([`SupervisorError::Connection`]); a command that runs and exits non-zero
/// is a successful [`CommandOutput`] and the caller decides what it means.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Check that the endpoint is reachable with our credentials.
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<(), SupervisorError>;

    /// Run `command` to completion.
    async fn exec(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<CommandOutput, SupervisorError>;

    /// Launch `command` without waiting for it. The returned future resolves
    /// when the remote process exits.
    async fn launch(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<ExitFuture, SupervisorError>;

    /// Create `path` (and its parents) on the endpoint.
    async fn mkdir(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<(), SupervisorError>;

    /// Copy the local file at `local` to `remote` on the endpoint.
    async fn put(&self, endpoint: &RemoteEndpoint, local: &Path, remote: &str) -> Result<(), SupervisorError>;
}
