// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by remote process supervision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SupervisorError {
    /// The target is not registered, unreachable, or rejected our credentials.
    /// The target stays registered so the operation can be retried.
    #[error("connection to target '{target}' failed: {reason}")]
    Connection { target: String, reason: String },

    /// A remote command ran but exited non-zero. `output` carries what the
    /// command printed, for diagnostics.
    #[error("command `{command}` on target '{target}' exited with status {status}")]
    Command {
        target: String,
        command: String,
        status: i32,
        output: String,
    },
}

impl SupervisorError {
    pub fn unknown_target(target: &str) -> Self {
        SupervisorError::Connection {
            target: target.to_string(),
            reason: "target is not registered".to_string(),
        }
    }

    pub fn target(&self) -> &str {
        match self {
            SupervisorError::Connection { target, .. } | SupervisorError::Command { target, .. } => {
                target
            }
        }
    }
}
