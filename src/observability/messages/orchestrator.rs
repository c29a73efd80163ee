// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for cluster workflows.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A deployment description was accepted.
///
/// # Log Level
/// `info!`, `warn!` when it replaced a previous deployment
pub struct DeploymentSelected<'a> {
    pub file_name: &'a str,
    pub application: &'a str,
    pub runtime_count: usize,
    pub unit_count: usize,
    pub replaced: Option<&'a str>,
}

impl Display for DeploymentSelected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if let Some(previous) = self.replaced {
            write!(f, "Replacing deployment '{}' with ", previous)?;
        } else {
            write!(f, "Selected deployment ")?;
        }
        write!(
            f,
            "'{}' from {} ({} runtimes, {} units)",
            self.application, self.file_name, self.runtime_count, self.unit_count
        )
    }
}

impl StructuredLog for DeploymentSelected<'_> {
    fn log(&self) {
        if self.replaced.is_some() {
            tracing::warn!(
                file_name = self.file_name,
                application = self.application,
                runtime_count = self.runtime_count,
                unit_count = self.unit_count,
                "{}", self
            );
        } else {
            tracing::info!(
                file_name = self.file_name,
                application = self.application,
                runtime_count = self.runtime_count,
                unit_count = self.unit_count,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "deployment",
            span_name = name,
            file_name = self.file_name,
            application = self.application,
        )
    }
}

/// A deployment description was refused; nothing changed.
///
/// # Log Level
/// `error!`
pub struct DeploymentRejected<'a> {
    pub file_name: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for DeploymentRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rejected deployment {}: {}", self.file_name, self.error)
    }
}

impl StructuredLog for DeploymentRejected<'_> {
    fn log(&self) {
        tracing::error!(file_name = self.file_name, error = %self.error, "{}", self);
    }
}

/// An observer asked for a cluster-wide action.
///
/// # Log Level
/// `info!`
pub struct ClusterAction<'a> {
    pub action: &'a str,
    pub observer_id: u64,
}

impl Display for ClusterAction<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "--- {} (requested by observer {}) ---", self.action, self.observer_id)
    }
}

impl StructuredLog for ClusterAction<'_> {
    fn log(&self) {
        tracing::info!(action = self.action, observer_id = self.observer_id, "{}", self);
    }
}

/// # Log Level
/// `info!`
pub struct ControllerAttached<'a> {
    pub application: &'a str,
}

impl Display for ControllerAttached<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Attached to running controller for '{}'", self.application)
    }
}

impl StructuredLog for ControllerAttached<'_> {
    fn log(&self) {
        tracing::info!(application = self.application, "{}", self);
    }
}

/// A runtime launched by the orchestrator exited.
///
/// # Log Level
/// `warn!`
pub struct RuntimeStopped<'a> {
    pub runtime_id: &'a str,
    pub exit_code: i32,
}

impl Display for RuntimeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Runtime {} has stopped (exit code {})", self.runtime_id, self.exit_code)
    }
}

impl StructuredLog for RuntimeStopped<'_> {
    fn log(&self) {
        tracing::warn!(runtime_id = self.runtime_id, exit_code = self.exit_code, "{}", self);
    }
}

/// A result arrived for a deployment that has since been replaced.
///
/// # Log Level
/// `debug!`
pub struct StaleEventIgnored {
    pub kind: &'static str,
    pub epoch: u64,
    pub current: u64,
}

impl Display for StaleEventIgnored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring {} from deployment #{} (current #{})",
            self.kind, self.epoch, self.current
        )
    }
}

impl StructuredLog for StaleEventIgnored {
    fn log(&self) {
        tracing::debug!(kind = self.kind, epoch = self.epoch, current = self.current, "{}", self);
    }
}
