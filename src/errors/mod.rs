// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for every control-plane subsystem.
//!
//! Each subsystem owns a focused error enum. [`ControlPlaneError`] folds them
//! into the taxonomy observers see: malformed deployment graphs, remote
//! connection and command failures, controller protocol failures and an
//! unavailable controller. None of these are fatal to the process.

mod config;
mod graph;
mod link;
mod supervisor;

pub use config::ConfigError;
pub use graph::GraphError;
pub use link::LinkError;
pub use supervisor::SupervisorError;

use thiserror::Error;

/// Top-level error reported back to observers by the orchestrator.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Unparseable or referentially invalid deployment description.
    #[error("malformed deployment graph: {0}")]
    MalformedGraph(#[from] GraphError),

    /// Remote host unreachable, credential failure or a failed remote command.
    #[error(transparent)]
    Remote(#[from] SupervisorError),

    /// Failure on the controller stream or command channel.
    #[error(transparent)]
    Controller(#[from] LinkError),

    /// A scale command was issued while no controller connection exists.
    #[error("no controller connection")]
    ControllerUnavailable,

    /// No deployment has been selected yet.
    #[error("no deployment selected")]
    NoDeployment,
}
