// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cluster workflows.
//!
//! The [`Orchestrator`] ties the other subsystems together:
//!
//! * **Select deployment**: normalize a description from the local
//!   deployment directory, publish it, rebuild the target registry, arm the
//!   controller link and push the file to every target
//! * **Start / stop cluster**: launch or kill the controller process
//! * **Scale unit**: forward `clone`/`unclone` to the controller
//! * **Live updates**: controller snapshots start idle runtimes and are
//!   republished to observers
//!
//! Observers talk to it through an [`OrchestratorHandle`].

mod events;
mod service;

#[cfg(test)]
mod integration_tests;

pub use events::{Epoch, ScaleAction};
pub use service::{Orchestrator, OrchestratorHandle};
