// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] to emit the event with structured fields at the level
//! documented on the type.
//!
//! # Organization
//!
//! * `graph` - Deployment graph normalization
//! * `supervisor` - Remote targets, process launch and file distribution
//! * `controller` - Controller stream and command channel
//! * `broadcast` - Observer sessions and fan-out
//! * `orchestrator` - Cluster workflows
//! * `server` - Observer WebSocket connections
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_switchboard::observability::messages::StructuredLog;
//! use the_switchboard::observability::messages::supervisor::ProcessLaunched;
//!
//! let msg = ProcessLaunched {
//!     target_id: "ctl",
//!     command: "global_controller -j app.json",
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod broadcast;
pub mod controller;
pub mod graph;
pub mod orchestrator;
pub mod server;
pub mod supervisor;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span {
        tracing::info_span!("switchboard", span_name = name)
    }
}
