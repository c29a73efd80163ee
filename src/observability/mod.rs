// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic the control plane emits goes through a message type in
//! [`messages`]. Each type implements `Display` for the human-readable text
//! and [`messages::StructuredLog`] to emit it at a fixed level with
//! structured fields, so log text lives in one place per subsystem.
//!
//! # Usage
//!
//! ```rust
//! use the_switchboard::observability::messages::StructuredLog;
//! use the_switchboard::observability::messages::controller::CommandSent;
//!
//! CommandSent { command: "clone 12" }.log();
//! ```
//!
//! Output format and filtering are configured once by the binary through
//! `tracing-subscriber` (`RUST_LOG` / `--log-level`).

pub mod messages;
