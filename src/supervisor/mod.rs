// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Remote process supervision.
//!
//! [`ProcessSupervisor`] keeps the registry of remote targets (the
//! controller host plus one host per runtime) and runs commands, launches,
//! kills and file copies against them through a [`RemoteShell`]
//! implementation. [`SshShell`] is the production transport;
//! [`stub::StubShell`] records calls for tests.
//!
//! [`RemoteShell`]: crate::traits::RemoteShell

mod registry;
mod ssh;
pub mod stub;
mod target;

pub use registry::{ProcessSupervisor, StartOutcome};
pub(crate) use ssh::shell_quote;
pub use ssh::SshShell;
pub use target::{ConnectionState, RemoteTarget};
