// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod remote_shell;

pub use remote_shell::{CommandOutput, ExitFuture, RemoteEndpoint, RemoteShell};
