// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by the controller link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// `connect`/`send_command` called before `initialize`.
    #[error("controller link is not initialized")]
    NotInitialized,

    /// The streaming channel could not be established.
    #[error("could not connect to controller at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The established streaming channel failed.
    #[error("controller stream failed: {0}")]
    Stream(#[source] std::io::Error),

    /// The command channel is not open.
    #[error("controller command channel is not connected")]
    CommandChannelClosed,

    #[error("failed to write controller command: {0}")]
    Send(#[source] std::io::Error),
}
