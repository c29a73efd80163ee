// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the observer WebSocket server.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

/// # Log Level
/// `info!`
pub struct ServerListening {
    pub address: SocketAddr,
}

impl Display for ServerListening {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer server listening on ws://{}", self.address)
    }
}

impl StructuredLog for ServerListening {
    fn log(&self) {
        tracing::info!(address = %self.address, "{}", self);
    }
}

/// The WebSocket handshake with a new connection failed.
///
/// # Log Level
/// `warn!`
pub struct HandshakeFailed<'a> {
    pub peer: SocketAddr,
    pub error: &'a dyn std::error::Error,
}

impl Display for HandshakeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "WebSocket handshake with {} failed: {}", self.peer, self.error)
    }
}

impl StructuredLog for HandshakeFailed<'_> {
    fn log(&self) {
        tracing::warn!(peer = %self.peer, error = %self.error, "{}", self);
    }
}

/// An observer sent a frame that is not a known request.
///
/// # Log Level
/// `warn!`
pub struct RequestUnreadable<'a> {
    pub observer_id: u64,
    pub raw: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for RequestUnreadable<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignoring unreadable request from observer {}: {}",
            self.observer_id, self.error
        )
    }
}

impl StructuredLog for RequestUnreadable<'_> {
    fn log(&self) {
        tracing::warn!(
            observer_id = self.observer_id,
            raw = self.raw,
            error = %self.error,
            "{}", self
        );
    }
}

/// # Log Level
/// `info!`, `warn!` when the connection ended on an error
pub struct ObserverConnectionClosed<'a> {
    pub observer_id: u64,
    pub peer: SocketAddr,
    pub error: Option<&'a dyn std::error::Error>,
}

impl Display for ObserverConnectionClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer {} ({}) disconnected", self.observer_id, self.peer)?;
        if let Some(error) = self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

impl StructuredLog for ObserverConnectionClosed<'_> {
    fn log(&self) {
        match self.error {
            Some(error) => tracing::warn!(
                observer_id = self.observer_id,
                peer = %self.peer,
                error = %error,
                "{}", self
            ),
            None => tracing::info!(observer_id = self.observer_id, peer = %self.peer, "{}", self),
        }
    }
}
