// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use crate::traits::RemoteEndpoint;

/// Lifecycle of one remote target as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    /// A process launched through `start` is still alive.
    Running,
    Errored,
}

impl ConnectionState {
    /// Whether the transport must be (re)checked before the next command.
    pub fn needs_connect(self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Errored)
    }
}

/// One registered controller or runtime host.
///
/// Targets are shared with in-flight operations through `Arc`, so an
/// operation started before `clear()` keeps a valid handle to the target it
/// was started against while the registry itself moves on.
#[derive(Debug)]
pub struct RemoteTarget {
    endpoint: RemoteEndpoint,
    state: watch::Sender<ConnectionState>,
    start_outstanding: AtomicBool,
}

impl RemoteTarget {
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            endpoint: RemoteEndpoint {
                id: id.into(),
                host: host.into(),
            },
            state,
            start_outstanding: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.endpoint.id
    }

    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Claim the start guard. Returns false if a start is already outstanding.
    pub(crate) fn try_begin_start(&self) -> bool {
        !self.start_outstanding.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn finish_start(&self) {
        self.start_outstanding.store(false, Ordering::Release);
    }

    pub fn start_outstanding(&self) -> bool {
        self.start_outstanding.load(Ordering::Acquire)
    }
}
