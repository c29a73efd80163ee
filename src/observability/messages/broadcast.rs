// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for observer sessions and state fan-out.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// # Log Level
/// `info!`
pub struct ObserverRegistered {
    pub observer_id: u64,
    pub observer_count: usize,
}

impl Display for ObserverRegistered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer {} connected ({} total)", self.observer_id, self.observer_count)
    }
}

impl StructuredLog for ObserverRegistered {
    fn log(&self) {
        tracing::info!(
            observer_id = self.observer_id,
            observer_count = self.observer_count,
            "{}", self
        );
    }
}

/// # Log Level
/// `info!`
pub struct ObserverUnregistered {
    pub observer_id: u64,
    pub observer_count: usize,
}

impl Display for ObserverUnregistered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer {} disconnected ({} remaining)", self.observer_id, self.observer_count)
    }
}

impl StructuredLog for ObserverUnregistered {
    fn log(&self) {
        tracing::info!(
            observer_id = self.observer_id,
            observer_count = self.observer_count,
            "{}", self
        );
    }
}

/// The observer's outbound channel is gone; its session is dropped.
///
/// # Log Level
/// `debug!`
pub struct ObserverGone {
    pub observer_id: u64,
}

impl Display for ObserverGone {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer {} stopped receiving; dropping session", self.observer_id)
    }
}

impl StructuredLog for ObserverGone {
    fn log(&self) {
        tracing::debug!(observer_id = self.observer_id, "{}", self);
    }
}

/// # Log Level
/// `debug!`
pub struct GraphPublished<'a> {
    pub application: &'a str,
    pub forced: bool,
    pub observers: usize,
    pub messages: usize,
}

impl Display for GraphPublished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Published '{}' to {} observers ({} messages{})",
            self.application,
            self.observers,
            self.messages,
            if self.forced { ", forced" } else { "" }
        )
    }
}

impl StructuredLog for GraphPublished<'_> {
    fn log(&self) {
        tracing::debug!(
            application = self.application,
            forced = self.forced,
            observers = self.observers,
            messages = self.messages,
            "{}", self
        );
    }
}

/// A facet could not be serialized; nothing was published.
///
/// # Log Level
/// `error!`
pub struct FacetRenderFailed<'a> {
    pub facet: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for FacetRenderFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not serialize {} facet: {}", self.facet, self.error)
    }
}

impl StructuredLog for FacetRenderFailed<'_> {
    fn log(&self) {
        tracing::error!(facet = self.facet, error = %self.error, "{}", self);
    }
}

/// # Log Level
/// `error!`
pub struct ErrorBroadcast<'a> {
    pub message: &'a str,
    pub observers: usize,
}

impl Display for ErrorBroadcast<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Broadcasting error to {} observers: {}", self.observers, self.message)
    }
}

impl StructuredLog for ErrorBroadcast<'_> {
    fn log(&self) {
        tracing::error!(observers = self.observers, error_message = self.message, "{}", self);
    }
}
