// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for deployment graph normalization.
//!
//! This module contains message types for logging events related to:
//! * Cycle breaking in the type order
//! * Route endpoints that name unknown units
//! * Successful normalization

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// An edge was removed to break a cycle in the type graph.
///
/// # Log Level
/// `warn!` - Expected for cyclic descriptions, but worth seeing
///
/// # Example
/// ```
/// use the_switchboard::observability::messages::graph::CycleEdgeRemoved;
///
/// let msg = CycleEdgeRemoved {
///     cycle_node: 2,
///     from: 1,
///     to: 2,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct CycleEdgeRemoved {
    pub cycle_node: u32,
    pub from: u32,
    pub to: u32,
}

impl Display for CycleEdgeRemoved {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cyclic type dependency through {}: removed edge {} -> {}",
            self.cycle_node, self.from, self.to
        )
    }
}

impl StructuredLog for CycleEdgeRemoved {
    fn log(&self) {
        tracing::warn!(
            cycle_node = self.cycle_node,
            from = self.from,
            to = self.to,
            "{}", self
        );
    }
}

/// A route names a destination unit that does not exist.
///
/// # Log Level
/// `warn!` - Link is dropped
pub struct DanglingRouteEndpoint {
    pub route_id: u32,
    pub unit_id: u32,
}

impl Display for DanglingRouteEndpoint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Route {} points at unknown unit {}; dropping link",
            self.route_id, self.unit_id
        )
    }
}

impl StructuredLog for DanglingRouteEndpoint {
    fn log(&self) {
        tracing::warn!(
            route_id = self.route_id,
            unit_id = self.unit_id,
            "{}", self
        );
    }
}

/// A description was normalized into a deployment graph.
///
/// # Log Level
/// `debug!` - Happens for every controller snapshot
pub struct DeploymentNormalized<'a> {
    pub application: &'a str,
    pub type_count: usize,
    pub runtime_count: usize,
    pub unit_count: usize,
    pub link_count: usize,
}

impl Display for DeploymentNormalized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Normalized '{}': {} types, {} runtimes, {} units, {} links",
            self.application, self.type_count, self.runtime_count, self.unit_count, self.link_count
        )
    }
}

impl StructuredLog for DeploymentNormalized<'_> {
    fn log(&self) {
        tracing::debug!(
            application = self.application,
            type_count = self.type_count,
            runtime_count = self.runtime_count,
            unit_count = self.unit_count,
            link_count = self.link_count,
            "{}", self
        );
    }
}
