// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory deployment graph produced by normalization.
//!
//! Everything here is plain owned data. The derived parts ([`TypeOrder`],
//! [`LinkSet`], [`Hierarchy`]) are recomputed on every normalization and are
//! never edited in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a processing type (an `MSU_types[].id`).
    TypeId
);
numeric_id!(
    /// Identifier of a runtime node.
    RuntimeId
);
numeric_id!(
    /// Identifier of a unit instance (an `MSUs[].id`).
    UnitId
);
numeric_id!(
    /// Identifier of a route.
    RouteId
);

/// A processing type and the types it declares as successors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeNode {
    pub id: TypeId,
    pub name: String,
    pub successors: Vec<TypeId>,
}

/// Connectivity of a runtime as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeStatus {
    Idle,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeNode {
    pub id: RuntimeId,
    #[serde(rename = "ip")]
    pub address: String,
    /// Pinned plus unpinned threads.
    pub threads: u32,
    pub status: RuntimeStatus,
}

impl RuntimeNode {
    pub fn is_connected(&self) -> bool {
        self.status == RuntimeStatus::Connected
    }
}

/// One schedulable instance of a type, pinned to a runtime and thread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInstance {
    pub id: UnitId,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Name of the unit's type.
    pub name: String,
    pub runtime_id: RuntimeId,
    pub thread_id: u32,
    #[serde(rename = "routing")]
    pub routes: Vec<RouteId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub id: RouteId,
    pub destinations: Vec<UnitId>,
}

/// Position of one type in the resolved order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeRank {
    pub id: TypeId,
    pub name: String,
    pub order: usize,
}

/// Total, cycle-free order over every declared type.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct TypeOrder(pub Vec<TypeRank>);

impl TypeOrder {
    /// Layer index of `id`, if the type is part of the order.
    pub fn position(&self, id: TypeId) -> Option<usize> {
        self.0.iter().find(|rank| rank.id == id).map(|rank| rank.order)
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.0.iter().map(|rank| rank.id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resolved unit-to-unit edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Link {
    pub source: UnitId,
    pub target: UnitId,
}

/// Flattened links in (unit, route, destination) insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct LinkSet(pub Vec<Link>);

impl LinkSet {
    pub fn contains(&self, source: UnitId, target: UnitId) -> bool {
        self.0.iter().any(|l| l.source == source && l.target == target)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Units grouped by runtime and then by type, for presentation.
///
/// Every (runtime, type) pair for runtimes `1..=N` is present; combinations
/// with no units hold an empty list.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Hierarchy(pub BTreeMap<RuntimeId, BTreeMap<TypeId, Vec<UnitId>>>);

impl Hierarchy {
    /// Units of `type_id` hosted on `runtime`; `None` only when the pair is
    /// outside the hierarchy's key space.
    pub fn units(&self, runtime: RuntimeId, type_id: TypeId) -> Option<&[UnitId]> {
        self.0
            .get(&runtime)
            .and_then(|by_type| by_type.get(&type_id))
            .map(Vec::as_slice)
    }

    pub fn runtime_count(&self) -> usize {
        self.0.len()
    }
}

/// A validated deployment graph ("DFG").
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentGraph {
    pub application: String,
    pub controller_address: String,
    pub types: Vec<TypeNode>,
    pub runtimes: Vec<RuntimeNode>,
    pub units: Vec<UnitInstance>,
    pub routes: Vec<Route>,
    pub type_order: TypeOrder,
    pub links: LinkSet,
    pub hierarchy: Hierarchy,
}

impl DeploymentGraph {
    pub fn unit(&self, id: UnitId) -> Option<&UnitInstance> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Runtimes whose last reported status is not `Connected`.
    pub fn idle_runtimes(&self) -> impl Iterator<Item = &RuntimeNode> {
        self.runtimes.iter().filter(|rt| !rt.is_connected())
    }
}
