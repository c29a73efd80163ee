// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deployment graph normalization.
//!
//! Turns a raw deployment description (types, runtimes, units, routes) into a
//! validated [`DeploymentGraph`] with its derived type order, link set and
//! runtime/type hierarchy. No I/O happens here.

mod description;
mod links;
mod model;
mod normalize;
mod type_order;


pub use description::{
    RawDeployment, RawEndpoint, RawMetaRouting, RawRoute, RawRuntime, RawScheduling, RawType,
    RawUnit,
};
pub use links::{build_hierarchy, resolve_links};
pub use model::{
    DeploymentGraph, Hierarchy, Link, LinkSet, Route, RouteId, RuntimeId, RuntimeNode,
    RuntimeStatus, TypeId, TypeNode, TypeOrder, TypeRank, UnitId, UnitInstance,
};
pub use normalize::{normalize, parse_deployment};
pub use type_order::{declared_edges, resolve_type_order, TypeEdge};
