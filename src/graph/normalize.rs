// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Raw description → validated [`DeploymentGraph`].
//!
//! Validation runs in a fixed order so the first error reported is the most
//! fundamental one:
//!
//! 1. **Uniqueness**: type, runtime, unit and route ids are unique
//! 2. **References**: every unit's type and runtime exist
//! 3. **Ordering**: type edges are resolved into a total order (cycles broken)
//!
//! Normalization is a pure function of its input. It builds a fresh graph and
//! only returns it once every check has passed.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::errors::GraphError;
use crate::graph::description::RawDeployment;
use crate::graph::links::{build_hierarchy, resolve_links};
use crate::graph::type_order::{declared_edges, resolve_type_order};
use crate::graph::{
    DeploymentGraph, Route, RuntimeNode, RuntimeStatus, TypeId, TypeNode, UnitInstance,
};
use crate::observability::messages::graph::DeploymentNormalized;
use crate::observability::messages::StructuredLog;

/// Parse and normalize a serialized description in one step.
pub fn parse_deployment(bytes: &[u8]) -> Result<DeploymentGraph, GraphError> {
    normalize(RawDeployment::from_slice(bytes)?)
}

/// Validate `raw` and compute its derived structures.
pub fn normalize(raw: RawDeployment) -> Result<DeploymentGraph, GraphError> {
    if raw.global_ctl_ip.trim().is_empty() {
        return Err(GraphError::MissingControllerAddress);
    }

    let types: Vec<TypeNode> = raw
        .msu_types
        .into_iter()
        .map(|t| TypeNode {
            id: t.id,
            name: t.name,
            successors: t.meta_routing.dst_types,
        })
        .collect();
    ensure_unique(types.iter().map(|t| t.id), GraphError::DuplicateType)?;

    let mut routes = Vec::new();
    let runtimes: Vec<RuntimeNode> = raw
        .runtimes
        .into_iter()
        .map(|rt| {
            routes.extend(rt.routes.into_iter().map(|r| Route {
                id: r.id,
                destinations: r.endpoints.into_iter().map(|ep| ep.msu).collect(),
            }));
            RuntimeNode {
                id: rt.id,
                address: rt.ip,
                threads: rt.n_pinned_threads + rt.n_unpinned_threads,
                status: if rt.connected {
                    RuntimeStatus::Connected
                } else {
                    RuntimeStatus::Idle
                },
            }
        })
        .collect();
    ensure_unique(runtimes.iter().map(|rt| rt.id), GraphError::DuplicateRuntime)?;
    ensure_unique(routes.iter().map(|r: &Route| r.id), GraphError::DuplicateRoute)?;

    let type_names: HashMap<TypeId, &str> = types.iter().map(|t| (t.id, t.name.as_str())).collect();
    let runtime_ids: HashSet<_> = runtimes.iter().map(|rt| rt.id).collect();

    let mut units = Vec::with_capacity(raw.msus.len());
    for msu in raw.msus {
        let name = type_names
            .get(&msu.type_id)
            .ok_or(GraphError::UnresolvedType {
                unit: msu.id,
                type_id: msu.type_id,
            })?;
        if !runtime_ids.contains(&msu.scheduling.runtime) {
            return Err(GraphError::UnresolvedRuntime {
                unit: msu.id,
                runtime: msu.scheduling.runtime,
            });
        }
        units.push(UnitInstance {
            id: msu.id,
            type_id: msu.type_id,
            name: name.to_string(),
            runtime_id: msu.scheduling.runtime,
            thread_id: msu.scheduling.thread_id,
            routes: msu.scheduling.routes,
        });
    }
    ensure_unique(units.iter().map(|u| u.id), GraphError::DuplicateUnit)?;

    let type_order = resolve_type_order(&types, &declared_edges(&types))?;
    let links = resolve_links(&units, &routes);
    let hierarchy = build_hierarchy(&units, &type_order, runtimes.len());

    DeploymentNormalized {
        application: &raw.application_name,
        type_count: types.len(),
        runtime_count: runtimes.len(),
        unit_count: units.len(),
        link_count: links.len(),
    }
    .log();

    Ok(DeploymentGraph {
        application: raw.application_name,
        controller_address: raw.global_ctl_ip,
        types,
        runtimes,
        units,
        routes,
        type_order,
        links,
        hierarchy,
    })
}

fn ensure_unique<T, I>(ids: I, duplicate: fn(T) -> GraphError) -> Result<(), GraphError>
where
    T: Copy + Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(duplicate(id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RouteId, RuntimeId, UnitId};
    use serde_json::json;

    fn two_runtime_description() -> serde_json::Value {
        json!({
            "application_name": "webserver",
            "global_ctl_ip": "10.0.0.1",
            "MSU_types": [
                { "id": 10, "name": "socket", "meta_routing": { "dst_types": [20] } },
                { "id": 20, "name": "http", "meta_routing": { "dst_types": [30] } },
                { "id": 30, "name": "write", "meta_routing": {} }
            ],
            "runtimes": [
                { "id": 1, "ip": "10.0.0.2", "num_pinned_threads": 2, "num_unpinned_threads": 1,
                  "routes": [ { "id": 100, "endpoints": [ { "msu": 2 } ] } ] },
                { "id": 2, "ip": "10.0.0.3", "n_pinned_threads": 1, "n_unpinned_threads": 0,
                  "connected": true,
                  "routes": [ { "id": 200, "endpoints": [ { "msu": 3 } ] } ] }
            ],
            "MSUs": [
                { "id": 1, "type": 10, "scheduling": { "runtime": 1, "thread_id": 1, "routes": [100] } },
                { "id": 2, "type": 20, "scheduling": { "runtime": 2, "thread_id": 1, "routes": [200] } },
                { "id": 3, "type": 30, "scheduling": { "runtime": 2, "thread_id": 2 } }
            ]
        })
    }

    fn parse(value: serde_json::Value) -> Result<DeploymentGraph, GraphError> {
        parse_deployment(value.to_string().as_bytes())
    }

    #[test]
    fn test_fields_are_extracted() {
        let graph = parse(two_runtime_description()).unwrap();

        assert_eq!(graph.application, "webserver");
        assert_eq!(graph.controller_address, "10.0.0.1");
        assert_eq!(graph.runtimes[0].threads, 3);
        assert_eq!(graph.runtimes[0].status, RuntimeStatus::Idle);
        assert_eq!(graph.runtimes[1].threads, 1);
        assert_eq!(graph.runtimes[1].status, RuntimeStatus::Connected);
        assert_eq!(graph.unit(UnitId(2)).unwrap().name, "http");
        assert_eq!(graph.routes.len(), 2);
        assert_eq!(graph.routes[1].id, RouteId(200));
    }

    #[test]
    fn test_derived_structures() {
        let graph = parse(two_runtime_description()).unwrap();

        let order: Vec<u32> = graph.type_order.ids().map(|t| t.0).collect();
        assert_eq!(order, vec![10, 20, 30]);
        assert!(graph.links.contains(UnitId(1), UnitId(2)));
        assert!(graph.links.contains(UnitId(2), UnitId(3)));
        assert_eq!(graph.links.len(), 2);
        assert_eq!(
            graph.hierarchy.units(RuntimeId(2), TypeId(30)),
            Some(&[UnitId(3)][..])
        );
    }

    #[test]
    fn test_idle_runtimes() {
        let graph = parse(two_runtime_description()).unwrap();
        let idle: Vec<RuntimeId> = graph.idle_runtimes().map(|rt| rt.id).collect();
        assert_eq!(idle, vec![RuntimeId(1)]);
    }

    #[test]
    fn test_empty_description() {
        assert_eq!(parse_deployment(b"  \n").unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            parse_deployment(b"{\"application_name\": ").unwrap_err(),
            GraphError::Parse(_)
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let mut description = two_runtime_description();
        description.as_object_mut().unwrap().remove("MSUs");
        assert!(matches!(parse(description).unwrap_err(), GraphError::Parse(_)));
    }

    #[test]
    fn test_controller_address_is_required() {
        let mut missing = two_runtime_description();
        missing.as_object_mut().unwrap().remove("global_ctl_ip");
        assert!(matches!(parse(missing).unwrap_err(), GraphError::Parse(_)));

        let mut blank = two_runtime_description();
        blank["global_ctl_ip"] = json!(" ");
        assert_eq!(parse(blank).unwrap_err(), GraphError::MissingControllerAddress);
    }

    #[test]
    fn test_unit_with_unknown_type() {
        let mut description = two_runtime_description();
        description["MSUs"][0]["type"] = json!(99);
        assert_eq!(
            parse(description).unwrap_err(),
            GraphError::UnresolvedType {
                unit: UnitId(1),
                type_id: TypeId(99)
            }
        );
    }

    #[test]
    fn test_unit_with_unknown_runtime() {
        let mut description = two_runtime_description();
        description["MSUs"][2]["scheduling"]["runtime"] = json!(5);
        assert_eq!(
            parse(description).unwrap_err(),
            GraphError::UnresolvedRuntime {
                unit: UnitId(3),
                runtime: RuntimeId(5)
            }
        );
    }

    #[test]
    fn test_duplicate_unit() {
        let mut description = two_runtime_description();
        description["MSUs"][1]["id"] = json!(1);
        assert_eq!(parse(description).unwrap_err(), GraphError::DuplicateUnit(UnitId(1)));
    }

    #[test]
    fn test_cyclic_types_still_normalize() {
        let mut description = two_runtime_description();
        description["MSU_types"][2]["meta_routing"]["dst_types"] = json!([10]);
        let graph = parse(description).unwrap();
        assert_eq!(graph.type_order.len(), 3);
    }
}
