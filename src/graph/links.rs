// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Route resolution and the runtime/type presentation hierarchy.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::{Hierarchy, Link, LinkSet, Route, RouteId, RuntimeId, TypeOrder, UnitId, UnitInstance};
use crate::observability::messages::graph::DanglingRouteEndpoint;
use crate::observability::messages::StructuredLog;

/// Expand every unit's route ids into concrete `{source, target}` links.
///
/// A route id with no matching [`Route`] contributes nothing: a runtime may
/// reference a route that only another runtime emits. Destinations that are
/// not known units are dropped so the result only names existing units.
/// Output order follows (unit, route, destination) insertion order.
pub fn resolve_links(units: &[UnitInstance], routes: &[Route]) -> LinkSet {
    let by_id: HashMap<RouteId, &Route> = routes.iter().map(|r| (r.id, r)).collect();
    let known: HashSet<UnitId> = units.iter().map(|u| u.id).collect();

    let mut links = Vec::new();
    for unit in units {
        for route_id in &unit.routes {
            let Some(route) = by_id.get(route_id) else {
                continue;
            };
            for &target in &route.destinations {
                if !known.contains(&target) {
                    DanglingRouteEndpoint {
                        route_id: route.id.0,
                        unit_id: target.0,
                    }
                    .log();
                    continue;
                }
                links.push(Link {
                    source: unit.id,
                    target,
                });
            }
        }
    }
    LinkSet(links)
}

/// Partition units by runtime (`1..=runtime_count`) and then by type.
///
/// Every runtime in range gets an entry for every ordered type, empty when no
/// unit matches, so the renderer never sees a missing key.
pub fn build_hierarchy(units: &[UnitInstance], types: &TypeOrder, runtime_count: usize) -> Hierarchy {
    let mut buckets = BTreeMap::new();
    for rt in 1..=runtime_count as u32 {
        let runtime = RuntimeId(rt);
        let by_type = types
            .ids()
            .map(|type_id| {
                let members = units
                    .iter()
                    .filter(|u| u.runtime_id == runtime && u.type_id == type_id)
                    .map(|u| u.id)
                    .collect();
                (type_id, members)
            })
            .collect();
        buckets.insert(runtime, by_type);
    }
    Hierarchy(buckets)
}
