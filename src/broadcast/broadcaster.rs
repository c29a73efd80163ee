// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;

use crate::broadcast::facets::{render, Facet, RenderedFacet};
use crate::broadcast::protocol::{EventName, ServerEvent};
use crate::graph::DeploymentGraph;
use crate::observability::messages::broadcast::{
    ErrorBroadcast, FacetRenderFailed, GraphPublished, ObserverGone, ObserverRegistered,
    ObserverUnregistered,
};
use crate::observability::messages::StructuredLog;

pub type ObserverId = u64;

/// Outbound half of one observer's connection.
pub type ObserverSender = mpsc::UnboundedSender<ServerEvent>;

struct ObserverSession {
    outbound: ObserverSender,
    /// Last text sent per facet. Only used to suppress repeats.
    last_sent: HashMap<Facet, String>,
}

impl ObserverSession {
    fn new(outbound: ObserverSender) -> Self {
        Self {
            outbound,
            last_sent: HashMap::new(),
        }
    }

    /// Send every facet that differs from what this observer last saw.
    /// Returns the number of messages sent, or `None` if the observer is gone.
    fn sync(&mut self, facets: &[RenderedFacet], force: bool) -> Option<usize> {
        let mut sent = 0;
        for rendered in facets {
            let unchanged = self.last_sent.get(&rendered.facet) == Some(&rendered.text);
            if unchanged && !force {
                continue;
            }
            self.outbound.send(rendered.event()).ok()?;
            self.last_sent.insert(rendered.facet, rendered.text.clone());
            sent += 1;
        }
        Some(sent)
    }
}

/// Fans graph state and notifications out to connected observers, sending
/// each observer only the facets that changed since it last heard.
#[derive(Default)]
pub struct StateBroadcaster {
    sessions: BTreeMap<ObserverId, ObserverSession>,
    /// Facets of the most recently published graph.
    active: Option<Vec<RenderedFacet>>,
}

impl StateBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. If a graph has been published, the new observer gets
    /// all of it straight away.
    pub fn register(&mut self, id: ObserverId, outbound: ObserverSender) {
        let mut session = ObserverSession::new(outbound);
        let alive = match &self.active {
            Some(facets) => session.sync(facets, true).is_some(),
            None => true,
        };
        if !alive {
            ObserverGone { observer_id: id }.log();
            return;
        }
        self.sessions.insert(id, session);
        ObserverRegistered {
            observer_id: id,
            observer_count: self.sessions.len(),
        }
        .log();
    }

    pub fn unregister(&mut self, id: ObserverId) {
        if self.sessions.remove(&id).is_some() {
            ObserverUnregistered {
                observer_id: id,
                observer_count: self.sessions.len(),
            }
            .log();
        }
    }

    pub fn observer_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_active_graph(&self) -> bool {
        self.active.is_some()
    }

    /// Push `graph` to every observer. Without `force`, facets an observer
    /// already holds are skipped. Returns the number of messages sent.
    pub fn publish(&mut self, graph: &DeploymentGraph, force: bool) -> usize {
        let facets = match render(graph) {
            Ok(facets) => facets,
            Err((facet, e)) => {
                FacetRenderFailed {
                    facet: &format!("{:?}", facet),
                    error: &e,
                }
                .log();
                return 0;
            }
        };

        let mut messages = 0;
        let mut gone = Vec::new();
        for (&id, session) in self.sessions.iter_mut() {
            match session.sync(&facets, force) {
                Some(sent) => messages += sent,
                None => gone.push(id),
            }
        }
        self.drop_sessions(gone);

        GraphPublished {
            application: &graph.application,
            forced: force,
            observers: self.sessions.len(),
            messages,
        }
        .log();
        self.active = Some(facets);
        messages
    }

    /// Send `data` under `name` to every observer, bypassing de-duplication.
    pub fn broadcast_event(&mut self, name: EventName, data: Value) {
        self.broadcast(ServerEvent::new(name, data));
    }

    /// Send a payload-free notification such as `started` or `stopped`.
    pub fn broadcast_notice(&mut self, name: EventName) {
        self.broadcast(ServerEvent::notice(name));
    }

    pub fn broadcast_error(&mut self, message: &str) {
        ErrorBroadcast {
            message,
            observers: self.sessions.len(),
        }
        .log();
        self.broadcast(ServerEvent::error(message));
    }

    /// Send one event to one observer. Unknown ids are ignored.
    pub fn send_to(&mut self, id: ObserverId, event: ServerEvent) {
        let delivered = match self.sessions.get(&id) {
            Some(session) => session.outbound.send(event).is_ok(),
            None => return,
        };
        if !delivered {
            self.drop_sessions(vec![id]);
        }
    }

    pub fn send_error(&mut self, id: ObserverId, message: &str) {
        tracing::warn!(observer_id = id, error_message = message, "Reporting error to observer");
        self.send_to(id, ServerEvent::error(message));
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let gone: Vec<ObserverId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.outbound.send(event.clone()).is_err())
            .map(|(&id, _)| id)
            .collect();
        self.drop_sessions(gone);
    }

    fn drop_sessions(&mut self, ids: Vec<ObserverId>) {
        for id in ids {
            ObserverGone { observer_id: id }.log();
            self.sessions.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{parse_deployment, RuntimeStatus};
    use serde_json::json;

    fn graph() -> DeploymentGraph {
        let description = json!({
            "application_name": "webserver",
            "global_ctl_ip": "10.0.0.1",
            "MSU_types": [
                { "id": 1, "name": "read", "meta_routing": { "dst_types": [2] } },
                { "id": 2, "name": "write" }
            ],
            "runtimes": [
                { "id": 1, "ip": "10.0.0.2",
                  "routes": [ { "id": 100, "endpoints": [ { "msu": 20 } ] } ] }
            ],
            "MSUs": [
                { "id": 10, "type": 1, "scheduling": { "runtime": 1, "routes": [100] } },
                { "id": 20, "type": 2, "scheduling": { "runtime": 1 } }
            ]
        });
        parse_deployment(description.to_string().as_bytes()).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_first_publish_sends_every_facet() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);

        assert_eq!(broadcaster.publish(&graph(), false), 5);
        let names: Vec<EventName> = drain(&mut rx).into_iter().map(|e| e.event).collect();
        assert_eq!(
            names,
            vec![
                EventName::Application,
                EventName::MsuTypes,
                EventName::Runtimes,
                EventName::Msus,
                EventName::Links,
            ]
        );
    }

    #[test]
    fn test_identical_publish_sends_nothing() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);
        let graph = graph();

        broadcaster.publish(&graph, false);
        drain(&mut rx);

        assert_eq!(broadcaster.publish(&graph, false), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_forced_publish_sends_all_facets_again() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);
        let graph = graph();

        broadcaster.publish(&graph, false);
        drain(&mut rx);

        assert_eq!(broadcaster.publish(&graph, true), 5);
        assert_eq!(drain(&mut rx).len(), 5);
    }

    #[test]
    fn test_only_changed_facet_is_sent() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);
        let mut graph = graph();
        broadcaster.publish(&graph, false);
        drain(&mut rx);

        graph.runtimes[0].status = RuntimeStatus::Connected;
        assert_eq!(broadcaster.publish(&graph, false), 1);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, EventName::Runtimes);
        assert_eq!(events[0].data[0]["status"], json!("Connected"));
    }

    #[test]
    fn test_late_observer_gets_forced_copy() {
        let mut broadcaster = StateBroadcaster::new();
        let (early_tx, mut early_rx) = mpsc::unbounded_channel();
        broadcaster.register(1, early_tx);
        broadcaster.publish(&graph(), false);
        drain(&mut early_rx);

        let (late_tx, mut late_rx) = mpsc::unbounded_channel();
        broadcaster.register(2, late_tx);
        assert_eq!(drain(&mut late_rx).len(), 5);
        assert!(drain(&mut early_rx).is_empty());

        // Already in sync: a repeat publish reaches nobody.
        assert_eq!(broadcaster.publish(&graph(), false), 0);
    }

    #[test]
    fn test_observer_without_graph_receives_nothing_on_register() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);
        assert!(drain(&mut rx).is_empty());
        assert!(!broadcaster.has_active_graph());
    }

    #[test]
    fn test_events_and_errors_bypass_dedup() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);

        broadcaster.broadcast_notice(EventName::Started);
        broadcaster.broadcast_notice(EventName::Started);
        broadcaster.broadcast_event(EventName::ErrorMsg, json!("Connected to running instance"));
        broadcaster.broadcast_error("Controller shut down");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert_eq!(events[1], ServerEvent::new(EventName::Started, json!("")));
        assert_eq!(events[2].data, json!("Connected to running instance"));
        assert_eq!(events[3], ServerEvent::error("Controller shut down"));
    }

    #[test]
    fn test_disconnected_observer_is_dropped() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster.register(1, tx);
        drop(rx);

        broadcaster.broadcast_error("anyone there?");
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[test]
    fn test_unregister_drops_session() {
        let mut broadcaster = StateBroadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(7, tx);
        broadcaster.unregister(7);

        broadcaster.publish(&graph(), true);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[test]
    fn test_send_to_reaches_only_one_observer() {
        let mut broadcaster = StateBroadcaster::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        broadcaster.register(1, a_tx);
        broadcaster.register(2, b_tx);

        broadcaster.send_error(2, "bad file");
        assert!(drain(&mut a_rx).is_empty());
        assert_eq!(drain(&mut b_rx), vec![ServerEvent::error("bad file")]);
    }
}
