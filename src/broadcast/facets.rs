// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::broadcast::protocol::{EventName, ServerEvent};
use crate::graph::DeploymentGraph;

/// The parts of a deployment graph pushed to observers, each as its own
/// event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facet {
    Application,
    MsuTypes,
    Runtimes,
    Msus,
    Links,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::Application,
        Facet::MsuTypes,
        Facet::Runtimes,
        Facet::Msus,
        Facet::Links,
    ];

    pub fn event(self) -> EventName {
        match self {
            Facet::Application => EventName::Application,
            Facet::MsuTypes => EventName::MsuTypes,
            Facet::Runtimes => EventName::Runtimes,
            Facet::Msus => EventName::Msus,
            Facet::Links => EventName::Links,
        }
    }

    fn value(self, graph: &DeploymentGraph) -> Result<Value, serde_json::Error> {
        match self {
            Facet::Application => Ok(Value::String(graph.application.clone())),
            Facet::MsuTypes => serde_json::to_value(&graph.type_order),
            Facet::Runtimes => serde_json::to_value(&graph.runtimes),
            Facet::Msus => serde_json::to_value(&graph.units),
            Facet::Links => serde_json::to_value(&graph.links),
        }
    }
}

/// One facet, serialized once and compared by its text.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFacet {
    pub facet: Facet,
    pub value: Value,
    pub text: String,
}

impl RenderedFacet {
    pub fn event(&self) -> ServerEvent {
        ServerEvent::new(self.facet.event(), self.value.clone())
    }
}

/// Serialize every facet of `graph`, in [`Facet::ALL`] order.
pub fn render(graph: &DeploymentGraph) -> Result<Vec<RenderedFacet>, (Facet, serde_json::Error)> {
    Facet::ALL
        .iter()
        .map(|&facet| {
            let value = facet.value(graph).map_err(|e| (facet, e))?;
            Ok(RenderedFacet {
                facet,
                text: value.to_string(),
                value,
            })
        })
        .collect()
}
