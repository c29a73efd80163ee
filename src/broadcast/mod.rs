// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer fan-out.
//!
//! A deployment graph is split into five facets (application, type order,
//! runtimes, units, links). [`StateBroadcaster`] remembers, per observer,
//! the text of every facet it last sent and only sends what changed.

mod broadcaster;
mod facets;
pub mod protocol;

pub use broadcaster::{ObserverId, ObserverSender, StateBroadcaster};
pub use facets::{render, Facet, RenderedFacet};
pub use protocol::{EventName, ObserverRequest, ServerEvent};
