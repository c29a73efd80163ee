// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Connection to the cluster controller.
//!
//! The controller streams its view of the running deployment as a sequence
//! of unframed JSON documents and accepts scale commands on a second
//! socket. [`ControllerLink`] owns both sockets; [`StreamDecoder`] turns the
//! byte stream back into [`DeploymentGraph`](crate::graph::DeploymentGraph)
//! snapshots.

mod decoder;
mod link;

pub use decoder::StreamDecoder;
pub use link::{ControllerLink, LinkHandler, LinkState};
