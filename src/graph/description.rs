// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire shape of a deployment description.
//!
//! The same document is read from the local deployment directory and streamed
//! back by the controller as live snapshots, so everything the controller may
//! omit is defaulted. Unknown fields are ignored.
//!
//! # Example
//! ```json
//! {
//!   "application_name": "webserver",
//!   "global_ctl_ip": "10.0.0.1",
//!   "MSU_types": [
//!     { "id": 1, "name": "read", "meta_routing": { "dst_types": [2] } },
//!     { "id": 2, "name": "write", "meta_routing": {} }
//!   ],
//!   "runtimes": [
//!     { "id": 1, "ip": "10.0.0.2", "num_pinned_threads": 2, "num_unpinned_threads": 1,
//!       "routes": [ { "id": 100, "endpoints": [ { "msu": 20 } ] } ] }
//!   ],
//!   "MSUs": [
//!     { "id": 10, "type": 1, "scheduling": { "runtime": 1, "thread_id": 1, "routes": [100] } },
//!     { "id": 20, "type": 2, "scheduling": { "runtime": 1, "thread_id": 2 } }
//!   ]
//! }
//! ```

use serde::Deserialize;

use crate::errors::GraphError;
use crate::graph::{RouteId, RuntimeId, TypeId, UnitId};

#[derive(Debug, Clone, Deserialize)]
pub struct RawDeployment {
    pub application_name: String,
    pub global_ctl_ip: String,
    #[serde(rename = "MSU_types")]
    pub msu_types: Vec<RawType>,
    pub runtimes: Vec<RawRuntime>,
    #[serde(rename = "MSUs")]
    pub msus: Vec<RawUnit>,
}

impl RawDeployment {
    /// Parse a description from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(GraphError::Empty);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawType {
    pub id: TypeId,
    pub name: String,
    #[serde(default)]
    pub meta_routing: RawMetaRouting,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetaRouting {
    #[serde(default)]
    pub dst_types: Vec<TypeId>,
}

/// A runtime entry. The file uses `num_*_threads`; the controller's snapshots
/// use `n_*_threads`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRuntime {
    pub id: RuntimeId,
    pub ip: String,
    #[serde(default, alias = "num_pinned_threads")]
    pub n_pinned_threads: u32,
    #[serde(default, alias = "num_unpinned_threads")]
    pub n_unpinned_threads: u32,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub routes: Vec<RawRoute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRoute {
    pub id: RouteId,
    #[serde(default)]
    pub endpoints: Vec<RawEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEndpoint {
    pub msu: UnitId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUnit {
    pub id: UnitId,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    pub scheduling: RawScheduling,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScheduling {
    pub runtime: RuntimeId,
    #[serde(default)]
    pub thread_id: u32,
    #[serde(default)]
    pub routes: Vec<RouteId>,
}
