// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod broadcast;     // observer sessions and fan-out
pub mod config;        // service configuration
pub mod controller;    // controller stream + command channel
pub mod errors;        // error handling
pub mod graph;         // deployment graph normalization
pub mod observability;
pub mod orchestrator;  // cluster workflows
pub mod server;        // observer WebSocket server
pub mod supervisor;    // remote targets and processes
pub mod traits;        // remote shell abstraction
