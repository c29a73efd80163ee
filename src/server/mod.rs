// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer-facing WebSocket server.

mod websocket;

pub use websocket::ObserverServer;
