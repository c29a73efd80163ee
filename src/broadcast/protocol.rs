// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observer wire protocol.
//!
//! Both directions carry JSON objects of the form
//! `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::UnitId;

/// Names of server → observer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    DfgFiles,
    Application,
    Runtimes,
    MsuTypes,
    Msus,
    Links,
    Started,
    Stopped,
    ErrorMsg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: EventName,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: EventName, data: Value) -> Self {
        Self { event, data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventName::ErrorMsg, Value::String(message.into()))
    }

    /// A notification without payload (`started`, `stopped`).
    pub fn notice(event: EventName) -> Self {
        Self::new(event, Value::String(String::new()))
    }
}

/// Observer → server requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ObserverRequest {
    GetDfgs,
    SelectedDfg(String),
    Start,
    Stop,
    Reset,
    #[serde(rename = "clone")]
    CloneUnit(UnitId),
    #[serde(rename = "unclone")]
    UncloneUnit(UnitId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_event_wire_shape() {
        let event = ServerEvent::new(EventName::MsuTypes, json!([{"id": 1}]));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "msu_types", "data": [{"id": 1}]})
        );
        assert_eq!(
            serde_json::to_value(ServerEvent::error("boom")).unwrap(),
            json!({"event": "error_msg", "data": "boom"})
        );
    }

    #[test]
    fn test_parse_requests() {
        let cases = [
            (r#"{"event": "get_dfgs"}"#, ObserverRequest::GetDfgs),
            (
                r#"{"event": "selected_dfg", "data": "web.json"}"#,
                ObserverRequest::SelectedDfg("web.json".to_string()),
            ),
            (r#"{"event": "start"}"#, ObserverRequest::Start),
            (r#"{"event": "reset"}"#, ObserverRequest::Reset),
            (r#"{"event": "clone", "data": 12}"#, ObserverRequest::CloneUnit(UnitId(12))),
            (r#"{"event": "unclone", "data": 7}"#, ObserverRequest::UncloneUnit(UnitId(7))),
        ];

        for (text, expected) in cases {
            let parsed: ObserverRequest = serde_json::from_str(text).unwrap();
            assert_eq!(parsed, expected, "{}", text);
        }
    }

    #[test]
    fn test_unknown_request_is_rejected() {
        assert!(serde_json::from_str::<ObserverRequest>(r#"{"event": "launch_missiles"}"#).is_err());
    }
}
