// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for deployment graph normalization.
//!
//! Every variant is a flavour of "malformed graph": the description could not
//! be parsed, or it parsed but its references do not line up. Normalization
//! never partially applies, so a caller holding a previously accepted graph
//! keeps it untouched when one of these is returned.

use crate::graph::{RouteId, RuntimeId, TypeId, UnitId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The description contained no bytes (or only whitespace).
    #[error("deployment description is empty")]
    Empty,

    /// The description file could not be read.
    #[error("deployment description could not be read: {0}")]
    Read(String),

    /// The description is not a structurally valid document.
    #[error("deployment description could not be parsed: {0}")]
    Parse(String),

    #[error("deployment description names no controller address")]
    MissingControllerAddress,

    #[error("duplicate type id {0}")]
    DuplicateType(TypeId),

    #[error("duplicate runtime id {0}")]
    DuplicateRuntime(RuntimeId),

    #[error("duplicate unit id {0}")]
    DuplicateUnit(UnitId),

    #[error("duplicate route id {0}")]
    DuplicateRoute(RouteId),

    /// A type declares a successor type that does not exist.
    #[error("type {type_id} routes to undeclared type {missing}")]
    UnknownSuccessorType { type_id: TypeId, missing: TypeId },

    #[error("unit {unit} has undeclared type {type_id}")]
    UnresolvedType { unit: UnitId, type_id: TypeId },

    #[error("unit {unit} is scheduled on undeclared runtime {runtime}")]
    UnresolvedRuntime { unit: UnitId, runtime: RuntimeId },

    /// The sort reported a cycle through `node` but no edge into it remains.
    /// Indicates an internal inconsistency; never expected for parsed input.
    #[error("cycle through type {node} could not be broken: no edge into it remains")]
    CycleUnresolvable { node: TypeId },
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Parse(err.to_string())
    }
}
