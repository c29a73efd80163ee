// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::{ObserverId, ObserverRequest, ObserverSender};
use crate::controller::LinkHandler;
use crate::errors::{LinkError, SupervisorError};
use crate::graph::{DeploymentGraph, RuntimeId, UnitId};
use crate::supervisor::StartOutcome;

/// Identifies one selected deployment. Results of work started for an older
/// deployment carry its epoch and are dropped on arrival.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Clone,
    Unclone,
}

impl ScaleAction {
    pub fn verb(self) -> &'static str {
        match self {
            ScaleAction::Clone => "clone",
            ScaleAction::Unclone => "unclone",
        }
    }

    /// Controller command text for `unit`.
    pub fn command(self, unit: UnitId) -> String {
        format!("{} {}", self.verb(), unit)
    }
}

impl Display for ScaleAction {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

/// Everything the orchestrator reacts to, processed one at a time.
#[derive(Debug)]
pub enum Event {
    ObserverConnected {
        observer: ObserverId,
        outbound: ObserverSender,
    },
    ObserverDisconnected {
        observer: ObserverId,
    },
    Request {
        observer: ObserverId,
        request: ObserverRequest,
    },

    // Controller link callbacks.
    Snapshot {
        epoch: Epoch,
        graph: Box<DeploymentGraph>,
    },
    LinkFailed {
        epoch: Epoch,
        error: LinkError,
    },
    LinkClosed {
        epoch: Epoch,
    },

    // Completions of work run off the event loop.
    FileBroadcastDone {
        epoch: Epoch,
        requester: ObserverId,
        result: Result<(), SupervisorError>,
    },
    AttachCheck {
        epoch: Epoch,
    },
    AttachDone {
        epoch: Epoch,
        result: Result<(), LinkError>,
    },
    ControllerLaunched {
        epoch: Epoch,
        requester: ObserverId,
        result: Result<StartOutcome, SupervisorError>,
    },
    StartGraceElapsed {
        epoch: Epoch,
        requester: ObserverId,
    },
    StartConnectDone {
        epoch: Epoch,
        requester: ObserverId,
        result: Result<(), LinkError>,
    },
    ControllerExited {
        epoch: Epoch,
        exit_code: i32,
    },
    RuntimeLaunched {
        epoch: Epoch,
        runtime: RuntimeId,
        result: Result<StartOutcome, SupervisorError>,
    },
    RuntimeExited {
        epoch: Epoch,
        runtime: RuntimeId,
        exit_code: i32,
    },
    ScaleDone {
        requester: ObserverId,
        action: ScaleAction,
        unit: UnitId,
        result: Result<(), LinkError>,
    },
}

impl Event {
    /// Epoch of events produced for a specific deployment.
    pub fn epoch(&self) -> Option<Epoch> {
        match self {
            Event::Snapshot { epoch, .. }
            | Event::LinkFailed { epoch, .. }
            | Event::LinkClosed { epoch }
            | Event::FileBroadcastDone { epoch, .. }
            | Event::AttachCheck { epoch }
            | Event::AttachDone { epoch, .. }
            | Event::ControllerLaunched { epoch, .. }
            | Event::StartGraceElapsed { epoch, .. }
            | Event::StartConnectDone { epoch, .. }
            | Event::ControllerExited { epoch, .. }
            | Event::RuntimeLaunched { epoch, .. }
            | Event::RuntimeExited { epoch, .. } => Some(*epoch),
            Event::ObserverConnected { .. }
            | Event::ObserverDisconnected { .. }
            | Event::Request { .. }
            | Event::ScaleDone { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::ObserverConnected { .. } => "observer_connected",
            Event::ObserverDisconnected { .. } => "observer_disconnected",
            Event::Request { .. } => "request",
            Event::Snapshot { .. } => "snapshot",
            Event::LinkFailed { .. } => "link_failed",
            Event::LinkClosed { .. } => "link_closed",
            Event::FileBroadcastDone { .. } => "file_broadcast",
            Event::AttachCheck { .. } => "attach_check",
            Event::AttachDone { .. } => "attach",
            Event::ControllerLaunched { .. } => "controller_launched",
            Event::StartGraceElapsed { .. } => "start_grace",
            Event::StartConnectDone { .. } => "start_connect",
            Event::ControllerExited { .. } => "controller_exited",
            Event::RuntimeLaunched { .. } => "runtime_launched",
            Event::RuntimeExited { .. } => "runtime_exited",
            Event::ScaleDone { .. } => "scale",
        }
    }
}

/// Turns controller link callbacks into events for one deployment.
pub(crate) struct LinkEvents {
    pub epoch: Epoch,
    pub events: mpsc::UnboundedSender<Event>,
}

impl LinkEvents {
    pub fn new(epoch: Epoch, events: mpsc::UnboundedSender<Event>) -> Arc<Self> {
        Arc::new(Self { epoch, events })
    }
}

impl LinkHandler for LinkEvents {
    fn on_snapshot(&self, graph: DeploymentGraph) {
        let _ = self.events.send(Event::Snapshot {
            epoch: self.epoch,
            graph: Box::new(graph),
        });
    }

    fn on_error(&self, error: LinkError) {
        let _ = self.events.send(Event::LinkFailed {
            epoch: self.epoch,
            error,
        });
    }

    fn on_close(&self) {
        let _ = self.events.send(Event::LinkClosed { epoch: self.epoch });
    }
}
