// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::{json, Value};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::broadcast::{EventName, ObserverId, ObserverRequest, ObserverSender, ServerEvent, StateBroadcaster};
use crate::config::consts::CONTROLLER_TARGET_ID;
use crate::config::ServiceConfig;
use crate::controller::ControllerLink;
use crate::errors::{ControlPlaneError, GraphError, LinkError, SupervisorError};
use crate::graph::{parse_deployment, DeploymentGraph, RuntimeId, UnitId};
use crate::observability::messages::orchestrator::{
    ClusterAction, ControllerAttached, DeploymentRejected, DeploymentSelected, RuntimeStopped,
    StaleEventIgnored,
};
use crate::observability::messages::StructuredLog;
use crate::orchestrator::events::{Epoch, Event, LinkEvents, ScaleAction};
use crate::supervisor::{ProcessSupervisor, StartOutcome};
use crate::traits::RemoteShell;

const CONTROLLER_SHUT_DOWN: &str = "Controller shut down";
const ATTACHED_TO_RUNNING: &str = "Connected to running instance";

/// Cloneable entry point into a running [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorHandle {
    events: mpsc::UnboundedSender<Event>,
    next_observer: Arc<AtomicU64>,
}

impl OrchestratorHandle {
    /// Register a new observer whose events go to `outbound`.
    pub fn connect_observer(&self, outbound: ObserverSender) -> ObserverId {
        let observer = self.next_observer.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(Event::ObserverConnected { observer, outbound });
        observer
    }

    pub fn disconnect_observer(&self, observer: ObserverId) {
        let _ = self.events.send(Event::ObserverDisconnected { observer });
    }

    /// Queue a request. Returns false once the orchestrator has stopped.
    pub fn request(&self, observer: ObserverId, request: ObserverRequest) -> bool {
        self.events.send(Event::Request { observer, request }).is_ok()
    }
}

struct ActiveDeployment {
    file_name: String,
    graph: DeploymentGraph,
}

/// Owns the current deployment, the remote target registry, the controller
/// link and the observer sessions, and runs every workflow against them.
///
/// All state changes happen on the task running [`Orchestrator::run`], one
/// event at a time. Remote work runs on spawned tasks which report back by
/// posting an [`Event`]; results that belong to a deployment which has since
/// been replaced are dropped.
pub struct Orchestrator {
    config: ServiceConfig,
    supervisor: ProcessSupervisor,
    link: ControllerLink,
    broadcaster: StateBroadcaster,
    deployment: Option<ActiveDeployment>,
    epoch: Epoch,
    events: mpsc::UnboundedSender<Event>,
    inbox: mpsc::UnboundedReceiver<Event>,
}

impl Orchestrator {
    pub fn new(config: ServiceConfig, shell: Arc<dyn RemoteShell>) -> (Self, OrchestratorHandle) {
        let (events, inbox) = mpsc::unbounded_channel();
        let handle = OrchestratorHandle {
            events: events.clone(),
            next_observer: Arc::new(AtomicU64::new(1)),
        };
        let orchestrator = Self {
            link: ControllerLink::new(&config.cluster, &config.link),
            supervisor: ProcessSupervisor::new(shell),
            broadcaster: StateBroadcaster::new(),
            deployment: None,
            epoch: 0,
            config,
            events,
            inbox,
        };
        (orchestrator, handle)
    }

    /// Process events until `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(dfg_dir = %self.config.local_dfg_dir.display(), "Orchestrator running");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.inbox.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        self.link.close_connection();
        tracing::info!("Orchestrator stopped");
    }

    async fn handle(&mut self, event: Event) {
        if let Some(epoch) = event.epoch() {
            if epoch != self.epoch {
                StaleEventIgnored {
                    kind: event.kind(),
                    epoch,
                    current: self.epoch,
                }
                .log();
                return;
            }
        }

        match event {
            Event::ObserverConnected { observer, outbound } => {
                self.broadcaster.register(observer, outbound)
            }
            Event::ObserverDisconnected { observer } => self.broadcaster.unregister(observer),
            Event::Request { observer, request } => self.handle_request(observer, request).await,

            Event::Snapshot { graph, .. } => self.on_snapshot(*graph),
            Event::LinkFailed { error, .. } => self.broadcaster.broadcast_error(&error.to_string()),
            Event::LinkClosed { .. } => {
                self.broadcaster.broadcast_error(CONTROLLER_SHUT_DOWN);
                self.broadcaster.broadcast_notice(EventName::Stopped);
            }

            Event::FileBroadcastDone {
                requester, result, ..
            } => self.on_file_broadcast(requester, result),
            Event::AttachCheck { .. } => self.on_attach_check(),
            Event::AttachDone { result, .. } => self.on_attach(result),
            Event::ControllerLaunched {
                requester, result, ..
            } => self.on_controller_launched(requester, result),
            Event::StartGraceElapsed { requester, .. } => self.on_start_grace(requester),
            Event::StartConnectDone {
                requester, result, ..
            } => self.on_start_connect(requester, result),
            Event::ControllerExited { exit_code, .. } => {
                tracing::info!(exit_code, "Controller exited");
                self.broadcaster.broadcast_notice(EventName::Stopped);
            }
            Event::RuntimeLaunched {
                runtime, result, ..
            } => {
                if let Err(e) = result {
                    self.broadcaster
                        .broadcast_error(&format!("Error starting runtime {}: {}", runtime, e));
                }
            }
            Event::RuntimeExited {
                runtime, exit_code, ..
            } => {
                let runtime_id = runtime.to_string();
                RuntimeStopped {
                    runtime_id: &runtime_id,
                    exit_code,
                }
                .log();
                self.broadcaster
                    .broadcast_error(&format!("Runtime {} has stopped", runtime));
            }
            Event::ScaleDone {
                requester,
                action,
                unit,
                result,
            } => self.on_scale(requester, action, unit, result),
        }
    }

    async fn handle_request(&mut self, observer: ObserverId, request: ObserverRequest) {
        match request {
            ObserverRequest::GetDfgs => self.list_deployments(observer).await,
            ObserverRequest::SelectedDfg(file_name) => self.select_deployment(observer, file_name).await,
            ObserverRequest::Start => self.start_cluster(observer),
            ObserverRequest::Stop | ObserverRequest::Reset => self.stop_cluster(observer),
            ObserverRequest::CloneUnit(unit) => self.scale_unit(observer, ScaleAction::Clone, unit),
            ObserverRequest::UncloneUnit(unit) => self.scale_unit(observer, ScaleAction::Unclone, unit),
        }
    }

    /// Run `work` on its own task and post `done(output)` back to the loop.
    fn spawn_then<W, T, D>(&self, work: W, done: D)
    where
        W: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        D: FnOnce(T) -> Event + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(
            async move {
                let output = work.await;
                let _ = events.send(done(output));
            }
            .in_current_span(),
        );
    }

    /// Post `event` after `delay`.
    fn post_after(&self, delay: Duration, event: Event) {
        self.spawn_then(tokio::time::sleep(delay), move |()| event);
    }

    fn report(&mut self, observer: ObserverId, error: &ControlPlaneError) {
        self.broadcaster.send_error(observer, &error.to_string());
    }

    async fn list_deployments(&mut self, observer: ObserverId) {
        match read_deployment_names(&self.config.local_dfg_dir).await {
            Ok(files) => self
                .broadcaster
                .send_to(observer, ServerEvent::new(EventName::DfgFiles, json!(files))),
            Err(e) => {
                tracing::error!(
                    dfg_dir = %self.config.local_dfg_dir.display(),
                    error = %e,
                    "Could not list deployment files"
                );
                self.broadcaster
                    .send_error(observer, "Error finding DFGs. Check config.");
            }
        }
    }

    fn deployment_path(&self, file_name: &str) -> Option<PathBuf> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.config.local_dfg_dir.join(file_name)),
            _ => None,
        }
    }

    /// SelectDeployment: read, normalize, then swap in the new deployment.
    async fn select_deployment(&mut self, requester: ObserverId, file_name: String) {
        let Some(path) = self.deployment_path(&file_name) else {
            self.broadcaster
                .send_error(requester, &format!("Invalid deployment file name '{}'", file_name));
            return;
        };

        let graph = match tokio::fs::read(&path).await {
            Ok(bytes) => parse_deployment(&bytes).map_err(ControlPlaneError::from),
            Err(e) => Err(ControlPlaneError::MalformedGraph(GraphError::Read(e.to_string()))),
        };
        let graph = match graph {
            Ok(graph) => graph,
            Err(e) => {
                DeploymentRejected {
                    file_name: &file_name,
                    error: &e,
                }
                .log();
                self.report(requester, &e);
                return;
            }
        };

        let selected = DeploymentSelected {
            file_name: &file_name,
            application: &graph.application,
            runtime_count: graph.runtimes.len(),
            unit_count: graph.units.len(),
            replaced: self.deployment.as_ref().map(|d| d.graph.application.as_str()),
        };
        selected.log();
        let span = selected.span("select_deployment");
        let _entered = span.enter();

        self.epoch += 1;
        self.broadcaster.publish(&graph, true);

        self.supervisor.clear();
        self.supervisor
            .register(CONTROLLER_TARGET_ID, graph.controller_address.clone());
        for runtime in &graph.runtimes {
            self.supervisor
                .register(runtime.id.to_string(), runtime.address.clone());
        }

        let remote_path = self.config.cluster.remote_dfg_path(&file_name);
        self.deployment = Some(ActiveDeployment { file_name, graph });
        self.arm_link();

        let epoch = self.epoch;
        self.spawn_then(
            self.supervisor.broadcast_file(path, &remote_path),
            move |result| Event::FileBroadcastDone {
                epoch,
                requester,
                result,
            },
        );
    }

    /// (Re)initialize the controller link for the active deployment.
    fn arm_link(&mut self) {
        if let Some(deployment) = &self.deployment {
            let handler = LinkEvents::new(self.epoch, self.events.clone());
            self.link
                .initialize(&deployment.graph.controller_address, handler);
        }
    }

    fn on_file_broadcast(&mut self, requester: ObserverId, result: Result<(), SupervisorError>) {
        match result {
            Ok(()) => self.post_after(
                self.config.link.attach_grace(),
                Event::AttachCheck { epoch: self.epoch },
            ),
            Err(e) => self
                .broadcaster
                .send_error(requester, &format!("Error broadcasting DFG: {}", e)),
        }
    }

    /// Try once to attach to a controller that is already running.
    fn on_attach_check(&mut self) {
        if self.link.is_connected() || !self.link.is_initialized() {
            return;
        }
        let epoch = self.epoch;
        self.spawn_then(self.link.connect(), move |result| Event::AttachDone { epoch, result });
    }

    fn on_attach(&mut self, result: Result<(), LinkError>) {
        match result {
            Ok(()) => {
                if let Some(deployment) = &self.deployment {
                    ControllerAttached {
                        application: &deployment.graph.application,
                    }
                    .log();
                }
                self.broadcaster.broadcast_event(
                    EventName::ErrorMsg,
                    Value::String(ATTACHED_TO_RUNNING.to_string()),
                );
                self.broadcaster.broadcast_notice(EventName::Started);
            }
            Err(e) => tracing::debug!(error = %e, "No running controller to attach to"),
        }
    }

    /// StartCluster: launch the controller, then check the link after the
    /// grace interval.
    fn start_cluster(&mut self, requester: ObserverId) {
        let Some(deployment) = &self.deployment else {
            self.report(requester, &ControlPlaneError::NoDeployment);
            return;
        };
        ClusterAction {
            action: "STARTING CLUSTER",
            observer_id: requester,
        }
        .log();

        let command = self.config.cluster.controller_command(&deployment.file_name);
        let epoch = self.epoch;
        let events = self.events.clone();
        let launch = self
            .supervisor
            .start(CONTROLLER_TARGET_ID, &command, move |exit_code| {
                let _ = events.send(Event::ControllerExited { epoch, exit_code });
            });
        self.spawn_then(launch, move |result| Event::ControllerLaunched {
            epoch,
            requester,
            result,
        });
    }

    fn on_controller_launched(&mut self, requester: ObserverId, result: Result<StartOutcome, SupervisorError>) {
        match result {
            Ok(outcome) => {
                tracing::debug!(?outcome, "Controller launch resolved");
                self.post_after(
                    self.config.link.start_grace(),
                    Event::StartGraceElapsed {
                        epoch: self.epoch,
                        requester,
                    },
                );
            }
            Err(e) => self
                .broadcaster
                .send_error(requester, &format!("Error starting controller: {}", e)),
        }
    }

    fn on_start_grace(&mut self, requester: ObserverId) {
        if self.link.is_connected() {
            self.broadcaster.broadcast_notice(EventName::Started);
            return;
        }
        if !self.link.is_initialized() {
            self.arm_link();
        }
        let epoch = self.epoch;
        self.spawn_then(self.link.connect(), move |result| Event::StartConnectDone {
            epoch,
            requester,
            result,
        });
    }

    fn on_start_connect(&mut self, requester: ObserverId, result: Result<(), LinkError>) {
        match result {
            Ok(()) => self.broadcaster.broadcast_notice(EventName::Started),
            Err(e) => {
                tracing::error!(error = %e, "No connection from controller");
                self.broadcaster
                    .send_error(requester, "Could not connect to controller");
                self.broadcaster.broadcast_notice(EventName::Stopped);
            }
        }
    }

    /// StopCluster: kill the controller and let its stream report the rest.
    fn stop_cluster(&mut self, requester: ObserverId) {
        if self.deployment.is_none() {
            self.report(requester, &ControlPlaneError::NoDeployment);
            return;
        }
        ClusterAction {
            action: "STOPPING CLUSTER",
            observer_id: requester,
        }
        .log();
        tokio::spawn(
            self.supervisor
                .kill(CONTROLLER_TARGET_ID, &self.config.cluster.controller_exec),
        );
    }

    /// ScaleUnit: forward a clone/unclone to the controller.
    fn scale_unit(&mut self, requester: ObserverId, action: ScaleAction, unit: UnitId) {
        if !self.link.is_connected() {
            let reason = ControlPlaneError::ControllerUnavailable;
            self.broadcaster
                .send_error(requester, &format!("Cannot {} unit {}: {}", action, unit, reason));
            return;
        }
        tracing::info!(%action, %unit, observer_id = requester, "Scaling unit");
        self.spawn_then(
            self.link.send_command(&action.command(unit)),
            move |result| Event::ScaleDone {
                requester,
                action,
                unit,
                result,
            },
        );
    }

    fn on_scale(&mut self, requester: ObserverId, action: ScaleAction, unit: UnitId, result: Result<(), LinkError>) {
        match result {
            Ok(()) => tracing::info!(%action, %unit, "Scale command delivered"),
            Err(e) => {
                let error = ControlPlaneError::from(e);
                self.broadcaster
                    .send_error(requester, &format!("Failed to {} unit {}: {}", action, unit, error));
            }
        }
    }

    /// A live snapshot from the controller: skip if nothing changed,
    /// otherwise start idle runtimes and republish.
    fn on_snapshot(&mut self, graph: DeploymentGraph) {
        let Some(deployment) = &self.deployment else {
            return;
        };
        if deployment.graph == graph {
            return;
        }
        self.start_idle_runtimes(&graph);
        self.broadcaster.publish(&graph, true);
        if let Some(deployment) = self.deployment.as_mut() {
            deployment.graph = graph;
        }
    }

    /// Start every runtime the snapshot does not report as connected.
    /// Runtimes the controller added since selection are registered first.
    fn start_idle_runtimes(&mut self, graph: &DeploymentGraph) {
        let Some(file_name) = self.deployment.as_ref().map(|d| d.file_name.clone()) else {
            return;
        };
        let epoch = self.epoch;

        for runtime in graph.idle_runtimes() {
            let target_id = runtime.id.to_string();
            if !self.supervisor.contains(&target_id) {
                self.supervisor.register(target_id.clone(), runtime.address.clone());
            }
            let command = self.config.cluster.runtime_command(&file_name, runtime.id);
            let runtime_id: RuntimeId = runtime.id;
            let events = self.events.clone();
            let launch = self.supervisor.start(&target_id, &command, move |exit_code| {
                let _ = events.send(Event::RuntimeExited {
                    epoch,
                    runtime: runtime_id,
                    exit_code,
                });
            });
            self.spawn_then(launch, move |result| Event::RuntimeLaunched {
                epoch,
                runtime: runtime_id,
                result,
            });
        }
    }
}

/// Names of `*.json` files in `dir`, sorted.
async fn read_deployment_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
