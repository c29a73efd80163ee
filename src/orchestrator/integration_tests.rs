// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{EventName, ObserverId, ObserverRequest, ServerEvent};
use crate::config::ServiceConfig;
use crate::graph::UnitId;
use crate::orchestrator::{Orchestrator, OrchestratorHandle};
use crate::supervisor::stub::{ShellCall, StubShell};
use crate::traits::RemoteShell;

const DEPLOYMENT: &str = r#"{
    "application_name": "webserver",
    "global_ctl_ip": "127.0.0.1",
    "MSU_types": [
        { "id": 1, "name": "read", "meta_routing": { "dst_types": [2] } },
        { "id": 2, "name": "write" }
    ],
    "runtimes": [
        { "id": 1, "ip": "10.0.0.1", "num_pinned_threads": 2,
          "routes": [ { "id": 100, "endpoints": [ { "msu": 20 }, { "msu": 30 } ] } ] },
        { "id": 2, "ip": "10.0.0.2", "num_pinned_threads": 2 }
    ],
    "MSUs": [
        { "id": 10, "type": 1, "scheduling": { "runtime": 1, "thread_id": 1, "routes": [100] } },
        { "id": 20, "type": 2, "scheduling": { "runtime": 1, "thread_id": 2 } },
        { "id": 30, "type": 2, "scheduling": { "runtime": 2, "thread_id": 1 } }
    ]
}"#;

const WAIT: Duration = Duration::from_secs(3);

/// Stand-in for the cluster controller's two sockets.
struct FakeController {
    stream: TcpListener,
    command: TcpListener,
}

impl FakeController {
    async fn bind() -> Self {
        Self {
            stream: TcpListener::bind("127.0.0.1:0").await.unwrap(),
            command: TcpListener::bind("127.0.0.1:0").await.unwrap(),
        }
    }

    fn ports(&self) -> (u16, u16) {
        (
            self.stream.local_addr().unwrap().port(),
            self.command.local_addr().unwrap().port(),
        )
    }
}

/// A port nothing listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

struct Harness {
    handle: OrchestratorHandle,
    shell: Arc<StubShell>,
    dfg_dir: TempDir,
    shutdown: CancellationToken,
}

impl Harness {
    fn start(shell: StubShell, ports: (u16, u16), attach_grace_ms: u64) -> Self {
        let dfg_dir = tempfile::tempdir().unwrap();
        std::fs::write(dfg_dir.path().join("webserver.json"), DEPLOYMENT).unwrap();

        let mut config = ServiceConfig::default();
        config.local_dfg_dir = dfg_dir.path().to_path_buf();
        config.cluster.stream_port = ports.0;
        config.cluster.command_port = ports.1;
        config.link.start_grace_ms = 50;
        config.link.attach_grace_ms = attach_grace_ms;
        config.link.connect_timeout_ms = 500;

        let shell = Arc::new(shell);
        let remote: Arc<dyn RemoteShell> = shell.clone();
        let (orchestrator, handle) = Orchestrator::new(config, remote);
        let shutdown = CancellationToken::new();
        tokio::spawn(orchestrator.run(shutdown.clone()));

        Self {
            handle,
            shell,
            dfg_dir,
            shutdown,
        }
    }

    fn observer(&self) -> (ObserverId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.handle.connect_observer(tx), rx)
    }

    fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.dfg_dir.path().join(name), contents).unwrap();
    }

    /// Poll the stub until `check` holds.
    async fn until(&self, check: impl Fn(&StubShell) -> bool) {
        tokio::time::timeout(WAIT, async {
            while !check(self.shell.as_ref()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("no event in time")
        .expect("observer channel closed")
}

/// Skip events until one named `name` arrives.
async fn wait_for(rx: &mut mpsc::UnboundedReceiver<ServerEvent>, name: EventName) -> ServerEvent {
    loop {
        let event = next(rx).await;
        if event.event == name {
            return event;
        }
    }
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(outcome.is_err(), "unexpected event: {:?}", outcome);
}

fn error_text(event: &ServerEvent) -> &str {
    assert_eq!(event.event, EventName::ErrorMsg);
    event.data.as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_get_dfgs_lists_json_files() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    harness.write("another.json", DEPLOYMENT);
    harness.write("notes.txt", "not a deployment");
    let (observer, mut rx) = harness.observer();

    harness.handle.request(observer, ObserverRequest::GetDfgs);

    let event = next(&mut rx).await;
    assert_eq!(event.event, EventName::DfgFiles);
    assert_eq!(event.data, serde_json::json!(["another.json", "webserver.json"]));
}

#[tokio::test]
async fn test_malformed_selection_reports_only_to_requester() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    harness.write("broken.json", "{ \"application_name\": ");
    harness.write("empty.json", "");
    let (requester, mut requester_rx) = harness.observer();
    let (_bystander, mut bystander_rx) = harness.observer();

    harness
        .handle
        .request(requester, ObserverRequest::SelectedDfg("broken.json".to_string()));
    let event = next(&mut requester_rx).await;
    assert!(error_text(&event).starts_with("malformed deployment graph"));

    harness
        .handle
        .request(requester, ObserverRequest::SelectedDfg("empty.json".to_string()));
    let event = next(&mut requester_rx).await;
    assert!(error_text(&event).starts_with("malformed deployment graph"));

    // A file that cannot be read is malformed too.
    harness
        .handle
        .request(requester, ObserverRequest::SelectedDfg("missing.json".to_string()));
    let event = next(&mut requester_rx).await;
    assert!(error_text(&event).starts_with("malformed deployment graph: deployment description could not be read"));

    harness.write("headless.json", &DEPLOYMENT.replace(r#""global_ctl_ip": "127.0.0.1","#, ""));
    harness
        .handle
        .request(requester, ObserverRequest::SelectedDfg("headless.json".to_string()));
    let event = next(&mut requester_rx).await;
    assert!(error_text(&event).starts_with("malformed deployment graph"));

    assert_quiet(&mut bystander_rx).await;
    assert!(harness.shell.calls().is_empty());
}

#[tokio::test]
async fn test_path_like_file_names_are_refused() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();

    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("../etc/passwd".to_string()));
    let event = next(&mut rx).await;
    assert!(error_text(&event).contains("Invalid deployment file name"));
}

#[tokio::test]
async fn test_selection_publishes_and_distributes() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();
    let (_other, mut other_rx) = harness.observer();

    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));

    for rx in [&mut rx, &mut other_rx] {
        let names: Vec<EventName> = [
            next(rx).await,
            next(rx).await,
            next(rx).await,
            next(rx).await,
            next(rx).await,
        ]
        .into_iter()
        .map(|e| e.event)
        .collect();
        assert_eq!(
            names,
            vec![
                EventName::Application,
                EventName::MsuTypes,
                EventName::Runtimes,
                EventName::Msus,
                EventName::Links,
            ]
        );
    }

    harness.until(|shell| shell.copied_to().len() == 3).await;
    let mut copied = harness.shell.copied_to();
    copied.sort();
    assert_eq!(copied, vec!["1".to_string(), "2".to_string(), "ctl".to_string()]);

    let remote = harness.shell.calls().into_iter().find_map(|call| match call {
        ShellCall::Put { remote, .. } => Some(remote),
        _ => None,
    });
    assert!(remote.unwrap().ends_with("/webserver.json"));
}

#[tokio::test]
async fn test_late_observer_receives_active_deployment() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();
    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;

    let (_late, mut late_rx) = harness.observer();
    let app = next(&mut late_rx).await;
    assert_eq!(app.event, EventName::Application);
    assert_eq!(app.data, serde_json::json!("webserver"));
}

#[tokio::test]
async fn test_scale_without_controller_is_rejected() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();

    harness.handle.request(observer, ObserverRequest::CloneUnit(UnitId(10)));

    let event = next(&mut rx).await;
    assert!(error_text(&event).contains("no controller connection"));
}

#[tokio::test]
async fn test_start_without_deployment_is_rejected() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();

    harness.handle.request(observer, ObserverRequest::Start);

    let event = next(&mut rx).await;
    assert_eq!(error_text(&event), "no deployment selected");
    assert_eq!(harness.shell.launch_count(), 0);
}

#[tokio::test]
async fn test_stop_kills_the_controller() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();
    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;

    harness.handle.request(observer, ObserverRequest::Stop);

    harness
        .until(|shell| shell.execs().contains(&"pkill -f 'global_controller'".to_string()))
        .await;
}

#[tokio::test]
async fn test_start_without_controller_connection_reports_stopped() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();
    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;

    harness.handle.request(observer, ObserverRequest::Start);

    let error = wait_for(&mut rx, EventName::ErrorMsg).await;
    assert_eq!(error_text(&error), "Could not connect to controller");
    wait_for(&mut rx, EventName::Stopped).await;

    let launches = harness.shell.launches();
    assert_eq!(launches.len(), 1);
    match &launches[0] {
        ShellCall::Launch { target, command } => {
            assert_eq!(target, "ctl");
            assert!(command.contains("global_controller -j"));
            assert!(command.ends_with("--init-db"));
        }
        other => panic!("unexpected call {:?}", other),
    }

    // Controller process exit is reported as well.
    assert!(harness.shell.finish("ctl", 0));
    wait_for(&mut rx, EventName::Stopped).await;
}

#[tokio::test]
async fn test_attaches_to_running_controller_after_distribution() {
    let controller = FakeController::bind().await;
    let harness = Harness::start(StubShell::new(), controller.ports(), 10);
    let (observer, mut rx) = harness.observer();

    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));

    let notice = wait_for(&mut rx, EventName::ErrorMsg).await;
    assert_eq!(error_text(&notice), "Connected to running instance");
    wait_for(&mut rx, EventName::Started).await;
    assert_eq!(harness.shell.launch_count(), 0);
}

#[tokio::test]
async fn test_full_cluster_lifecycle() {
    let controller = FakeController::bind().await;
    // Long attach grace keeps the attach check out of the way.
    let harness = Harness::start(StubShell::new(), controller.ports(), 60_000);
    let (observer, mut rx) = harness.observer();

    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;

    // Start: controller launched, link connected after the grace interval.
    harness.handle.request(observer, ObserverRequest::Start);
    let (mut stream, _) = tokio::time::timeout(WAIT, controller.stream.accept())
        .await
        .unwrap()
        .unwrap();
    let (mut command, _) = tokio::time::timeout(WAIT, controller.command.accept())
        .await
        .unwrap()
        .unwrap();
    wait_for(&mut rx, EventName::Started).await;

    // Snapshot: runtime 2 is up, runtime 1 is idle and gets started.
    let snapshot = DEPLOYMENT.replace(
        r#"{ "id": 2, "ip": "10.0.0.2", "num_pinned_threads": 2 }"#,
        r#"{ "id": 2, "ip": "10.0.0.2", "num_pinned_threads": 2, "connected": true }"#,
    );
    assert_ne!(snapshot, DEPLOYMENT);
    stream.write_all(snapshot.as_bytes()).await.unwrap();

    let runtimes = wait_for(&mut rx, EventName::Runtimes).await;
    assert_eq!(runtimes.data[1]["status"], serde_json::json!("Connected"));
    wait_for(&mut rx, EventName::Links).await;
    harness
        .until(|shell| {
            shell
                .launches()
                .iter()
                .any(|call| matches!(call, ShellCall::Launch { target, .. } if target == "1"))
        })
        .await;
    assert!(!harness
        .shell
        .launches()
        .iter()
        .any(|call| matches!(call, ShellCall::Launch { target, .. } if target == "2")));

    // Same snapshot again changes nothing.
    stream.write_all(snapshot.as_bytes()).await.unwrap();
    assert_quiet(&mut rx).await;

    // Scale: the command reaches the controller as a text line.
    harness.handle.request(observer, ObserverRequest::CloneUnit(UnitId(10)));
    let mut line = [0u8; 9];
    tokio::time::timeout(WAIT, command.read_exact(&mut line))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&line, b"clone 10\n");

    // Runtime exit is reported to everyone.
    assert!(harness.shell.finish("1", 1));
    let stopped = wait_for(&mut rx, EventName::ErrorMsg).await;
    assert_eq!(error_text(&stopped), "Runtime 1 has stopped");

    // Controller closes its stream.
    drop(stream);
    let closed = wait_for(&mut rx, EventName::ErrorMsg).await;
    assert_eq!(error_text(&closed), "Controller shut down");
    wait_for(&mut rx, EventName::Stopped).await;
}

#[tokio::test]
async fn test_reselection_ignores_results_from_previous_deployment() {
    let harness = Harness::start(StubShell::new(), (closed_port().await, closed_port().await), 10);
    let (observer, mut rx) = harness.observer();
    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;

    harness.handle.request(observer, ObserverRequest::Start);
    harness.until(|shell| shell.launch_count() == 1).await;

    // A new selection replaces the registry; the old controller's exit is stale.
    harness
        .handle
        .request(observer, ObserverRequest::SelectedDfg("webserver.json".to_string()));
    wait_for(&mut rx, EventName::Links).await;
    assert!(harness.shell.finish("ctl", 0));

    // The start grace check from the first deployment is dropped too.
    tokio::time::sleep(Duration::from_millis(150)).await;
    while let Ok(event) = rx.try_recv() {
        assert_ne!(event.event, EventName::Stopped, "stale exit leaked: {:?}", event);
    }
}
