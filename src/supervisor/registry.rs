// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use crate::errors::SupervisorError;
use crate::observability::messages::supervisor::{
    FileBroadcastFinished, FileCopied, KillAttempted, ProcessExited, ProcessLaunched,
    RegistryCleared, RemoteCommandFailed, StartAlreadyOutstanding, TargetConnectFailed,
    TargetRegistered, UnknownTarget,
};
use crate::observability::messages::StructuredLog;
use crate::supervisor::ssh::shell_quote;
use crate::supervisor::target::{ConnectionState, RemoteTarget};
use crate::traits::RemoteShell;

/// Outcome of a [`ProcessSupervisor::start`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The process was launched; the exit callback will fire once.
    Launched,
    /// A previous start is still outstanding; nothing was launched and the
    /// exit callback was dropped without being called.
    AlreadyStarting,
}

/// Registry of remote targets plus the asynchronous operations run against
/// them.
///
/// Registry mutation (`register`, `clear`) needs `&mut self`; every remote
/// operation takes `&self`, resolves its target immediately and returns a
/// `'static` future, so callers can hand the future to a task and keep
/// mutating the registry. Futures keep the target they resolved alive, which
/// makes operations that outlive a `clear()` harmless.
pub struct ProcessSupervisor {
    targets: BTreeMap<String, Arc<RemoteTarget>>,
    shell: Arc<dyn RemoteShell>,
}

impl ProcessSupervisor {
    pub fn new(shell: Arc<dyn RemoteShell>) -> Self {
        Self {
            targets: BTreeMap::new(),
            shell,
        }
    }

    /// Insert or replace a target. Replacing is logged, not an error.
    pub fn register(&mut self, id: impl Into<String>, address: impl Into<String>) {
        let target = Arc::new(RemoteTarget::new(id, address));
        TargetRegistered {
            target_id: target.id(),
            address: target.host(),
            replaced: self.targets.contains_key(target.id()),
        }
        .log();
        self.targets.insert(target.id().to_string(), target);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains_key(id)
    }

    pub fn target(&self, id: &str) -> Option<Arc<RemoteTarget>> {
        self.targets.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Drop every target. Operations already in flight run to completion
    /// against the targets they captured.
    pub fn clear(&mut self) {
        RegistryCleared {
            target_count: self.targets.len(),
        }
        .log();
        self.targets.clear();
    }

    fn lookup(&self, id: &str, operation: &str) -> Result<Arc<RemoteTarget>, SupervisorError> {
        self.target(id).ok_or_else(|| {
            UnknownTarget {
                target_id: id,
                operation,
            }
            .log();
            SupervisorError::unknown_target(id)
        })
    }

    /// Run `command` on `id` and return its standard output.
    pub fn exec_and_wait(&self, id: &str, command: &str) -> BoxFuture<'static, Result<String, SupervisorError>> {
        let target = match self.lookup(id, "exec") {
            Ok(target) => target,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let shell = Arc::clone(&self.shell);
        let command = command.to_string();

        async move {
            ensure_connected(shell.as_ref(), &target).await?;
            let output = run_checked(shell.as_ref(), &target, &command).await?;
            Ok(output.stdout)
        }
        .boxed()
    }

    /// Launch `command` on `id` without waiting for it to exit.
    ///
    /// The returned future resolves once the process is launched. `on_exit`
    /// runs exactly once, from a background task, with the exit code. While
    /// a start is outstanding further calls return
    /// [`StartOutcome::AlreadyStarting`] and drop their callback. The guard is
    /// checked when `start` is called, not when the future is first polled.
    pub fn start<F>(&self, id: &str, command: &str, on_exit: F) -> BoxFuture<'static, Result<StartOutcome, SupervisorError>>
    where
        F: FnOnce(i32) + Send + 'static,
    {
        let target = match self.lookup(id, "start") {
            Ok(target) => target,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        if !target.try_begin_start() {
            StartAlreadyOutstanding { target_id: target.id() }.log();
            return future::ready(Ok(StartOutcome::AlreadyStarting)).boxed();
        }
        let shell = Arc::clone(&self.shell);
        let command = command.to_string();

        async move {
            let launched = async {
                ensure_connected(shell.as_ref(), &target).await?;
                shell.launch(target.endpoint(), &command).await
            }
            .await;

            let exited = match launched {
                Ok(exited) => exited,
                Err(e) => {
                    target.finish_start();
                    target.set_state(ConnectionState::Errored);
                    return Err(e);
                }
            };

            let launch = ProcessLaunched {
                target_id: target.id(),
                command: &command,
            };
            launch.log();
            let span = launch.span("process_exit");
            target.set_state(ConnectionState::Running);

            let watched = Arc::clone(&target);
            tokio::spawn(
                async move {
                    let exit_code = exited.await;
                    watched.finish_start();
                    watched.set_state(ConnectionState::Connected);
                    ProcessExited {
                        target_id: watched.id(),
                        exit_code,
                    }
                    .log();
                    on_exit(exit_code);
                }
                .instrument(span),
            );

            Ok(StartOutcome::Launched)
        }
        .boxed()
    }

    /// Best-effort `pkill -f <pattern>` on `id`. Never fails; problems are
    /// logged.
    pub fn kill(&self, id: &str, pattern: &str) -> BoxFuture<'static, ()> {
        let target = match self.lookup(id, "kill") {
            Ok(target) => target,
            Err(_) => return future::ready(()).boxed(),
        };
        let shell = Arc::clone(&self.shell);
        let pattern = pattern.to_string();

        async move {
            let command = format!("pkill -f {}", shell_quote(&pattern));
            let result = async {
                ensure_connected(shell.as_ref(), &target).await?;
                let output = shell.exec(target.endpoint(), &command).await?;
                // pkill exits 1 when nothing matched.
                if output.status > 1 {
                    return Err(SupervisorError::Command {
                        target: target.id().to_string(),
                        command: command.clone(),
                        status: output.status,
                        output: output.combined(),
                    });
                }
                Ok(())
            }
            .await;

            let error = result.as_ref().err();
            KillAttempted {
                target_id: target.id(),
                pattern: &pattern,
                error: error.map(|e| e as &dyn std::error::Error),
            }
            .log();
        }
        .boxed()
    }

    /// Whether a process matching `pattern` runs on `id`.
    pub fn is_running(&self, id: &str, pattern: &str) -> BoxFuture<'static, Result<bool, SupervisorError>> {
        let target = match self.lookup(id, "is_running") {
            Ok(target) => target,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let shell = Arc::clone(&self.shell);
        let command = format!("pgrep -f {}", shell_quote(pattern));

        async move {
            ensure_connected(shell.as_ref(), &target).await?;
            let output = shell.exec(target.endpoint(), &command).await?;
            match output.status {
                0 => Ok(!output.stdout.trim().is_empty()),
                1 => Ok(false),
                status => Err(SupervisorError::Command {
                    target: target.id().to_string(),
                    command,
                    status,
                    output: output.combined(),
                }),
            }
        }
        .boxed()
    }

    /// Copy `local` to `remote` on every registered target.
    ///
    /// Each copy runs in its own task. The future resolves once every copy
    /// succeeded, or with the first failure; copies still in flight at that
    /// point keep running to completion.
    pub fn broadcast_file(&self, local: impl Into<PathBuf>, remote: &str) -> BoxFuture<'static, Result<(), SupervisorError>> {
        let local: PathBuf = local.into();
        let local: Arc<Path> = Arc::from(local.as_path());
        let remote: Arc<str> = Arc::from(remote);
        let target_count = self.targets.len();

        let mut copies: FuturesUnordered<_> = self
            .targets
            .values()
            .map(|target| {
                let id = target.id().to_string();
                let copy = copy_file(
                    Arc::clone(&self.shell),
                    Arc::clone(target),
                    Arc::clone(&local),
                    Arc::clone(&remote),
                );
                tokio::spawn(copy).map(move |joined| {
                    joined.unwrap_or_else(|e| {
                        Err(SupervisorError::Connection {
                            target: id,
                            reason: format!("copy task failed: {}", e),
                        })
                    })
                })
            })
            .collect();

        async move {
            let local_path = local.display().to_string();
            while let Some(result) = copies.next().await {
                if let Err(e) = result {
                    FileBroadcastFinished {
                        local_path: &local_path,
                        target_count,
                        error: Some(&e as &dyn std::error::Error),
                    }
                    .log();
                    return Err(e);
                }
            }
            FileBroadcastFinished {
                local_path: &local_path,
                target_count,
                error: None,
            }
            .log();
            Ok(())
        }
        .boxed()
    }

    /// Check that `id` is reachable, regardless of its recorded state.
    pub fn test_connection(&self, id: &str) -> BoxFuture<'static, Result<(), SupervisorError>> {
        let target = match self.lookup(id, "test_connection") {
            Ok(target) => target,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let shell = Arc::clone(&self.shell);
        async move { connect(shell.as_ref(), &target).await }.boxed()
    }

    /// Check every registered target concurrently.
    pub fn test_all_connections(&self) -> BoxFuture<'static, Vec<(String, Result<(), SupervisorError>)>> {
        let checks: Vec<_> = self
            .targets
            .values()
            .map(|target| {
                let shell = Arc::clone(&self.shell);
                let target = Arc::clone(target);
                async move {
                    let result = connect(shell.as_ref(), &target).await;
                    (target.id().to_string(), result)
                }
            })
            .collect();
        future::join_all(checks).boxed()
    }
}

async fn connect(shell: &dyn RemoteShell, target: &RemoteTarget) -> Result<(), SupervisorError> {
    target.set_state(ConnectionState::Connecting);
    match shell.connect(target.endpoint()).await {
        Ok(()) => {
            target.set_state(ConnectionState::Connected);
            Ok(())
        }
        Err(e) => {
            TargetConnectFailed {
                target_id: target.id(),
                error: &e,
            }
            .log();
            target.set_state(ConnectionState::Errored);
            Err(e)
        }
    }
}

async fn ensure_connected(shell: &dyn RemoteShell, target: &RemoteTarget) -> Result<(), SupervisorError> {
    if target.state().needs_connect() {
        connect(shell, target).await?;
    }
    Ok(())
}

async fn run_checked(
    shell: &dyn RemoteShell,
    target: &RemoteTarget,
    command: &str,
) -> Result<crate::traits::CommandOutput, SupervisorError> {
    let output = shell.exec(target.endpoint(), command).await?;
    if output.is_success() {
        return Ok(output);
    }
    let combined = output.combined();
    RemoteCommandFailed {
        target_id: target.id(),
        command,
        status: output.status,
        output: &combined,
    }
    .log();
    Err(SupervisorError::Command {
        target: target.id().to_string(),
        command: command.to_string(),
        status: output.status,
        output: combined,
    })
}

async fn copy_file(
    shell: Arc<dyn RemoteShell>,
    target: Arc<RemoteTarget>,
    local: Arc<Path>,
    remote: Arc<str>,
) -> Result<(), SupervisorError> {
    ensure_connected(shell.as_ref(), &target).await?;

    if let Some(parent) = Path::new(&*remote).parent().and_then(Path::to_str) {
        if !parent.is_empty() {
            // An existing directory is fine; the copy below reports real problems.
            if let Err(e) = shell.mkdir(target.endpoint(), parent).await {
                tracing::debug!(target_id = target.id(), error = %e, "mkdir before copy failed");
            }
        }
    }

    shell.put(target.endpoint(), &local, &remote).await?;
    FileCopied {
        target_id: target.id(),
        remote_path: &remote,
    }
    .log();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::stub::{ShellCall, StubShell};
    use crate::traits::CommandOutput;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn supervisor(shell: &Arc<StubShell>) -> ProcessSupervisor {
        let shell: Arc<dyn RemoteShell> = shell.clone();
        ProcessSupervisor::new(shell)
    }

    #[tokio::test]
    async fn test_register_replaces_existing_target() {
        let shell = Arc::new(StubShell::new());
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");
        sup.register("1", "10.0.0.9");

        assert_eq!(sup.len(), 1);
        assert_eq!(sup.target("1").unwrap().host(), "10.0.0.9");
    }

    #[tokio::test]
    async fn test_exec_returns_stdout() {
        let shell = Arc::new(StubShell::new().with_response("hostname", CommandOutput::success("node1\n")));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        let out = sup.exec_and_wait("1", "hostname").await.unwrap();
        assert_eq!(out, "node1\n");
        assert_eq!(sup.target("1").unwrap().state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_exec_non_zero_is_command_error_with_output() {
        let shell = Arc::new(StubShell::new().with_response("ls", CommandOutput::failure(2, "No such file")));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        let err = sup.exec_and_wait("1", "ls /missing").await.unwrap_err();
        assert_eq!(
            err,
            SupervisorError::Command {
                target: "1".to_string(),
                command: "ls /missing".to_string(),
                status: 2,
                output: "No such file".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_exec_unknown_target_is_connection_error() {
        let shell = Arc::new(StubShell::new());
        let sup = supervisor(&shell);

        let err = sup.exec_and_wait("nope", "true").await.unwrap_err();
        assert!(matches!(err, SupervisorError::Connection { .. }));
        assert!(shell.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_target_stays_registered() {
        let shell = Arc::new(StubShell::new().with_unreachable("10.0.0.2"));
        let mut sup = supervisor(&shell);
        sup.register("2", "10.0.0.2");

        let err = sup.exec_and_wait("2", "true").await.unwrap_err();
        assert_eq!(err.target(), "2");
        assert!(sup.contains("2"));
        assert_eq!(sup.target("2").unwrap().state(), ConnectionState::Errored);
    }

    #[tokio::test]
    async fn test_double_start_launches_once() {
        let shell = Arc::new(StubShell::new());
        let mut sup = supervisor(&shell);
        sup.register("ctl", "10.0.0.1");

        let exits = Arc::new(AtomicUsize::new(0));
        let first = {
            let exits = Arc::clone(&exits);
            sup.start("ctl", "controller", move |_| {
                exits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let second = {
            let exits = Arc::clone(&exits);
            sup.start("ctl", "controller", move |_| {
                exits.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert_eq!(first.await.unwrap(), StartOutcome::Launched);
        assert_eq!(second.await.unwrap(), StartOutcome::AlreadyStarting);
        assert_eq!(shell.launch_count(), 1);
        assert_eq!(exits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exit_callback_fires_once_and_clears_guard() {
        let shell = Arc::new(StubShell::new());
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = sup
            .start("1", "rt -i 1", move |code| {
                let _ = tx.send(code);
            })
            .await
            .unwrap();
        assert_eq!(outcome, StartOutcome::Launched);
        assert_eq!(sup.target("1").unwrap().state(), ConnectionState::Running);

        assert!(shell.finish("1", 3));
        assert_eq!(rx.recv().await, Some(3));
        assert_eq!(rx.recv().await, None);

        let target = sup.target("1").unwrap();
        assert!(!target.start_outstanding());
        assert_eq!(target.state(), ConnectionState::Connected);

        let again = sup.start("1", "rt -i 1", |_| {}).await.unwrap();
        assert_eq!(again, StartOutcome::Launched);
        assert_eq!(shell.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_launch_releases_guard() {
        let shell = Arc::new(StubShell::new().with_failing_launch("10.0.0.1"));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        let err = sup.start("1", "rt", |_| {}).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Connection { .. }));
        assert!(!sup.target("1").unwrap().start_outstanding());
    }

    #[tokio::test]
    async fn test_exit_after_clear_still_reports() {
        let shell = Arc::new(StubShell::new());
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        let (tx, mut rx) = mpsc::unbounded_channel();
        sup.start("1", "rt", move |code| {
            let _ = tx.send(code);
        })
        .await
        .unwrap();

        sup.clear();
        assert!(sup.is_empty());
        assert!(shell.finish("1", 0));
        assert_eq!(rx.recv().await, Some(0));
    }

    #[tokio::test]
    async fn test_kill_never_fails() {
        let shell = Arc::new(
            StubShell::new()
                .with_unreachable("10.0.0.2")
                .with_response("pkill", CommandOutput::failure(1, "")),
        );
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");
        sup.register("2", "10.0.0.2");

        sup.kill("1", "global_controller").await;
        sup.kill("2", "global_controller").await;
        sup.kill("missing", "global_controller").await;

        assert!(shell.execs().contains(&"pkill -f 'global_controller'".to_string()));
    }

    #[tokio::test]
    async fn test_is_running_reads_process_list() {
        let shell = Arc::new(StubShell::new().with_response("pgrep -f 'rt'", CommandOutput::success("4242\n")));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        assert!(sup.is_running("1", "rt").await.unwrap());
        assert!(!sup.is_running("1", "global_controller").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_running_no_match_is_false() {
        let shell = Arc::new(StubShell::new().with_response("pgrep", CommandOutput::failure(1, "")));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        assert!(!sup.is_running("1", "rt").await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_file_reaches_every_target() {
        let shell = Arc::new(StubShell::new());
        let mut sup = supervisor(&shell);
        sup.register("ctl", "10.0.0.1");
        sup.register("1", "10.0.0.2");

        sup.broadcast_file("/tmp/app.json", "/remote/dfgs/app.json")
            .await
            .unwrap();

        let mut copied = shell.copied_to();
        copied.sort();
        assert_eq!(copied, vec!["1".to_string(), "ctl".to_string()]);
        assert!(shell.calls().contains(&ShellCall::Mkdir {
            target: "ctl".to_string(),
            path: "/remote/dfgs".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_broadcast_file_tolerates_mkdir_failure() {
        let shell = Arc::new(StubShell::new().with_failing_mkdir("10.0.0.1"));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");

        sup.broadcast_file("/tmp/app.json", "/remote/app.json").await.unwrap();
        assert_eq!(shell.copied_to(), vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn test_broadcast_file_first_failure_leaves_other_copies_running() {
        // The failing copy settles at once; the others are held back.
        let shell = Arc::new(
            StubShell::new()
                .with_failing_put("10.0.0.2")
                .with_put_delay(Duration::from_millis(300)),
        );
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");
        sup.register("2", "10.0.0.2");
        sup.register("3", "10.0.0.3");

        let err = sup
            .broadcast_file("/tmp/app.json", "/remote/app.json")
            .await
            .unwrap_err();
        assert_eq!(err.target(), "2");
        assert!(matches!(err, SupervisorError::Command { .. }));
        assert!(shell.copied_to().is_empty(), "copies finished before the rejection");

        tokio::time::timeout(Duration::from_secs(3), async {
            while shell.copied_to().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("surviving copies never completed");
        let mut copied = shell.copied_to();
        copied.sort();
        assert_eq!(copied, vec!["1".to_string(), "3".to_string()]);
    }

    #[tokio::test]
    async fn test_all_connections_reports_each_target() {
        let shell = Arc::new(StubShell::new().with_unreachable("10.0.0.2"));
        let mut sup = supervisor(&shell);
        sup.register("1", "10.0.0.1");
        sup.register("2", "10.0.0.2");

        let results = sup.test_all_connections().await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|(id, r)| id == "1" && r.is_ok()));
        assert!(results.iter().any(|(id, r)| id == "2" && r.is_err()));
    }
}
