// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory [`RemoteShell`] that records every call instead of reaching a
//! host. Used by the supervisor and orchestrator tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::errors::SupervisorError;
use crate::traits::{CommandOutput, ExitFuture, RemoteEndpoint, RemoteShell};

/// One recorded call, keyed by target id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    Connect { target: String },
    Exec { target: String, command: String },
    Launch { target: String, command: String },
    Mkdir { target: String, path: String },
    Put { target: String, local: PathBuf, remote: String },
}

impl ShellCall {
    pub fn target(&self) -> &str {
        match self {
            ShellCall::Connect { target }
            | ShellCall::Exec { target, .. }
            | ShellCall::Launch { target, .. }
            | ShellCall::Mkdir { target, .. }
            | ShellCall::Put { target, .. } => target,
        }
    }
}

#[derive(Default)]
struct StubState {
    calls: Vec<ShellCall>,
    /// Exit triggers for launched processes, oldest first.
    running: Vec<(String, oneshot::Sender<i32>)>,
}

/// Scriptable shell. Hosts listed as unreachable fail every call with a
/// connection error; everything else succeeds unless scripted otherwise.
#[derive(Default)]
pub struct StubShell {
    unreachable: HashSet<String>,
    failing_launches: HashSet<String>,
    failing_puts: HashSet<String>,
    failing_mkdirs: HashSet<String>,
    put_delay: Duration,
    /// Canned responses keyed by command prefix.
    responses: Vec<(String, CommandOutput)>,
    state: Mutex<StubState>,
}

impl StubShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unreachable(mut self, host: &str) -> Self {
        self.unreachable.insert(host.to_string());
        self
    }

    pub fn with_failing_launch(mut self, host: &str) -> Self {
        self.failing_launches.insert(host.to_string());
        self
    }

    pub fn with_failing_put(mut self, host: &str) -> Self {
        self.failing_puts.insert(host.to_string());
        self
    }

    pub fn with_failing_mkdir(mut self, host: &str) -> Self {
        self.failing_mkdirs.insert(host.to_string());
        self
    }

    /// Delay every copy, so a failing copy on one host settles before the rest.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = delay;
        self
    }

    /// Answer `exec` calls whose command starts with `prefix`.
    pub fn with_response(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.responses.push((prefix.to_string(), output));
        self
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: ShellCall) {
        self.lock().calls.push(call);
    }

    fn reachable(&self, endpoint: &RemoteEndpoint) -> Result<(), SupervisorError> {
        if self.unreachable.contains(&endpoint.host) {
            return Err(SupervisorError::Connection {
                target: endpoint.id.clone(),
                reason: format!("host {} unreachable", endpoint.host),
            });
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.lock().calls.clone()
    }

    pub fn launches(&self) -> Vec<ShellCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, ShellCall::Launch { .. }))
            .collect()
    }

    pub fn launch_count(&self) -> usize {
        self.launches().len()
    }

    pub fn execs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ShellCall::Exec { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Targets that received a successful copy.
    pub fn copied_to(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ShellCall::Put { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Make the oldest live process on `target` exit with `code`.
    /// Returns false if nothing is running there.
    pub fn finish(&self, target: &str, code: i32) -> bool {
        let mut state = self.lock();
        match state.running.iter().position(|(id, _)| id == target) {
            Some(index) => {
                let (_, trigger) = state.running.remove(index);
                trigger.send(code).is_ok()
            }
            None => false,
        }
    }

    pub fn running_count(&self) -> usize {
        self.lock().running.len()
    }
}

#[async_trait]
impl RemoteShell for StubShell {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<(), SupervisorError> {
        self.record(ShellCall::Connect {
            target: endpoint.id.clone(),
        });
        self.reachable(endpoint)
    }

    async fn exec(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<CommandOutput, SupervisorError> {
        self.record(ShellCall::Exec {
            target: endpoint.id.clone(),
            command: command.to_string(),
        });
        self.reachable(endpoint)?;
        let canned = self
            .responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone());
        Ok(canned.unwrap_or_default())
    }

    async fn launch(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<ExitFuture, SupervisorError> {
        self.reachable(endpoint)?;
        if self.failing_launches.contains(&endpoint.host) {
            return Err(SupervisorError::Connection {
                target: endpoint.id.clone(),
                reason: "launch refused".to_string(),
            });
        }
        let (trigger, exited) = oneshot::channel();
        {
            let mut state = self.lock();
            state.calls.push(ShellCall::Launch {
                target: endpoint.id.clone(),
                command: command.to_string(),
            });
            state.running.push((endpoint.id.clone(), trigger));
        }
        Ok(Box::pin(async move { exited.await.unwrap_or(-1) }))
    }

    async fn mkdir(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<(), SupervisorError> {
        self.record(ShellCall::Mkdir {
            target: endpoint.id.clone(),
            path: path.to_string(),
        });
        self.reachable(endpoint)?;
        if self.failing_mkdirs.contains(&endpoint.host) {
            return Err(SupervisorError::Command {
                target: endpoint.id.clone(),
                command: format!("mkdir -p {}", path),
                status: 1,
                output: "File exists".to_string(),
            });
        }
        Ok(())
    }

    async fn put(&self, endpoint: &RemoteEndpoint, local: &Path, remote: &str) -> Result<(), SupervisorError> {
        if !self.put_delay.is_zero() && !self.failing_puts.contains(&endpoint.host) {
            tokio::time::sleep(self.put_delay).await;
        }
        self.reachable(endpoint)?;
        if self.failing_puts.contains(&endpoint.host) {
            return Err(SupervisorError::Command {
                target: endpoint.id.clone(),
                command: format!("scp {} {}", local.display(), remote),
                status: 1,
                output: "No space left on device".to_string(),
            });
        }
        self.record(ShellCall::Put {
            target: endpoint.id.clone(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        Ok(())
    }
}
