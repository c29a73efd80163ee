// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::config::SshConfig;
use crate::errors::SupervisorError;
use crate::traits::{CommandOutput, ExitFuture, RemoteEndpoint, RemoteShell};

/// Exit status `ssh` and `scp` use for their own failures (as opposed to the
/// remote command's).
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// [`RemoteShell`] backed by the system `ssh` and `scp` binaries.
#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
    key: PathBuf,
    port: u16,
}

impl SshShell {
    pub fn new(config: &SshConfig) -> Self {
        Self {
            user: config.user.clone(),
            key: expand_home(&config.key),
            port: config.port,
        }
    }

    fn destination(&self, endpoint: &RemoteEndpoint) -> String {
        format!("{}@{}", self.user, endpoint.host)
    }

    /// `user@host:'path'` for scp. The remote path is expanded by the remote
    /// shell under the legacy protocol, so it is quoted like any command
    /// argument.
    fn scp_destination(&self, endpoint: &RemoteEndpoint, remote: &str) -> String {
        format!("{}:{}", self.destination(endpoint), shell_quote(remote))
    }

    fn ssh(&self, endpoint: &RemoteEndpoint, remote_command: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("-i")
            .arg(&self.key)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(self.destination(endpoint))
            .arg(remote_command)
            .stdin(Stdio::null());
        cmd
    }

    async fn run(&self, endpoint: &RemoteEndpoint, mut cmd: Command) -> Result<CommandOutput, SupervisorError> {
        let output = cmd
            .output()
            .await
            .map_err(|e| SupervisorError::Connection {
                target: endpoint.id.clone(),
                reason: e.to_string(),
            })?;
        into_command_output(endpoint, output)
    }
}

fn into_command_output(endpoint: &RemoteEndpoint, output: Output) -> Result<CommandOutput, SupervisorError> {
    let status = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if status == SSH_TRANSPORT_FAILURE {
        return Err(SupervisorError::Connection {
            target: endpoint.id.clone(),
            reason: stderr.trim().to_string(),
        });
    }
    Ok(CommandOutput { status, stdout, stderr })
}

/// Expand a leading `~/` against `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Single-quote `value` for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<(), SupervisorError> {
        let output = self.run(endpoint, self.ssh(endpoint, "true")).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(SupervisorError::Connection {
                target: endpoint.id.clone(),
                reason: output.combined(),
            })
        }
    }

    async fn exec(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<CommandOutput, SupervisorError> {
        self.run(endpoint, self.ssh(endpoint, command)).await
    }

    async fn launch(&self, endpoint: &RemoteEndpoint, command: &str) -> Result<ExitFuture, SupervisorError> {
        let mut cmd = self.ssh(endpoint, command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let child = cmd.spawn().map_err(|e| SupervisorError::Connection {
            target: endpoint.id.clone(),
            reason: e.to_string(),
        })?;

        let target = endpoint.id.clone();
        Ok(Box::pin(async move {
            match child.wait_with_output().await {
                Ok(output) => {
                    let code = output.status.code().unwrap_or(-1);
                    if code != 0 {
                        tracing::debug!(
                            target_id = %target,
                            exit_code = code,
                            stderr = %String::from_utf8_lossy(&output.stderr),
                            "Remote process output"
                        );
                    }
                    code
                }
                Err(e) => {
                    tracing::warn!(target_id = %target, error = %e, "Lost track of remote process");
                    -1
                }
            }
        }))
    }

    async fn mkdir(&self, endpoint: &RemoteEndpoint, path: &str) -> Result<(), SupervisorError> {
        let command = format!("mkdir -p {}", shell_quote(path));
        let output = self.exec(endpoint, &command).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(SupervisorError::Command {
                target: endpoint.id.clone(),
                command,
                status: output.status,
                output: output.combined(),
            })
        }
    }

    async fn put(&self, endpoint: &RemoteEndpoint, local: &Path, remote: &str) -> Result<(), SupervisorError> {
        let mut cmd = Command::new("scp");
        // Legacy protocol: the remote path goes through the remote shell.
        cmd.arg("-O")
            .arg("-P")
            .arg(self.port.to_string())
            .arg("-i")
            .arg(&self.key)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(local)
            .arg(self.scp_destination(endpoint, remote))
            .stdin(Stdio::null());

        let output = self.run(endpoint, cmd).await?;
        if output.is_success() {
            Ok(())
        } else {
            Err(SupervisorError::Command {
                target: endpoint.id.clone(),
                command: format!("scp {} {}", local.display(), remote),
                status: output.status,
                output: output.combined(),
            })
        }
    }
}
