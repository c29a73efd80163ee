// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::*;
use crate::errors::ConfigError;
use crate::graph::RuntimeId;
use crate::supervisor::shell_quote;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for the control plane.
///
/// Every section is optional; missing values fall back to the defaults in
/// [`crate::config::consts`]. Loaded from a YAML file.
///
/// # Example
/// ```yaml
/// listen_address: "0.0.0.0:8000"
/// local_dfg_dir: ./dfgs
/// ssh:
///   user: dedos
///   key: /home/dedos/.ssh/id_rsa_internal
///   port: 2324
/// cluster:
///   remote_dfg_dir: /home/dedos/nfs/dedos_dfgs
///   executable_dir: /home/dedos/nfs/Dedos
///   stream_port: 10000
///   command_port: 4321
/// link:
///   start_grace_ms: 2000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_address: String,
    pub local_dfg_dir: PathBuf,
    pub ssh: SshConfig,
    pub cluster: ClusterConfig,
    pub link: LinkConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            local_dfg_dir: PathBuf::from(DEFAULT_LOCAL_DFG_DIR),
            ssh: SshConfig::default(),
            cluster: ClusterConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ports = [
            ("ssh.port", self.ssh.port),
            ("cluster.stream_port", self.cluster.stream_port),
            ("cluster.command_port", self.cluster.command_port),
        ];
        for (field, port) in ports {
            if port == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "port must be non-zero".to_string(),
                });
            }
        }
        if self.link.max_decode_failures == 0 {
            return Err(ConfigError::Invalid {
                field: "link.max_decode_failures",
                reason: "must allow at least one failed decode".to_string(),
            });
        }
        Ok(())
    }
}

/// Credentials and port for reaching cluster nodes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub key: PathBuf,
    pub port: u16,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            key: PathBuf::from(DEFAULT_SSH_KEY),
            port: DEFAULT_SSH_PORT,
        }
    }
}

/// Where the cluster binaries live and how they are launched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub remote_dfg_dir: String,
    pub executable_dir: String,
    pub controller_exec: String,
    pub runtime_exec: String,
    pub stream_port: u16,
    pub command_port: u16,
    /// Pass `--init-db` to the controller on launch.
    pub init_db: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            remote_dfg_dir: DEFAULT_REMOTE_DFG_DIR.to_string(),
            executable_dir: DEFAULT_EXECUTABLE_DIR.to_string(),
            controller_exec: DEFAULT_CONTROLLER_EXEC.to_string(),
            runtime_exec: DEFAULT_RUNTIME_EXEC.to_string(),
            stream_port: DEFAULT_STREAM_PORT,
            command_port: DEFAULT_COMMAND_PORT,
            init_db: true,
        }
    }
}

impl ClusterConfig {
    /// Remote path a deployment file is pushed to.
    pub fn remote_dfg_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.remote_dfg_dir.trim_end_matches('/'), file_name)
    }

    /// Command line that launches the controller for `file_name`.
    pub fn controller_command(&self, file_name: &str) -> String {
        let mut command = format!(
            "{}/{} -j {} -p {} -c {}",
            self.executable_dir.trim_end_matches('/'),
            self.controller_exec,
            shell_quote(&self.remote_dfg_path(file_name)),
            self.stream_port,
            self.command_port
        );
        if self.init_db {
            command.push_str(" --init-db");
        }
        command
    }

    /// Command line that launches runtime `runtime_id` for `file_name`.
    pub fn runtime_command(&self, file_name: &str, runtime_id: RuntimeId) -> String {
        format!(
            "{}/{} -j {} -i {}",
            self.executable_dir.trim_end_matches('/'),
            self.runtime_exec,
            shell_quote(&self.remote_dfg_path(file_name)),
            runtime_id
        )
    }
}

/// Controller link tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub start_grace_ms: u64,
    pub attach_grace_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_decode_failures: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            start_grace_ms: DEFAULT_START_GRACE_MS,
            attach_grace_ms: DEFAULT_ATTACH_GRACE_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_decode_failures: DEFAULT_MAX_DECODE_FAILURES,
        }
    }
}

impl LinkConfig {
    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    pub fn attach_grace(&self) -> Duration {
        Duration::from_millis(self.attach_grace_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: ServiceConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cfg)
}

/// Load and validate a config from a YAML file
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}
