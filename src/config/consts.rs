// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Address the observer WebSocket server binds to
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";
/// Local directory holding selectable deployment descriptions
pub const DEFAULT_LOCAL_DFG_DIR: &str = "./dfgs";

/// Remote user for SSH access to cluster nodes
pub const DEFAULT_SSH_USER: &str = "dedos";
/// Private key used for SSH access
pub const DEFAULT_SSH_KEY: &str = "~/.ssh/id_rsa";
/// SSH port on cluster nodes
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Remote directory deployment descriptions are pushed to
pub const DEFAULT_REMOTE_DFG_DIR: &str = "/opt/dedos/dfgs";
/// Remote directory holding the controller and runtime executables
pub const DEFAULT_EXECUTABLE_DIR: &str = "/opt/dedos/bin";
/// Controller executable name (also the pattern used to kill it)
pub const DEFAULT_CONTROLLER_EXEC: &str = "global_controller";
/// Runtime executable name (also the pattern used to kill it)
pub const DEFAULT_RUNTIME_EXEC: &str = "rt";
/// Port the controller streams snapshots on
pub const DEFAULT_STREAM_PORT: u16 = 10000;
/// Port the controller accepts commands on
pub const DEFAULT_COMMAND_PORT: u16 = 4321;

/// Registry id of the controller target
pub const CONTROLLER_TARGET_ID: &str = "ctl";

/// Delay between a controller launch and the one-shot connection check
pub const DEFAULT_START_GRACE_MS: u64 = 2_000;
/// Delay between distributing a description and probing for a running controller
pub const DEFAULT_ATTACH_GRACE_MS: u64 = 1_000;
/// Upper bound on establishing the controller stream
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;
/// Consecutive undecodable fragments tolerated before the buffer is discarded
pub const DEFAULT_MAX_DECODE_FAILURES: u32 = 5;
