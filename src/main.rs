// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use the_switchboard::config::{load_and_validate_config, ServiceConfig};
use the_switchboard::orchestrator::Orchestrator;
use the_switchboard::server::ObserverServer;
use the_switchboard::supervisor::SshShell;
use the_switchboard::traits::RemoteShell;

/// Control plane for a dataflow cluster: select a deployment, start and stop
/// the controller, scale units, and stream live state to observers.
#[derive(Debug, Parser)]
#[command(name = "switchboard", version)]
struct Args {
    /// YAML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the observer listen address (e.g. 0.0.0.0:8000).
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the deployment directory.
    #[arg(long)]
    dfg_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn load(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => load_and_validate_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listen_address = listen.clone();
    }
    if let Some(dir) = &args.dfg_dir {
        config.local_dfg_dir = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load(&args)?;
    tracing::info!(
        listen = %config.listen_address,
        dfg_dir = %config.local_dfg_dir.display(),
        ssh_user = %config.ssh.user,
        "Starting switchboard"
    );

    let shell: Arc<dyn RemoteShell> = Arc::new(SshShell::new(&config.ssh));
    let listen_address = config.listen_address.clone();
    let (orchestrator, handle) = Orchestrator::new(config, shell);
    let server = ObserverServer::bind(&listen_address, handle)
        .await
        .with_context(|| format!("binding observer server to {}", listen_address))?;

    let shutdown = CancellationToken::new();
    let orchestrator = tokio::spawn(orchestrator.run(shutdown.clone()));
    let server = tokio::spawn(server.serve(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested");
    shutdown.cancel();

    let _ = tokio::join!(server, orchestrator);
    Ok(())
}
