// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures_util::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::{ClusterConfig, LinkConfig};
use crate::controller::decoder::StreamDecoder;
use crate::errors::LinkError;
use crate::graph::DeploymentGraph;
use crate::observability::messages::controller::{
    CommandChannelUnavailable, CommandSent, ControllerConnected, ControllerStreamEnded,
    LinkInitialized,
};
use crate::observability::messages::StructuredLog;

const READ_CHUNK: usize = 8 * 1024;

/// Receives what arrives on the controller stream.
///
/// Callbacks run on the link's reader task, one at a time and in arrival
/// order. They must not block.
pub trait LinkHandler: Send + Sync + 'static {
    fn on_snapshot(&self, graph: DeploymentGraph);

    /// The established stream failed. The link is back to uninitialized.
    fn on_error(&self, error: LinkError);

    /// The controller closed the stream. The link is back to uninitialized.
    fn on_close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Uninitialized,
    Initializing,
    Connected,
}

/// Endpoints, handler and sockets of one `initialize` call. A fresh
/// session per call means a reader task left over from a previous session
/// can only ever touch its own, already abandoned, session.
struct LinkSession {
    stream_address: String,
    command_address: String,
    handler: Arc<dyn LinkHandler>,
    state: watch::Sender<LinkState>,
    command: Mutex<Option<TcpStream>>,
    /// Serializes `connect` calls so one session never gets two readers.
    connect_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl LinkSession {
    fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Tear down without notifying the handler.
    fn abandon(&self) {
        self.cancel.cancel();
        self.state.send_replace(LinkState::Uninitialized);
    }
}

/// The single privileged connection to the cluster controller: a streaming
/// channel carrying live snapshots and a command channel for scale requests.
///
/// Every operation that touches the network returns a `'static` future so
/// callers can run it on its own task.
pub struct ControllerLink {
    stream_port: u16,
    command_port: u16,
    connect_timeout: Duration,
    max_decode_failures: u32,
    session: Option<Arc<LinkSession>>,
}

impl ControllerLink {
    pub fn new(cluster: &ClusterConfig, link: &LinkConfig) -> Self {
        Self {
            stream_port: cluster.stream_port,
            command_port: cluster.command_port,
            connect_timeout: link.connect_timeout(),
            max_decode_failures: link.max_decode_failures,
            session: None,
        }
    }

    /// Arm the link for the controller at `host`. Replaces any previous
    /// session, dropping its sockets without firing its callbacks.
    pub fn initialize(&mut self, host: &str, handler: Arc<dyn LinkHandler>) {
        let stream_address = format!("{}:{}", host, self.stream_port);
        let replaced = match self.session.take() {
            Some(previous) => {
                previous.abandon();
                true
            }
            None => false,
        };
        LinkInitialized {
            address: &stream_address,
            replaced,
        }
        .log();

        let (state, _) = watch::channel(LinkState::Initializing);
        self.session = Some(Arc::new(LinkSession {
            stream_address,
            command_address: format!("{}:{}", host, self.command_port),
            handler,
            state,
            command: Mutex::new(None),
            connect_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        }));
    }

    pub fn state(&self) -> LinkState {
        self.session
            .as_ref()
            .map_or(LinkState::Uninitialized, |session| session.state())
    }

    pub fn is_initialized(&self) -> bool {
        self.state() != LinkState::Uninitialized
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Open the streaming channel, then the command channel.
    ///
    /// Resolves once the stream is established; a failure to open the
    /// command channel is logged and leaves scale commands unavailable. After
    /// this resolves, stream failure and closure are reported through the
    /// handler.
    pub fn connect(&self) -> BoxFuture<'static, Result<(), LinkError>> {
        let session = match &self.session {
            Some(session) if session.state() != LinkState::Uninitialized => Arc::clone(session),
            _ => return future::ready(Err(LinkError::NotInitialized)).boxed(),
        };
        if session.state() == LinkState::Connected {
            return future::ready(Ok(())).boxed();
        }
        let connect_timeout = self.connect_timeout;
        let max_decode_failures = self.max_decode_failures;

        async move {
            let _connecting = session.connect_lock.lock().await;
            if session.state() == LinkState::Connected {
                return Ok(());
            }
            let stream = open(&session.stream_address, connect_timeout).await?;
            let command = match open(&session.command_address, connect_timeout).await {
                Ok(command) => Some(command),
                Err(e) => {
                    CommandChannelUnavailable {
                        address: &session.command_address,
                        error: &e,
                    }
                    .log();
                    None
                }
            };

            if session.cancel.is_cancelled() {
                // Re-initialized or closed while we were connecting.
                return Err(LinkError::NotInitialized);
            }

            ControllerConnected {
                address: &session.stream_address,
                command_channel: command.is_some(),
            }
            .log();
            *session.command.lock().await = command;
            session.state.send_replace(LinkState::Connected);

            let (reader, writer) = stream.into_split();
            tokio::spawn(read_stream(Arc::clone(&session), reader, writer, max_decode_failures));
            Ok(())
        }
        .boxed()
    }

    /// Write one command line to the controller. Resolves once the bytes are
    /// handed to the transport.
    pub fn send_command(&self, text: &str) -> BoxFuture<'static, Result<(), LinkError>> {
        let session = match &self.session {
            Some(session) => Arc::clone(session),
            None => return future::ready(Err(LinkError::NotInitialized)).boxed(),
        };
        let line = format!("{}\n", text.trim_end());

        async move {
            let mut command = session.command.lock().await;
            let channel = command.as_mut().ok_or(LinkError::CommandChannelClosed)?;
            let written = async {
                channel.write_all(line.as_bytes()).await?;
                channel.flush().await
            }
            .await;
            match written {
                Ok(()) => {
                    CommandSent { command: line.trim_end() }.log();
                    Ok(())
                }
                Err(e) => {
                    *command = None;
                    Err(LinkError::Send(e))
                }
            }
        }
        .boxed()
    }

    /// Drop the current session, if any, without firing its callbacks.
    pub fn close_connection(&mut self) {
        if let Some(session) = self.session.take() {
            session.abandon();
        }
    }
}

async fn open(address: &str, connect_timeout: Duration) -> Result<TcpStream, LinkError> {
    match tokio::time::timeout(connect_timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(LinkError::Connect {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(LinkError::Connect {
            address: address.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        }),
    }
}

/// Reader task for one session. Holds the write half only to keep the
/// socket open in both directions.
async fn read_stream(
    session: Arc<LinkSession>,
    mut reader: OwnedReadHalf,
    _writer: tokio::net::tcp::OwnedWriteHalf,
    max_decode_failures: u32,
) {
    let mut decoder = StreamDecoder::new(max_decode_failures);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let read = tokio::select! {
            _ = session.cancel.cancelled() => return,
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                ControllerStreamEnded {
                    address: &session.stream_address,
                    error: None,
                }
                .log();
                end_session(&session).await;
                session.handler.on_close();
                return;
            }
            Ok(n) => {
                for graph in decoder.push(&chunk[..n]) {
                    if session.cancel.is_cancelled() {
                        return;
                    }
                    session.handler.on_snapshot(graph);
                }
            }
            Err(e) => {
                ControllerStreamEnded {
                    address: &session.stream_address,
                    error: Some(&e),
                }
                .log();
                end_session(&session).await;
                session.handler.on_error(LinkError::Stream(e));
                return;
            }
        }
    }
}

async fn end_session(session: &LinkSession) {
    session.abandon();
    session.command.lock().await.take();
}
