// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::broadcast::{ObserverId, ObserverRequest, ServerEvent};
use crate::observability::messages::server::{
    HandshakeFailed, ObserverConnectionClosed, RequestUnreadable, ServerListening,
};
use crate::observability::messages::StructuredLog;
use crate::orchestrator::OrchestratorHandle;

/// Accepts observer WebSocket connections and bridges them to the
/// orchestrator.
///
/// Every frame in either direction is a JSON object `{"event": .., "data": ..}`.
/// Inbound frames are parsed as [`ObserverRequest`]; outbound frames are the
/// [`ServerEvent`]s queued for the observer.
pub struct ObserverServer {
    listener: TcpListener,
    handle: OrchestratorHandle,
}

impl ObserverServer {
    pub async fn bind(address: &str, handle: OrchestratorHandle) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, handle })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires. Open connections are sent a
    /// close frame on shutdown.
    pub async fn serve(self, shutdown: CancellationToken) {
        if let Ok(address) = self.local_addr() {
            ServerListening { address }.log();
        }
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let span = tracing::info_span!("observer", %peer);
                        tokio::spawn(
                            serve_observer(stream, peer, self.handle.clone(), shutdown.clone())
                                .instrument(span),
                        );
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to accept observer connection"),
                },
            }
        }
    }
}

async fn serve_observer(
    stream: TcpStream,
    peer: SocketAddr,
    handle: OrchestratorHandle,
    shutdown: CancellationToken,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            HandshakeFailed { peer, error: &e }.log();
            return;
        }
    };

    let (outbound, inbound) = mpsc::unbounded_channel();
    let observer = handle.connect_observer(outbound);
    tracing::info!(observer_id = observer, %peer, "Observer connected");

    let outcome = pump(ws, observer, inbound, &handle, &shutdown).await;
    handle.disconnect_observer(observer);
    ObserverConnectionClosed {
        observer_id: observer,
        peer,
        error: outcome.as_ref().err().map(|e| e as &dyn std::error::Error),
    }
    .log();
}

/// Move frames both ways until either side goes away.
async fn pump(
    ws: WebSocketStream<TcpStream>,
    observer: ObserverId,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
    handle: &OrchestratorHandle,
    shutdown: &CancellationToken,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
            event = outbound.recv() => match event {
                Some(event) => sink.send(Message::Text(encode(&event))).await?,
                // Orchestrator dropped the session.
                None => return Ok(()),
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ObserverRequest>(&text) {
                        Ok(request) => {
                            if !handle.request(observer, request) {
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            RequestUnreadable {
                                observer_id: observer,
                                raw: &text,
                                error: &e,
                            }
                            .log();
                            let reply = ServerEvent::error(format!("Unrecognized request: {}", e));
                            sink.send(Message::Text(encode(&reply))).await?;
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => sink.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
            },
        }
    }
}

fn encode(event: &ServerEvent) -> String {
    // A unit-variant tag and a JSON value always serialize.
    serde_json::to_string(event).unwrap_or_default()
}
