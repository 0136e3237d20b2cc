//! Per-connection task
//!
//! Each accepted WebSocket runs [`run_session`], which splits the socket
//! into two halves:
//!
//! 1. **Send loop** drains the connection's outbound queue (fed by fanout,
//!    error notifications and close requests) and writes frames.
//! 2. **Receive loop** reads frames and feeds them to the [`Session`].
//!
//! When either side ends, the session is finished exactly once, which
//! removes the connection from the registry.

use std::net::SocketAddr;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::context::SessionContext;
use super::state::{SessionPhase, SessionState, Transition};
use crate::error::ProtocolError;
use crate::protocol::{ClientMessage, CloseReason, Role, ServerMessage};
use crate::registry::{ClientHandle, ConnectionId, Outbound, Unregistered};

/// Whether the receive loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading frames
    Continue,
    /// Stop reading; the connection is being closed
    Stop,
}

/// Identification and lifecycle handling for one connection
///
/// Transport-agnostic: frames are fed in by [`run_session`], and anything
/// sent to the peer goes through the connection's outbound queue.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    handle: ClientHandle,
    ctx: SessionContext,
}

impl Session {
    /// Open a session
    ///
    /// Returns the session and the receiving half of its outbound queue.
    pub fn new(
        ctx: SessionContext,
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (handle, rx) = ClientHandle::new(id, peer_addr, ctx.outbound_capacity);
        ctx.stats.record_connection();

        tracing::debug!(conn = %id, peer = ?peer_addr, "Connection awaiting identification");

        let session = Self {
            state: SessionState::new(id, peer_addr),
            handle,
            ctx,
        };
        (session, rx)
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.state.id
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Handle an inbound text frame
    pub async fn on_text(&mut self, text: &str) -> Flow {
        let decoded = ClientMessage::decode(text);
        self.apply(decoded).await
    }

    /// Handle an inbound binary frame as UTF-8 JSON
    pub async fn on_binary(&mut self, bytes: &[u8]) -> Flow {
        let decoded = ClientMessage::decode_binary(bytes);
        self.apply(decoded).await
    }

    async fn apply(&mut self, decoded: Result<ClientMessage, ProtocolError>) -> Flow {
        let id = self.state.id;

        match self.state.next(&decoded) {
            Transition::Register(Role::Producer) => {
                let replaced = self
                    .ctx
                    .registry
                    .register_producer(self.handle.clone())
                    .await;
                if replaced.is_some() {
                    self.ctx.stats.record_replacement();
                }
                self.state.become_producer();
                Flow::Continue
            }
            Transition::Register(Role::Consumer) => {
                let consumer = self
                    .ctx
                    .registry
                    .register_consumer(self.handle.clone())
                    .await;
                self.state.become_consumer(consumer);
                Flow::Continue
            }
            Transition::Reject(reason) => {
                self.state.reject();
                tracing::warn!(
                    conn = %id,
                    message = ?decoded.ok(),
                    reason = %reason,
                    attempts = self.state.rejected_attempts,
                    "Identification rejected"
                );
                self.notify_error(reason);
                Flow::Continue
            }
            Transition::Violation => {
                if let Err(e) = decoded {
                    tracing::error!(conn = %id, error = %e, "Malformed identification message");
                }
                self.ctx.stats.record_protocol_violation();
                self.handle.close(CloseReason::PROTOCOL_VIOLATION);
                Flow::Stop
            }
            Transition::Ignore => {
                tracing::trace!(conn = %id, phase = ?self.state.phase, "Ignoring message");
                Flow::Continue
            }
        }
    }

    fn notify_error(&self, message: String) {
        let text = match ServerMessage::error(message).to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(conn = %self.state.id, error = %e, "Failed to encode error message");
                return;
            }
        };

        if let Err(e) = self.handle.try_send_text(Utf8Bytes::from(text)) {
            tracing::debug!(conn = %self.state.id, error = %e, "Could not queue error message");
        }
    }

    /// End the session and release its registry slot
    ///
    /// Consumes the session so unregistration happens once.
    pub async fn finish(mut self) -> Unregistered {
        let id = self.state.id;
        let duration = self.state.duration();
        let registry = &self.ctx.registry;

        let released = match self.state.close() {
            SessionPhase::Consumer(consumer) => {
                if registry.remove_consumer(consumer, id).await {
                    Unregistered::Consumer(consumer)
                } else {
                    registry.unregister(&self.handle).await
                }
            }
            _ => registry.unregister(&self.handle).await,
        };

        match released {
            Unregistered::Producer => {
                tracing::info!(conn = %id, duration_secs = duration.as_secs(), "Producer disconnected");
            }
            Unregistered::Consumer(consumer) => {
                let total = registry.consumer_count().await;
                tracing::info!(
                    conn = %id,
                    consumer = %consumer,
                    total = total,
                    "Consumer disconnected"
                );
            }
            Unregistered::NotRegistered => {
                tracing::debug!(
                    conn = %id,
                    rejected_attempts = self.state.rejected_attempts,
                    "Connection closed without identifying"
                );
            }
        }

        released
    }
}

/// Drive one WebSocket connection to completion
pub async fn run_session(
    socket: WebSocket,
    ctx: SessionContext,
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
) {
    let send_timeout = ctx.send_timeout;
    let (mut session, rx) = Session::new(ctx, id, peer_addr);

    let (ws_sender, mut ws_receiver) = socket.split();
    let mut send_task = tokio::spawn(send_loop(ws_sender, rx, id, send_timeout));
    let mut send_done = false;

    loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                if recv_frame(&mut session, frame).await == Flow::Stop {
                    break;
                }
            }
            _ = &mut send_task => {
                send_done = true;
                break;
            }
        }
    }

    session.finish().await;

    // All queue senders are gone once the registry and session release
    // their handles, so the send loop flushes and exits.
    if !send_done {
        match tokio::time::timeout(send_timeout, &mut send_task).await {
            Ok(_) => {}
            Err(_) => {
                tracing::debug!(conn = %id, "Send loop did not drain in time");
                send_task.abort();
            }
        }
    }
}

async fn recv_frame(
    session: &mut Session,
    frame: Option<Result<Message, axum::Error>>,
) -> Flow {
    let id = session.id();

    match frame {
        Some(Ok(Message::Text(text))) => session.on_text(text.as_str()).await,
        Some(Ok(Message::Binary(bytes))) => session.on_binary(&bytes).await,
        Some(Ok(Message::Close(frame))) => {
            match frame {
                Some(CloseFrame { code, reason }) => tracing::debug!(
                    conn = %id,
                    code = code,
                    reason = %reason.as_str(),
                    "Peer closed connection"
                ),
                None => tracing::debug!(conn = %id, "Peer closed connection"),
            }
            Flow::Stop
        }
        // Ping/pong frames are answered by axum
        Some(Ok(_)) => Flow::Continue,
        Some(Err(e)) => {
            tracing::warn!(conn = %id, error = %e, "WebSocket error");
            Flow::Stop
        }
        None => Flow::Stop,
    }
}

async fn send_loop(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    id: ConnectionId,
    send_timeout: std::time::Duration,
) {
    while let Some(item) = rx.recv().await {
        let (message, last) = match item {
            Outbound::Text(text) => (Message::Text(text), false),
            Outbound::Close(reason) => {
                tracing::debug!(conn = %id, reason = %reason, "Closing connection");
                let frame = CloseFrame {
                    code: reason.code,
                    reason: Utf8Bytes::from(reason.reason),
                };
                (Message::Close(Some(frame)), true)
            }
        };

        match tokio::time::timeout(send_timeout, ws_sender.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn = %id, error = %e, "Send failed, closing");
                break;
            }
            Err(_) => {
                tracing::warn!(conn = %id, "Send timed out, closing");
                break;
            }
        }

        if last {
            break;
        }
    }
}
