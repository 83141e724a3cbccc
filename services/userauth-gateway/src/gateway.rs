//! WebSocket connection loop
//!
//! Thin dispatch between one socket and its `SessionCoordinator`. The loop
//! multiplexes three sources:
//! 1. inbound frames, decoded and handed to the coordinator
//! 2. completion of the in-flight token request (credential or error)
//! 3. envelopes the coordinator queued for the peer (challenges)
//!
//! Frames from one socket are handled strictly in order. When the socket
//! closes the coordinator is dropped, which cancels any pending challenge.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use hub_protocol::{ProtocolError, ServerMessage};
use hub_session::{SessionContext, SessionCoordinator};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span};

/// Envelopes a session may queue before the loop drains them. A session
/// never has more than one challenge outstanding.
const OUTBOUND_CAPACITY: usize = 4;

/// Counters reported on `/health`.
#[derive(Clone)]
pub struct GatewayStats {
    pub connections_active: Arc<AtomicU64>,
    pub challenges_issued: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            connections_active: Arc::new(AtomicU64::new(0)),
            challenges_issued: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// One reserved socket slot. Keeps the active-connection count and gauge in
/// step with the socket's life; the slot is released on drop.
pub struct ConnectionGuard {
    active: Arc<AtomicU64>,
}

impl ConnectionGuard {
    /// Reserve a slot unless `max` sockets are already open.
    ///
    /// The check and the increment are one atomic step, so concurrent
    /// upgrades cannot overshoot the limit.
    pub fn try_acquire(stats: &GatewayStats, max: u64) -> Option<Self> {
        stats
            .connections_active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()?;
        crate::metrics::connection_opened();
        Some(Self {
            active: stats.connections_active.clone(),
        })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        crate::metrics::connection_closed();
    }
}

/// Serve one upgraded socket until it closes, holding its reserved slot.
pub async fn serve_connection(
    socket: WebSocket,
    context: Arc<SessionContext>,
    stats: GatewayStats,
    guard: ConnectionGuard,
) {
    let conn_id = format!("conn_{}", uuid::Uuid::new_v4().as_simple());
    run(socket, context, stats, guard)
        .instrument(info_span!("connection", %conn_id))
        .await
}

async fn run(
    mut socket: WebSocket,
    context: Arc<SessionContext>,
    stats: GatewayStats,
    _guard: ConnectionGuard,
) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);
    let mut session = SessionCoordinator::new(context, outbound_tx);
    info!("connection opened");

    loop {
        let reply = tokio::select! {
            frame = socket.recv() => match frame {
                Some(Ok(Message::Text(text))) => session.handle_frame(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => session.handle_frame(text),
                    Err(e) => Some(ServerMessage::error(ProtocolError::Malformed(format!(
                        "binary frame is not UTF-8: {e}"
                    )))),
                },
                Some(Ok(Message::Close(_))) | None => break,
                // ping/pong are answered by the transport
                Some(Ok(_)) => None,
                Some(Err(e)) => {
                    debug!(error = %e, "socket receive failed");
                    break;
                }
            },
            done = session.completion() => Some(done),
            Some(message) = outbound_rx.recv() => {
                if matches!(message, ServerMessage::Challenge { .. }) {
                    stats.challenges_issued.fetch_add(1, Ordering::Relaxed);
                }
                Some(message)
            }
        };

        if let Some(message) = reply {
            if !send(&mut socket, &message).await {
                break;
            }
        }
    }

    info!(state = session.state().label(), "connection closed");
}

/// Returns false when the socket is no longer writable.
async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let frame = match message.encode() {
        Ok(frame) => frame,
        Err(e) => {
            error!(kind = message.kind(), error = %e, "failed to encode envelope");
            return true;
        }
    };
    debug!(kind = message.kind(), "sending envelope");
    match socket.send(Message::Text(frame.into())).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "socket send failed");
            false
        }
    }
}
