//! WebSocket session driver.
//!
//! Splits an upgraded socket into a read loop and a write loop, each spawned
//! as its own task. The loops share only the connection's send queue, its
//! atomic state and its cancellation token:
//!
//! - the read loop forwards inbound messages to the room's broadcast;
//! - the write loop drains the send queue and keeps the peer alive with
//!   pings.
//!
//! Either loop failing closes the connection, which cancels the other. Every
//! transport read and write is bounded by a deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;

use super::messages::{close_message, normal_close, parse_inbound};
use crate::config::RelayConfig;
use crate::domain::{Connection, ControlEvent, Frame, Room, RoomId};
use crate::error::RelayError;
use crate::service::Admission;

/// Transport deadlines applied to every session.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Close the session if nothing is read for this long.
    pub read_timeout: Duration,
    /// Deadline for one transport write.
    pub write_timeout: Duration,
    /// Interval between keep-alive pings.
    pub ping_interval: Duration,
}

impl From<&RelayConfig> for SessionSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            ping_interval: config.ping_interval,
        }
    }
}

/// Drives a joined connection until it closes, then leaves the room.
///
/// Returns only after both loops have terminated and the connection has
/// reached its terminal state.
pub async fn run_session(socket: WebSocket, admission: Admission, settings: SessionSettings) {
    let Admission { room, connection } = admission;
    let (ws_tx, ws_rx) = socket.split();

    let writer = tokio::spawn(write_loop(ws_tx, Arc::clone(&connection), settings));
    let reader = tokio::spawn(read_loop(
        ws_rx,
        Arc::clone(&room),
        Arc::clone(&connection),
        settings.read_timeout,
    ));

    let (read_result, write_result) = tokio::join!(reader, writer);
    if let Err(err) = read_result {
        tracing::warn!(connection_id = %connection.id(), error = %err, "read loop aborted");
    }
    if let Err(err) = write_result {
        tracing::warn!(connection_id = %connection.id(), error = %err, "write loop aborted");
    }

    // A loop that panicked never closed the connection.
    connection.close("session ended").await;
    room.leave(connection.id()).await;
    connection.mark_closed();

    tracing::debug!(
        connection_id = %connection.id(),
        room_id = %room.id(),
        "ws connection closed"
    );
}

/// Reports a failed join to the client and closes the socket.
pub async fn reject(
    mut socket: WebSocket,
    room_id: &RoomId,
    err: &RelayError,
    write_timeout: Duration,
) {
    let frame = Frame::control(&ControlEvent::JoinRejected {
        room_id: room_id.clone(),
        code: err.error_code(),
        message: err.to_string(),
    });
    let sent = tokio::time::timeout(write_timeout, socket.send(Message::text(frame.to_json())))
        .await;
    if !matches!(sent, Ok(Ok(()))) {
        tracing::debug!(%room_id, "could not deliver join rejection");
        return;
    }
    let _ = tokio::time::timeout(
        write_timeout,
        socket.send(close_message(err.close_code(), &err.to_string())),
    )
    .await;
}

/// Reads inbound messages and relays them to the room in arrival order.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    room: Arc<Room>,
    connection: Arc<Connection>,
    read_timeout: Duration,
) {
    let cancel = connection.cancel_token().clone();
    let reason = loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break "cancelled",
            next = tokio::time::timeout(read_timeout, ws_rx.next()) => next,
        };
        let message = match next {
            Err(_) => break "read timeout",
            Ok(None) => break "transport closed",
            Ok(Some(Err(err))) => {
                let err = RelayError::TransportError(err.to_string());
                tracing::debug!(connection_id = %connection.id(), error = %err, "ws read failed");
                break "read failed";
            }
            Ok(Some(Ok(message))) => message,
        };
        match message {
            Message::Text(text) => {
                let frame = Frame::data(connection.role(), parse_inbound(text.as_str()));
                tokio::select! {
                    () = cancel.cancelled() => break "cancelled",
                    _ = room.broadcast(connection.id(), frame) => {}
                }
            }
            Message::Close(_) => break "client closed",
            Message::Binary(bytes) => {
                tracing::debug!(connection_id = %connection.id(), len = bytes.len(), "ignoring binary message");
            }
            // Pings are answered by the transport; any traffic resets the deadline.
            Message::Ping(_) | Message::Pong(_) => {}
        }
    };
    connection.close(reason).await;
}

/// Drains the send queue to the transport and pings the peer.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    connection: Arc<Connection>,
    settings: SessionSettings,
) {
    let cancel = connection.cancel_token().clone();
    let mut ping = tokio::time::interval(settings.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    let mut healthy = true;
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = connection.queue().pop() => match frame {
                Some(frame) => Message::text(frame.to_json()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Default::default()),
        };
        if let Err(err) = send_with_deadline(&mut ws_tx, message, settings.write_timeout).await {
            tracing::debug!(connection_id = %connection.id(), error = %err, "ws write failed");
            connection.close(&err.to_string()).await;
            healthy = false;
            break;
        }
    }

    if healthy {
        // Control frames (e.g. room_closed) queued before cancellation still go out.
        for frame in connection
            .queue()
            .drain()
            .await
            .into_iter()
            .filter(Frame::is_control)
        {
            let message = Message::text(frame.to_json());
            if send_with_deadline(&mut ws_tx, message, settings.write_timeout)
                .await
                .is_err()
            {
                healthy = false;
                break;
            }
        }
    }
    if healthy {
        let _ = send_with_deadline(
            &mut ws_tx,
            normal_close("connection closed"),
            settings.write_timeout,
        )
        .await;
    }
    let _ = tokio::time::timeout(settings.write_timeout, ws_tx.close()).await;
}

async fn send_with_deadline(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
) -> Result<(), RelayError> {
    match tokio::time::timeout(deadline, ws_tx.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(RelayError::TransportError(err.to_string())),
        Err(_) => Err(RelayError::TransportError(format!(
            "write timed out after {deadline:?}"
        ))),
    }
}
