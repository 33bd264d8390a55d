//! Relay connection lifecycle.
//!
//! Every accepted WebSocket is classified once, from its handshake query
//! string, and then served until it goes away. A `token` parameter makes
//! it an authenticated room member; a `pairingId` parameter makes it a
//! desktop waiting for its pairing to be confirmed; anything else is
//! rejected. When both are present, the token decides.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::sync::mpsc;

use cliprelay_protocol::{ClientMessage, Codec, DeviceId, PairingId, RoomId, ServerMessage};
use cliprelay_session::Claims;
use cliprelay_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::server::ServerState;

/// Query parameters recognized on the relay handshake URL.
///
/// Clients also send `role=`, but classification never reads it: the role
/// is already inside the token, and a pairing wait is always the desktop.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeParams {
    token: Option<String>,
    pairing_id: Option<String>,
}

fn parse_params(query: Option<&str>) -> HandshakeParams {
    query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default()
}

/// Serves one relay connection from classification to teardown.
pub(crate) async fn handle_connection(state: Arc<ServerState>, connection: WebSocketConnection) {
    let params = parse_params(connection.handshake_query());

    // Empty `token=` or `pairingId=` values count as absent, the same as
    // omitting the parameter entirely.
    let token = params.token.filter(|t| !t.is_empty());
    let pairing_id = params.pairing_id.filter(|p| !p.is_empty());

    if let Some(token) = token {
        match state.issuer.verify(&token) {
            Ok(claims) => serve_room_member(&state, &connection, claims).await,
            Err(e) => send_error(&state, &connection, &e.to_string()).await,
        }
    } else if let Some(id) = pairing_id {
        serve_pairing_wait(&state, &connection, PairingId(id)).await;
    } else {
        send_error(&state, &connection, "missing token or pairingId").await;
    }

    if let Err(e) = connection.close().await {
        tracing::debug!(id = %connection.id(), error = %e, "close failed");
    }
    tracing::debug!(id = %connection.id(), "connection finished");
}

/// Holds a desktop connection open until its pairing is confirmed.
///
/// The registry keeps one waiter per pairing, so a desktop reconnect
/// simply replaces the previous connection; the replaced one notices its
/// push channel closing and winds down. Anything the client sends while
/// waiting is ignored.
async fn serve_pairing_wait(
    state: &Arc<ServerState>,
    connection: &WebSocketConnection,
    pairing_id: PairingId,
) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let attached = {
        let mut pairings = state.pairings.lock().await;
        pairings.attach_waiter(&pairing_id, tx)
    };
    if let Err(e) = attached {
        send_error(state, connection, &e.to_string()).await;
        return;
    }

    let wait = ServerMessage::PairingWait {
        pairing_id: pairing_id.clone(),
        message: "waiting for mobile to confirm pairing".to_string(),
    };
    if !send_message(state, connection, &wait).await {
        return;
    }
    tracing::info!(id = %connection.id(), %pairing_id, "desktop waiting for pairing confirmation");

    loop {
        tokio::select! {
            pushed = rx.recv() => {
                match pushed {
                    Some(message) => {
                        if !send_message(state, connection, &message).await {
                            return;
                        }
                    }
                    // Pairing resolved or waiter replaced; either way this
                    // connection's job is over.
                    None => return,
                }
            }
            inbound = connection.recv() => {
                match inbound {
                    Ok(Some(_)) => {}
                    Ok(None) => return,
                    Err(e) => {
                        tracing::debug!(id = %connection.id(), error = %e, "recv failed during pairing wait");
                        return;
                    }
                }
            }
        }
    }
}

/// Serves an authenticated device as a member of its room.
async fn serve_room_member(
    state: &Arc<ServerState>,
    connection: &WebSocketConnection,
    claims: Claims,
) {
    let device_id = claims.device_id.clone();
    let credential_room = claims.room.clone();
    let connection_id = connection.id();

    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let mut rooms = state.rooms.lock().await;
        rooms.join(
            device_id.clone(),
            connection_id,
            credential_room.clone(),
            tx,
        );
    }
    let _guard = MembershipGuard {
        state: state.clone(),
        device_id: device_id.clone(),
        connection_id,
    };
    tracing::info!(
        id = %connection_id,
        %device_id,
        room_id = %credential_room,
        role = %claims.role,
        "device connected"
    );

    loop {
        tokio::select! {
            pushed = rx.recv() => {
                match pushed {
                    Some(message) => {
                        if !send_message(state, connection, &message).await {
                            return;
                        }
                    }
                    // A newer connection for this device superseded us.
                    None => return,
                }
            }
            inbound = connection.recv() => {
                match inbound {
                    Ok(Some(data)) => {
                        handle_client_data(state, &device_id, &credential_room, &data).await;
                    }
                    Ok(None) => return,
                    Err(e) => {
                        tracing::debug!(id = %connection_id, error = %e, "recv failed");
                        return;
                    }
                }
            }
        }
    }
}

/// One inbound frame from an authenticated device.
async fn handle_client_data(
    state: &ServerState,
    device_id: &DeviceId,
    credential_room: &RoomId,
    data: &[u8],
) {
    let message: ClientMessage = match state.codec.decode(data) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(%device_id, error = %e, "undecodable client frame dropped");
            return;
        }
    };

    match message {
        ClientMessage::ClipboardUpdate { text } => {
            let rooms = state.rooms.lock().await;
            let Some(live_room) = rooms.assigned_room(device_id) else {
                tracing::warn!(%device_id, "clipboard from device with no live membership");
                return;
            };
            // The room a device may post into is its live one. A stale
            // credential naming some other room gets dropped, not rerouted.
            if live_room != *credential_room {
                tracing::warn!(
                    %device_id,
                    credential_room = %credential_room,
                    %live_room,
                    "device-room mismatch, dropping clipboard update"
                );
                return;
            }

            let push = ServerMessage::NewClipboard {
                text,
                from: device_id.clone(),
                ts: now_millis(),
            };
            let delivered = rooms.broadcast_from(&live_room, device_id, &push);
            tracing::debug!(%device_id, room_id = %live_room, delivered, "clipboard relayed");
        }
    }
}

/// Removes the device's membership when the serving task winds down,
/// unless a newer connection has already superseded it.
struct MembershipGuard {
    state: Arc<ServerState>,
    device_id: DeviceId,
    connection_id: ConnectionId,
}

impl Drop for MembershipGuard {
    fn drop(&mut self) {
        let state = self.state.clone();
        let device_id = self.device_id.clone();
        let connection_id = self.connection_id;
        tokio::spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if rooms.leave(&device_id, connection_id) {
                tracing::info!(%device_id, "device disconnected");
            }
        });
    }
}

/// Encodes and sends one message; returns `false` when the connection is
/// no longer usable.
async fn send_message(
    state: &ServerState,
    connection: &WebSocketConnection,
    message: &ServerMessage,
) -> bool {
    let bytes = match state.codec.encode(message) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode server message");
            return false;
        }
    };
    if let Err(e) = connection.send(&bytes).await {
        tracing::debug!(id = %connection.id(), error = %e, "send failed");
        return false;
    }
    true
}

/// Pushes a protocol error to the client. The connection is closed by the
/// caller afterwards.
async fn send_error(state: &ServerState, connection: &WebSocketConnection, reason: &str) {
    tracing::info!(id = %connection.id(), reason, "rejecting connection");
    send_message(state, connection, &ServerMessage::Error(reason.to_string())).await;
}

/// Milliseconds since the UNIX epoch, for clipboard timestamps.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
