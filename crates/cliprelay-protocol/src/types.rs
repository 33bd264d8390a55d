//! Core wire types for the pairing and relay protocol.
//!
//! This module defines every structure that travels on the wire between
//! the server and its clients. The JSON shapes here are a contract with
//! the desktop and mobile clients: every message is an object of the form
//! `{"type": <snake_case tag>, "data": <payload>}` with camelCase payload
//! keys, and the tests below pin those shapes down.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a device.
///
/// Identifiers are opaque strings: mobile clients supply their own, and
/// desktop identities are derived from the pairing that created them.
/// The newtype keeps device, room, and pairing identifiers from being
/// mixed up in signatures even though all three are strings underneath.
///
/// `#[serde(transparent)]` serializes this as the bare inner string, so
/// a `DeviceId` appears in JSON as `"desktop-abc"`, not `{"0": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a relay room.
///
/// A room is the channel shared by one desktop and one mobile device
/// after a successful pairing. Allocated as a UUID at confirmation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a pending pairing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingId(pub String);

impl fmt::Display for PairingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of a pairing a device is on.
///
/// The role is embedded in session credentials and rendered lowercase in
/// JSON (`"desktop"` / `"mobile"`), matching what clients send and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Desktop,
    Mobile,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Desktop => write!(f, "desktop"),
            Role::Mobile => write!(f, "mobile"),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: pushes from server to client
// ---------------------------------------------------------------------------

/// Messages pushed from the server to a connected client.
///
/// `#[serde(tag = "type", content = "data")]` produces the adjacently
/// tagged wire form. For example [`ServerMessage::PairingWait`] becomes:
///
/// ```json
/// { "type": "pairing_wait", "data": { "pairingId": "...", "message": "..." } }
/// ```
///
/// Unit variants carry no `data` key, and [`ServerMessage::Error`] carries
/// a bare string as its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Sent to a pre-paired desktop connection after it registers as the
    /// waiter for a pairing id. The desktop holds the connection open and
    /// waits for [`ServerMessage::Paired`].
    PairingWait {
        pairing_id: PairingId,
        message: String,
    },

    /// Pushed to the waiting desktop connection when the mobile side
    /// confirms the pairing code. Carries both freshly minted credentials;
    /// the desktop keeps its own and may hand the mobile token off for
    /// display or recovery flows.
    Paired {
        desktop_token: String,
        mobile_token: String,
        room_id: RoomId,
        mobile_device_id: DeviceId,
    },

    /// A clipboard payload relayed from the other member of the room.
    /// `ts` is assigned by the server at broadcast time, in milliseconds
    /// since the Unix epoch.
    NewClipboard {
        text: String,
        from: DeviceId,
        ts: u64,
    },

    /// The room was torn down via the disconnect endpoint. Clients stop
    /// relaying when they receive this.
    Disconnected,

    /// Handshake or protocol failure. The server closes the connection
    /// right after sending this.
    Error(String),
}

// ---------------------------------------------------------------------------
// ClientMessage: messages from client to server
// ---------------------------------------------------------------------------

/// Messages sent by a client over an authenticated connection.
///
/// Same adjacently tagged wire form as [`ServerMessage`]. The server
/// ignores these on pre-paired connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// The device's local clipboard changed; relay `text` to the other
    /// member of the room.
    ClipboardUpdate { text: String },
}

// =========================================================================
// Tests
// =========================================================================
