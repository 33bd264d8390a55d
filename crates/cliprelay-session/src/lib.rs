//! Session credentials and pairing lifecycle for cliprelay.
//!
//! This crate owns the identity half of the server:
//!
//! 1. **Credentials**: [`TokenIssuer`] mints and verifies the signed
//!    tokens that bind a device to its role and room.
//! 2. **Pairing**: [`PairingRegistry`] tracks short-lived pairing
//!    requests from creation through confirmation or expiry, and pushes
//!    the `paired` notification to the waiting desktop connection.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)      uses verified identity to place connections
//! Session layer (this)    proves who a device is and pairs devices
//! Protocol layer (below)  provides DeviceId, RoomId, message types
//! ```

mod error;
mod pairing;
mod token;

pub use error::SessionError;
pub use pairing::{PairingGrant, PairingOffer, PairingRegistry, PAIRING_TTL};
pub use token::{Claims, TokenIssuer, TOKEN_VALIDITY};

use cliprelay_protocol::ServerMessage;
use tokio::sync::mpsc;

/// Sending half of a connection's push channel.
///
/// Each connection task drains its own receiver, so pushing through one
/// of these never blocks on another connection's socket. The pairing
/// registry holds one per waiting desktop; the room layer holds one per
/// member.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;
