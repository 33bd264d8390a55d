//! Wire protocol for cliprelay.
//!
//! This crate defines the language the server and its clients speak:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], the identifier
//!   newtypes) matching the JSON contract with the desktop and mobile
//!   clients.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) converting those messages
//!   to and from bytes.
//! - **Errors** ([`ProtocolError`]) for encode and decode failures.
//!
//! The protocol layer sits between transport (raw frames) and session
//! (device identity). It knows nothing about connections, pairings, or
//! rooms; it only serializes and deserializes messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, DeviceId, PairingId, Role, RoomId, ServerMessage};
