//! cliprelay: a rendezvous server for clipboard sync.
//!
//! Two listeners share one piece of state. The HTTP session API creates
//! and confirms pairings between a desktop and a mobile device; the
//! WebSocket relay holds the live connections and forwards clipboard
//! updates between the members of each paired room.

pub mod config;
pub mod error;
mod handler;
mod http;
pub mod server;

pub use config::ServerConfig;
pub use error::CliprelayError;
pub use server::RelayServer;

/// Common imports for embedding or driving the server.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::error::CliprelayError;
    pub use crate::server::RelayServer;

    pub use cliprelay_protocol::{
        ClientMessage, DeviceId, PairingId, Role, RoomId, ServerMessage,
    };
    pub use cliprelay_session::{Claims, SessionError, TokenIssuer};
}
