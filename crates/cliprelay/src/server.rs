//! The relay server: shared state, both listeners, and the accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use cliprelay_protocol::JsonCodec;
use cliprelay_room::RoomRegistry;
use cliprelay_session::{PairingRegistry, TokenIssuer};
use cliprelay_transport::WebSocketTransport;

use crate::config::ServerConfig;
use crate::error::CliprelayError;
use crate::{handler, http};

/// State shared by the session API and every relay connection task.
///
/// The two registries sit behind their own locks; nothing ever holds both
/// at once, and no I/O happens under either.
pub(crate) struct ServerState {
    pub(crate) pairings: Mutex<PairingRegistry>,
    pub(crate) rooms: Mutex<RoomRegistry>,
    pub(crate) issuer: TokenIssuer,
    pub(crate) codec: JsonCodec,
}

/// The assembled server: an HTTP listener for the session API and a
/// WebSocket listener for relay connections.
pub struct RelayServer {
    state: Arc<ServerState>,
    http_listener: TcpListener,
    transport: WebSocketTransport,
}

impl RelayServer {
    /// Binds both listeners. Nothing is served until [`run`](Self::run).
    pub async fn bind(config: ServerConfig) -> Result<Self, CliprelayError> {
        let state = Arc::new(ServerState {
            pairings: Mutex::new(PairingRegistry::with_ttl(config.pairing_ttl)),
            rooms: Mutex::new(RoomRegistry::new()),
            issuer: TokenIssuer::new(&config.secret),
            codec: JsonCodec,
        });

        let http_listener = TcpListener::bind(&config.http_addr).await?;
        tracing::info!(addr = %config.http_addr, "session api listening");
        let transport = WebSocketTransport::bind(&config.relay_addr).await?;

        Ok(Self {
            state,
            http_listener,
            transport,
        })
    }

    /// The address the session API actually bound to.
    pub fn http_addr(&self) -> io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    /// The address the relay listener actually bound to.
    pub fn relay_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The session API router, backed by this server's live state.
    ///
    /// Useful for driving the HTTP surface in-process while the relay
    /// listener serves real sockets.
    pub fn router(&self) -> Router {
        http::router(self.state.clone())
    }

    /// Serves both listeners until the task is aborted.
    ///
    /// Each accepted relay connection runs in its own task; a failed
    /// accept is logged and the loop keeps going.
    pub async fn run(mut self) -> Result<(), CliprelayError> {
        let router = http::router(self.state.clone());
        let http_listener = self.http_listener;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, router).await {
                tracing::error!(error = %e, "session api exited");
            }
        });

        loop {
            match self.transport.accept().await {
                Ok(connection) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        handler::handle_connection(state, connection).await;
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "relay accept failed");
                }
            }
        }
    }
}
