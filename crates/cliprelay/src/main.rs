//! cliprelay server binary.

use cliprelay::{CliprelayError, RelayServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CliprelayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let server = RelayServer::bind(config).await?;
    tracing::info!(
        http = %server.http_addr()?,
        relay = %server.relay_addr()?,
        "cliprelay up"
    );

    server.run().await
}
