//! Jigsync room server.
//!
//! Configured from `JIGSYNC_*` environment variables (see
//! [`ServerConfig::from_lookup`]); log output is filtered by `RUST_LOG`.

use jigsync::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), JigsyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        min_players = config.room.min_players,
        echo_progress = config.echo_progress,
        "starting jigsync"
    );

    let server = JigsyncServerBuilder::from_config(config).build().await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    }
}
