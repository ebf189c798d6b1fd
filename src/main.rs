//! sharevote peer binary
//!
//! Hosts the chaincode over TCP. Flags: `--bind`, `--wal`, `--max-connections`.

use sharevote::{PeerConfig, Result, ShareVotePeer};
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = PeerConfig::from_args(env::args().skip(1))?;

    let peer = Arc::new(ShareVotePeer::new(config).await?);

    // Setup graceful shutdown on SIGINT (Ctrl+C)
    let peer_clone = Arc::clone(&peer);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }

        info!("received Ctrl+C, initiating graceful shutdown");
        if let Err(e) = peer_clone.shutdown() {
            error!(error = %e, "failed to initiate shutdown");
        }
    });

    peer.run().await?;

    Ok(())
}
