//! messenger-replay: rebuild the local store from the protocol service logs
//!
//! ## Architecture
//! ```text
//! [protocol service] --(gRPC: TCP or UDS)--> [messenger-replay] --> SQLite
//! ```
//!
//! ## Configuration
//! - `--config <path>` / REPLAY_CONFIG: configuration file (optional)
//! - REPLAY__PROTOCOL__ADDRESS: protocol service address
//! - REPLAY__STORAGE__PATH: SQLite database path
//! - REPLAY_LOG: log filter (default: info)
//!
//! Runs a single replay and exits. Ctrl+C aborts the replay in progress.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use messenger_replay::client::GrpcProtocolClient;
use messenger_replay::config::Config;
use messenger_replay::replay_logs_to_store;
use messenger_replay::storage::init_store;
use messenger_replay::utils::bootstrap::{init_tracing, parse_config_path};
use messenger_replay::utils::retry::connection_backoff;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let address = config.protocol.address.clone();
    let client = (|| {
        let a = address.clone();
        async move { GrpcProtocolClient::connect(&a).await }
    })
    .retry(connection_backoff())
    .notify(|err: &messenger_replay::client::ClientError, dur: Duration| {
        warn!(address = %address, error = %err, delay = ?dur, "Connection failed, retrying");
    })
    .await?;

    let store = init_store(&config.storage).await?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling replay");
            on_signal.cancel();
        }
    });

    match replay_logs_to_store(&cancel, Arc::new(client), Arc::new(store)).await {
        Ok(summary) => {
            info!(
                groups = summary.groups,
                metadata = summary.metadata_applied,
                messages = summary.messages_applied,
                "messenger-replay finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(kind = ?e.kind(), error = %e, "Replay failed");
            Err(e.into())
        }
    }
}
