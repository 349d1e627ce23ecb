//! Transport layer for reaching the protocol service.
//!
//! Supports:
//! - TCP: remote service (`host:port`, `http://host:port`)
//! - UDS: service running as a local process (`/path/to.sock`, `./to.sock`)

#[cfg(unix)]
use std::path::PathBuf;

#[cfg(unix)]
use hyper_util::rt::TokioIo;
#[cfg(unix)]
use tokio::net::UnixStream;
use tonic::transport::Channel;
#[cfg(unix)]
use tonic::transport::{Endpoint, Uri};
#[cfg(unix)]
use tower::service_fn;
use tracing::info;

use crate::client::ClientError;

/// How an address string is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp(String),
    Uds(String),
}

impl Target {
    /// Classify `address`: paths are Unix sockets, everything else is TCP.
    pub fn parse(address: &str) -> Self {
        if address.starts_with('/') || address.starts_with("./") {
            Target::Uds(address.to_string())
        } else if address.starts_with("http://") || address.starts_with("https://") {
            Target::Tcp(address.to_string())
        } else {
            Target::Tcp(format!("http://{}", address))
        }
    }
}

/// Connect to a gRPC service at the given address.
pub async fn connect_to_address(address: &str) -> Result<Channel, ClientError> {
    match Target::parse(address) {
        #[cfg(unix)]
        Target::Uds(path) => {
            let socket_path = PathBuf::from(path);
            info!(
                path = %socket_path.display(),
                transport = "uds",
                "Connecting to service"
            );

            // The URI is ignored by the connector; any valid authority works.
            let channel = Endpoint::try_from("http://[::]:50051")?
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = socket_path.clone();
                    async move {
                        let stream = UnixStream::connect(path).await?;
                        Ok::<_, std::io::Error>(TokioIo::new(stream))
                    }
                }))
                .await?;

            Ok(channel)
        }
        #[cfg(not(unix))]
        Target::Uds(path) => Err(ClientError::InvalidEndpoint(format!(
            "unix sockets are not supported on this platform: {}",
            path
        ))),
        Target::Tcp(uri) => {
            info!(address = %address, transport = "tcp", "Connecting to service");

            let channel = Channel::from_shared(uri.clone())
                .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", uri, e)))?
                .connect()
                .await?;
            Ok(channel)
        }
    }
}
