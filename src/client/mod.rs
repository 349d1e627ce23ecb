//! Protocol service client.
//!
//! The replay engine talks to the protocol service only through
//! [`ProtocolClient`]: configuration lookup, group activation, and the two
//! bounded log listings.

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::proto::{GroupMessageEvent, GroupMetadataEvent, ServiceGetConfigurationReply};

pub mod grpc;
pub mod mock;

pub use grpc::GrpcProtocolClient;
pub use mock::MockProtocolClient;

/// Buffered items between a log producer task and its consumer.
const LOG_STREAM_BUFFER: usize = 32;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from protocol service calls and log streams.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("gRPC status: {0}")]
    Status(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Log stream cancelled")]
    Cancelled,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Metadata log entries, in log order.
pub type MetadataStream = BoxStream<'static, Result<GroupMetadataEvent>>;

/// Message log entries, in log order.
pub type MessageStream = BoxStream<'static, Result<GroupMessageEvent>>;

/// Interface to the protocol service.
///
/// Implementations:
/// - `GrpcProtocolClient`: remote or local-process service over gRPC
/// - `MockProtocolClient`: in-memory logs for testing
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Configuration of the account served by the protocol service.
    async fn get_configuration(&self) -> Result<ServiceGetConfigurationReply>;

    /// Make a group's logs readable. `local_only` keeps the group off the network.
    async fn activate_group(&self, group_pk: &[u8], local_only: bool) -> Result<()>;

    /// Release the resources allocated by [`ProtocolClient::activate_group`].
    async fn deactivate_group(&self, group_pk: &[u8]) -> Result<()>;

    /// Stream the group's metadata log from its start up to "now".
    ///
    /// The producer stops as soon as `cancel` fires or the stream is dropped.
    async fn list_group_metadata(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MetadataStream>;

    /// Stream the group's message log from its start up to "now".
    ///
    /// The producer stops as soon as `cancel` fires or the stream is dropped.
    async fn list_group_messages(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MessageStream>;
}

/// Pump `source` into a bounded channel from a background task.
///
/// The task stops reading, and drops `source`, when `cancel` fires, when the
/// receiving side is dropped, or after forwarding the first error.
pub(crate) fn forward_until_cancelled<T, S>(
    source: S,
    cancel: CancellationToken,
) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    S: Stream<Item = Result<T>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LOG_STREAM_BUFFER);

    tokio::spawn(async move {
        let mut source = Box::pin(source);
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = source.next() => item,
            };
            let Some(item) = item else {
                break;
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                break; // Consumer dropped the stream
            }
            if failed {
                break;
            }
        }
    });

    ReceiverStream::new(rx).boxed()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn test_forward_delivers_items_in_order() {
        let source = stream::iter(vec![Ok(1), Ok(2), Ok(3)]);
        let items: Vec<_> = forward_until_cancelled(source, CancellationToken::new())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_forward_stops_after_first_error() {
        let source = stream::iter(vec![
            Ok(1),
            Err(ClientError::Status(tonic::Status::unavailable("gone"))),
            Ok(2),
        ]);
        let items: Vec<_> = forward_until_cancelled(source, CancellationToken::new())
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_forward_ends_when_cancelled() {
        let cancel = CancellationToken::new();
        let source = stream::iter(vec![Ok::<_, ClientError>(1)]).chain(stream::pending());
        let mut forwarded = forward_until_cancelled(source, cancel.clone());

        assert_eq!(forwarded.next().await.unwrap().unwrap(), 1);
        cancel.cancel();

        let end = tokio::time::timeout(Duration::from_secs(5), forwarded.next())
            .await
            .expect("forwarder did not stop");
        assert!(end.is_none());
    }
}
