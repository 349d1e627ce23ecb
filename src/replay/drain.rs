//! Log drainers.
//!
//! A drain reads one group log from its start up to "now" and hands every
//! entry to the projection handler, strictly in log order. The first failure
//! ends the drain; entries after it are never applied.

use futures::stream::{BoxStream, StreamExt};
use prost::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{ClientError, ProtocolClient};
use crate::projection::{HandlerError, ProjectionHandler};
use crate::proto::AppMessage;
use crate::utils::ids::encode_pk;

/// Errors ending a drain.
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    #[error("Log list error: {0}")]
    List(#[from] ClientError),

    #[error("Application message decode error: {0}")]
    Deserialization(#[from] prost::DecodeError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Outcome of a completed drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Entries handed to the handler.
    pub applied: usize,
}

/// Next log entry, or `None` once the log is exhausted.
///
/// Cancellation wins over a ready item. A stream that ends because its
/// producer saw the cancellation is reported as cancelled, not complete.
async fn next_entry<T>(
    stream: &mut BoxStream<'static, Result<T, ClientError>>,
    scope: &CancellationToken,
) -> Result<Option<T>, DrainError> {
    if scope.is_cancelled() {
        return Err(ClientError::Cancelled.into());
    }

    let item = tokio::select! {
        biased;
        _ = scope.cancelled() => return Err(ClientError::Cancelled.into()),
        item = stream.next() => item,
    };

    match item {
        Some(Ok(entry)) => Ok(Some(entry)),
        Some(Err(e)) => Err(e.into()),
        None if scope.is_cancelled() => Err(ClientError::Cancelled.into()),
        None => Ok(None),
    }
}

/// Apply every metadata entry of `group_pk` to `handler`.
pub async fn drain_metadata(
    client: &dyn ProtocolClient,
    handler: &dyn ProjectionHandler,
    group_pk: &[u8],
    parent: &CancellationToken,
) -> Result<DrainStats, DrainError> {
    let scope = parent.child_token();
    let _release = scope.clone().drop_guard();

    let mut stream = client.list_group_metadata(group_pk, scope.clone()).await?;
    let mut stats = DrainStats::default();

    while let Some(event) = next_entry(&mut stream, &scope).await? {
        handler.apply_metadata(&event).await?;
        stats.applied += 1;
    }

    debug!(group = %encode_pk(group_pk), applied = stats.applied, "Metadata log drained");
    Ok(stats)
}

/// Decode every message entry of `group_pk` and apply it to `handler`.
pub async fn drain_messages(
    client: &dyn ProtocolClient,
    handler: &dyn ProjectionHandler,
    group_pk: &[u8],
    parent: &CancellationToken,
) -> Result<DrainStats, DrainError> {
    let scope = parent.child_token();
    let _release = scope.clone().drop_guard();

    let group = encode_pk(group_pk);
    let mut stream = client.list_group_messages(group_pk, scope.clone()).await?;
    let mut stats = DrainStats::default();

    while let Some(event) = next_entry(&mut stream, &scope).await? {
        let message = AppMessage::decode(event.message.as_slice())?;
        handler.apply_message(&group, &event, &message).await?;
        stats.applied += 1;
    }

    debug!(group = %group, applied = stats.applied, "Message log drained");
    Ok(stats)
}
