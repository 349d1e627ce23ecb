//! Projection of decoded log events into the local store.
//!
//! Replay hands every metadata event and every decoded application message
//! to a [`ProjectionHandler`]. Handlers must be idempotent: replay re-drains
//! whole logs on every run.

use async_trait::async_trait;

use crate::proto::{AppMessage, GroupMessageEvent, GroupMetadataEvent};
use crate::storage::StorageError;

pub mod store;

pub use store::StoreProjection;

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, HandlerError>;

/// Errors from projection handlers.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event payload decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Capability interface for applying log events to a projection.
#[async_trait]
pub trait ProjectionHandler: Send + Sync {
    /// Apply one raw metadata log entry.
    async fn apply_metadata(&self, event: &GroupMetadataEvent) -> Result<()>;

    /// Apply one message log entry whose envelope has already been decoded.
    ///
    /// `group_pk` is the encoded public key of the group the log belongs to.
    async fn apply_message(
        &self,
        group_pk: &str,
        event: &GroupMessageEvent,
        message: &AppMessage,
    ) -> Result<()>;
}

/// Change made to the store by a projection handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ConversationAdded { conversation: String },
    MemberAdded { conversation: String, member: String },
    InteractionAdded { conversation: String, cid: String },
    InteractionAcknowledged { cid: String },
}

/// Observer of store changes (UI refresh, push notifications).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: StoreEvent);
}

/// Notifier that drops every event. Used when replaying non-interactively.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: StoreEvent) {}
}
