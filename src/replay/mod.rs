//! Replay engine.
//!
//! Rebuilds the local store of an account from the logs held by the protocol
//! service:
//!
//! 1. fetch the account's home group from the service configuration
//! 2. make sure the account record exists
//! 3. drain the home group's metadata log (this is where the account learns
//!    which groups it belongs to)
//! 4. for every conversation in the store: activate it (non-home only), drain
//!    its metadata log (non-home only), drain its message log, deactivate it
//!
//! Every step is fatal. Logs are always re-read from their start, so handlers
//! must be idempotent.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{ClientError, ProtocolClient};
use crate::projection::{NoopNotifier, ProjectionHandler, StoreProjection};
use crate::storage::{LocalStore, StorageError};
use crate::utils::ids::{decode_pk, encode_pk};

pub mod drain;
pub mod lifecycle;

pub use drain::{drain_messages, drain_metadata, DrainError, DrainStats};
pub use lifecycle::GroupLifecycle;

/// Errors ending a replay.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Unable to get protocol configuration: {0}")]
    Configuration(#[source] ClientError),

    #[error("Unable to list conversations: {0}")]
    StoreRead(#[source] StorageError),

    #[error("Unable to create account {account}: {source}")]
    StoreWrite {
        account: String,
        #[source]
        source: StorageError,
    },

    #[error("Unable to deserialize data of group {group}: {source}")]
    Deserialization {
        group: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unable to activate group {group}: {source}")]
    GroupActivate {
        group: String,
        #[source]
        source: ClientError,
    },

    #[error("Unable to deactivate group {group}: {source}")]
    GroupDeactivate {
        group: String,
        #[source]
        source: ClientError,
    },

    #[error("Unable to replay metadata of group {group}: {source}")]
    MetadataReplay {
        group: String,
        #[source]
        source: DrainError,
    },

    #[error("Unable to replay messages of group {group}: {source}")]
    MessageReplay {
        group: String,
        #[source]
        source: DrainError,
    },
}

/// Category of a [`ReplayError`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    StoreRead,
    StoreWrite,
    Deserialization,
    GroupActivate,
    GroupDeactivate,
    MetadataReplay,
    MessageReplay,
}

impl ReplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplayError::Configuration(_) => ErrorKind::Configuration,
            ReplayError::StoreRead(_) => ErrorKind::StoreRead,
            ReplayError::StoreWrite { .. } => ErrorKind::StoreWrite,
            ReplayError::Deserialization { .. } => ErrorKind::Deserialization,
            ReplayError::GroupActivate { .. } => ErrorKind::GroupActivate,
            ReplayError::GroupDeactivate { .. } => ErrorKind::GroupDeactivate,
            ReplayError::MetadataReplay { .. } => ErrorKind::MetadataReplay,
            ReplayError::MessageReplay { .. } => ErrorKind::MessageReplay,
        }
    }

    /// A message that fails to decode is reported as such, not as a failed drain.
    fn messages(group_pk: &[u8], source: DrainError) -> Self {
        match source {
            DrainError::Deserialization(e) => ReplayError::Deserialization {
                group: encode_pk(group_pk),
                source: Box::new(e),
            },
            source => ReplayError::MessageReplay {
                group: encode_pk(group_pk),
                source,
            },
        }
    }
}

/// Totals of a completed replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Conversations whose logs were replayed.
    pub groups: usize,
    pub metadata_applied: usize,
    pub messages_applied: usize,
}

/// Replays every group log of one account into a projection.
pub struct Replayer {
    client: Arc<dyn ProtocolClient>,
    store: Arc<dyn LocalStore>,
    handler: Option<Arc<dyn ProjectionHandler>>,
}

impl Replayer {
    /// Replayer projecting into `store` through a [`StoreProjection`].
    pub fn new(client: Arc<dyn ProtocolClient>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            client,
            store,
            handler: None,
        }
    }

    /// Apply events to `handler` instead of the default store projection.
    pub fn with_handler(mut self, handler: Arc<dyn ProjectionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    fn handler_for(&self, account_group_pk: &[u8]) -> Arc<dyn ProjectionHandler> {
        match &self.handler {
            Some(handler) => Arc::clone(handler),
            None => Arc::new(StoreProjection::new(
                Arc::clone(&self.store),
                account_group_pk.to_vec(),
                Arc::new(NoopNotifier),
            )),
        }
    }

    /// Run one replay. `cancel` aborts the drain in progress.
    pub async fn replay(&self, cancel: &CancellationToken) -> Result<ReplaySummary, ReplayError> {
        let config = self
            .client
            .get_configuration()
            .await
            .map_err(ReplayError::Configuration)?;
        let home_pk = config.account_group_pk;
        let account = encode_pk(&home_pk);

        info!(account = %account, "Replaying group logs");

        let created = self
            .store
            .ensure_account(&account, "")
            .await
            .map_err(|source| ReplayError::StoreWrite {
                account: account.clone(),
                source,
            })?;
        if created {
            debug!(account = %account, "Account created");
        }

        let handler = self.handler_for(&home_pk);
        let mut summary = ReplaySummary::default();

        let stats = self.replay_metadata(handler.as_ref(), &home_pk, cancel).await?;
        summary.metadata_applied += stats.applied;

        let conversations = self
            .store
            .list_conversations()
            .await
            .map_err(ReplayError::StoreRead)?;
        let lifecycle = GroupLifecycle::new(Arc::clone(&self.client));

        for conversation in &conversations {
            let group_pk = decode_pk(&conversation.public_key).map_err(|e| {
                ReplayError::Deserialization {
                    group: conversation.public_key.clone(),
                    source: Box::new(e),
                }
            })?;

            debug!(
                group = %conversation.public_key,
                conversation_type = conversation.conversation_type.as_str(),
                "Replaying conversation"
            );

            if group_pk == home_pk {
                let stats = self.replay_messages(handler.as_ref(), &group_pk, cancel).await?;
                summary.messages_applied += stats.applied;
            } else {
                lifecycle.activate(&group_pk).await?;

                let replayed = self.replay_group(handler.as_ref(), &group_pk, cancel).await;
                let (metadata, messages) = match replayed {
                    Ok(stats) => stats,
                    Err(e) => {
                        lifecycle.release_after_failure(&group_pk).await;
                        return Err(e);
                    }
                };

                lifecycle.deactivate(&group_pk).await?;

                summary.metadata_applied += metadata.applied;
                summary.messages_applied += messages.applied;
            }

            summary.groups += 1;
        }

        info!(
            account = %account,
            groups = summary.groups,
            metadata = summary.metadata_applied,
            messages = summary.messages_applied,
            "Replay complete"
        );
        Ok(summary)
    }

    async fn replay_metadata(
        &self,
        handler: &dyn ProjectionHandler,
        group_pk: &[u8],
        cancel: &CancellationToken,
    ) -> Result<DrainStats, ReplayError> {
        drain_metadata(self.client.as_ref(), handler, group_pk, cancel)
            .await
            .map_err(|source| ReplayError::MetadataReplay {
                group: encode_pk(group_pk),
                source,
            })
    }

    async fn replay_messages(
        &self,
        handler: &dyn ProjectionHandler,
        group_pk: &[u8],
        cancel: &CancellationToken,
    ) -> Result<DrainStats, ReplayError> {
        drain_messages(self.client.as_ref(), handler, group_pk, cancel)
            .await
            .map_err(|e| ReplayError::messages(group_pk, e))
    }

    /// Metadata then messages of an activated group.
    async fn replay_group(
        &self,
        handler: &dyn ProjectionHandler,
        group_pk: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(DrainStats, DrainStats), ReplayError> {
        let metadata = self.replay_metadata(handler, group_pk, cancel).await?;
        let messages = self.replay_messages(handler, group_pk, cancel).await?;
        Ok((metadata, messages))
    }
}

/// Replay every log of the account served by `client` into `store`.
pub async fn replay_logs_to_store(
    cancel: &CancellationToken,
    client: Arc<dyn ProtocolClient>,
    store: Arc<dyn LocalStore>,
) -> Result<ReplaySummary, ReplayError> {
    Replayer::new(client, store).replay(cancel).await
}
