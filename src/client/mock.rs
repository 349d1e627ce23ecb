//! Mock ProtocolClient implementation for testing.
//!
//! Serves per-group metadata and message logs from memory and tracks which
//! groups are active. Failures can be injected per operation and per group.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{
    forward_until_cancelled, ClientError, MessageStream, MetadataStream, ProtocolClient, Result,
};
use crate::proto::{GroupMessageEvent, GroupMetadataEvent, ServiceGetConfigurationReply};
use crate::test_utils::{Call, CallLog};
use crate::utils::ids::encode_pk;

/// How a mocked log behaves once its stored entries are exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogEnd {
    /// End of stream.
    #[default]
    Complete,
    /// Fail with `unavailable` after delivering this many entries.
    FailAfter(usize),
    /// Never terminate; models a producer that keeps the stream open.
    Hang,
}

#[derive(Default)]
struct GroupLogs {
    metadata: Vec<GroupMetadataEvent>,
    messages: Vec<GroupMessageEvent>,
    metadata_end: LogEnd,
    messages_end: LogEnd,
}

#[derive(Default)]
struct Failures {
    configuration: bool,
    activate: HashSet<Vec<u8>>,
    deactivate: HashSet<Vec<u8>>,
    open_metadata: HashSet<Vec<u8>>,
    open_messages: HashSet<Vec<u8>>,
}

/// In-memory protocol service.
pub struct MockProtocolClient {
    account_group_pk: Vec<u8>,
    logs: RwLock<HashMap<Vec<u8>, GroupLogs>>,
    active: RwLock<HashSet<Vec<u8>>>,
    failures: RwLock<Failures>,
    log: CallLog,
}

impl MockProtocolClient {
    /// Create a service for the account whose home group is `account_group_pk`.
    ///
    /// The home group starts (and stays) active.
    pub fn new(account_group_pk: &[u8], log: CallLog) -> Self {
        Self {
            account_group_pk: account_group_pk.to_vec(),
            logs: RwLock::new(HashMap::new()),
            active: RwLock::new(HashSet::from([account_group_pk.to_vec()])),
            failures: RwLock::new(Failures::default()),
            log,
        }
    }

    pub async fn push_metadata(&self, group_pk: &[u8], event: GroupMetadataEvent) {
        let mut logs = self.logs.write().await;
        logs.entry(group_pk.to_vec()).or_default().metadata.push(event);
    }

    pub async fn push_message(&self, group_pk: &[u8], event: GroupMessageEvent) {
        let mut logs = self.logs.write().await;
        logs.entry(group_pk.to_vec()).or_default().messages.push(event);
    }

    pub async fn set_metadata_end(&self, group_pk: &[u8], end: LogEnd) {
        let mut logs = self.logs.write().await;
        logs.entry(group_pk.to_vec()).or_default().metadata_end = end;
    }

    pub async fn set_messages_end(&self, group_pk: &[u8], end: LogEnd) {
        let mut logs = self.logs.write().await;
        logs.entry(group_pk.to_vec()).or_default().messages_end = end;
    }

    pub async fn set_fail_on_configuration(&self, fail: bool) {
        self.failures.write().await.configuration = fail;
    }

    pub async fn set_fail_on_activate(&self, group_pk: &[u8]) {
        self.failures.write().await.activate.insert(group_pk.to_vec());
    }

    pub async fn set_fail_on_deactivate(&self, group_pk: &[u8]) {
        self.failures.write().await.deactivate.insert(group_pk.to_vec());
    }

    pub async fn set_fail_on_open_metadata(&self, group_pk: &[u8]) {
        self.failures.write().await.open_metadata.insert(group_pk.to_vec());
    }

    pub async fn set_fail_on_open_messages(&self, group_pk: &[u8]) {
        self.failures.write().await.open_messages.insert(group_pk.to_vec());
    }

    pub async fn is_active(&self, group_pk: &[u8]) -> bool {
        self.active.read().await.contains(group_pk)
    }

    /// Logs of a non-home group can only be listed while it is active.
    async fn check_readable(&self, group_pk: &[u8]) -> Result<()> {
        if !self.is_active(group_pk).await {
            return Err(ClientError::Status(tonic::Status::failed_precondition(
                format!("group {} is not active", encode_pk(group_pk)),
            )));
        }
        Ok(())
    }
}

fn bounded_log<T: Send + 'static>(
    entries: Vec<T>,
    end: LogEnd,
) -> futures::stream::BoxStream<'static, Result<T>> {
    let unavailable = || ClientError::Status(tonic::Status::unavailable("log store unavailable"));

    match end {
        LogEnd::Complete => stream::iter(entries.into_iter().map(Ok)).boxed(),
        LogEnd::FailAfter(count) => stream::iter(entries.into_iter().take(count).map(Ok))
            .chain(stream::once(async move { Err(unavailable()) }))
            .boxed(),
        LogEnd::Hang => stream::iter(entries.into_iter().map(Ok))
            .chain(stream::pending())
            .boxed(),
    }
}

#[async_trait]
impl ProtocolClient for MockProtocolClient {
    async fn get_configuration(&self) -> Result<ServiceGetConfigurationReply> {
        self.log.record(Call::GetConfiguration).await;
        if self.failures.read().await.configuration {
            return Err(ClientError::Status(tonic::Status::unavailable(
                "protocol service not started",
            )));
        }
        Ok(ServiceGetConfigurationReply {
            account_group_pk: self.account_group_pk.clone(),
            ..Default::default()
        })
    }

    async fn activate_group(&self, group_pk: &[u8], local_only: bool) -> Result<()> {
        self.log
            .record(Call::ActivateGroup {
                group: encode_pk(group_pk),
                local_only,
            })
            .await;
        if self.failures.read().await.activate.contains(group_pk) {
            return Err(ClientError::Status(tonic::Status::internal(
                "unable to activate group",
            )));
        }
        self.active.write().await.insert(group_pk.to_vec());
        Ok(())
    }

    async fn deactivate_group(&self, group_pk: &[u8]) -> Result<()> {
        self.log
            .record(Call::DeactivateGroup(encode_pk(group_pk)))
            .await;
        if self.failures.read().await.deactivate.contains(group_pk) {
            return Err(ClientError::Status(tonic::Status::internal(
                "unable to deactivate group",
            )));
        }
        if group_pk != self.account_group_pk.as_slice() {
            self.active.write().await.remove(group_pk);
        }
        Ok(())
    }

    async fn list_group_metadata(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MetadataStream> {
        self.log.record(Call::ListMetadata(encode_pk(group_pk))).await;
        if self.failures.read().await.open_metadata.contains(group_pk) {
            return Err(ClientError::Status(tonic::Status::unavailable(
                "metadata log unavailable",
            )));
        }
        self.check_readable(group_pk).await?;

        let logs = self.logs.read().await;
        let (entries, end) = logs
            .get(group_pk)
            .map(|l| (l.metadata.clone(), l.metadata_end))
            .unwrap_or_default();
        Ok(forward_until_cancelled(bounded_log(entries, end), cancel))
    }

    async fn list_group_messages(
        &self,
        group_pk: &[u8],
        cancel: CancellationToken,
    ) -> Result<MessageStream> {
        self.log.record(Call::ListMessages(encode_pk(group_pk))).await;
        if self.failures.read().await.open_messages.contains(group_pk) {
            return Err(ClientError::Status(tonic::Status::unavailable(
                "message log unavailable",
            )));
        }
        self.check_readable(group_pk).await?;

        let logs = self.logs.read().await;
        let (entries, end) = logs
            .get(group_pk)
            .map(|l| (l.messages.clone(), l.messages_end))
            .unwrap_or_default();
        Ok(forward_until_cancelled(bounded_log(entries, end), cancel))
    }
}
