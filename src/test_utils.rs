//! Test utilities and recording fakes.
//!
//! The mock client, mock store and [`RecordingHandler`] can share one
//! [`CallLog`], which gives tests a single ordered view of every call made
//! during a replay.

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tokio::sync::Mutex;

use crate::projection::{HandlerError, ProjectionHandler, Result as HandlerResult};
use crate::proto::{
    AppMessage, AppMessageType, EventContext, EventType, GroupMessageEvent, GroupMetadata,
    GroupMetadataEvent, MessageHeaders, UserMessage,
};
use crate::utils::ids::encode_pk;

/// One observed call. Group keys are recorded in their encoded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetConfiguration,
    EnsureAccount(String),
    ListConversations,
    ActivateGroup { group: String, local_only: bool },
    DeactivateGroup(String),
    ListMetadata(String),
    ListMessages(String),
    ApplyMetadata { group: String, event_id: Vec<u8> },
    ApplyMessage { group: String, event_id: Vec<u8> },
}

/// Shared, ordered record of calls.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, call: Call) {
        self.calls.lock().await.push(call);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().await.iter().filter(|c| pred(*c)).count()
    }

    pub async fn clear(&self) {
        self.calls.lock().await.clear();
    }
}

/// Projection handler that records every apply into a [`CallLog`].
///
/// Can be told to fail on the n-th metadata or message apply.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    log: CallLog,
    fail_on_metadata: Arc<Mutex<Option<usize>>>,
    fail_on_message: Arc<Mutex<Option<usize>>>,
    decoded: Arc<Mutex<Vec<AppMessage>>>,
}

impl RecordingHandler {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    /// Fail the metadata apply at zero-based position `index`, counted across all groups.
    pub async fn set_fail_on_metadata(&self, index: usize) {
        *self.fail_on_metadata.lock().await = Some(index);
    }

    /// Fail the message apply at zero-based position `index`, counted across all groups.
    pub async fn set_fail_on_message(&self, index: usize) {
        *self.fail_on_message.lock().await = Some(index);
    }

    /// Application messages handed to `apply_message`, in order.
    pub async fn decoded_messages(&self) -> Vec<AppMessage> {
        self.decoded.lock().await.clone()
    }
}

fn context_of(context: Option<&EventContext>) -> (String, Vec<u8>) {
    context
        .map(|c| (encode_pk(&c.group_pk), c.id.clone()))
        .unwrap_or_default()
}

#[async_trait]
impl ProjectionHandler for RecordingHandler {
    async fn apply_metadata(&self, event: &GroupMetadataEvent) -> HandlerResult<()> {
        let seen = self
            .log
            .count(|c| matches!(c, Call::ApplyMetadata { .. }))
            .await;
        if *self.fail_on_metadata.lock().await == Some(seen) {
            return Err(HandlerError::InvalidEvent("injected metadata failure".into()));
        }

        let (group, event_id) = context_of(event.event_context.as_ref());
        self.log.record(Call::ApplyMetadata { group, event_id }).await;
        Ok(())
    }

    async fn apply_message(
        &self,
        group_pk: &str,
        event: &GroupMessageEvent,
        message: &AppMessage,
    ) -> HandlerResult<()> {
        let seen = self
            .log
            .count(|c| matches!(c, Call::ApplyMessage { .. }))
            .await;
        if *self.fail_on_message.lock().await == Some(seen) {
            return Err(HandlerError::InvalidEvent("injected message failure".into()));
        }

        let event_id = event
            .event_context
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_default();
        self.decoded.lock().await.push(message.clone());
        self.log
            .record(Call::ApplyMessage {
                group: group_pk.to_string(),
                event_id,
            })
            .await;
        Ok(())
    }
}

/// Build a metadata log entry.
pub fn metadata_event(
    group_pk: &[u8],
    id: &[u8],
    event_type: EventType,
    payload: impl Message,
) -> GroupMetadataEvent {
    GroupMetadataEvent {
        event_context: Some(EventContext {
            id: id.to_vec(),
            parent_ids: vec![],
            group_pk: group_pk.to_vec(),
        }),
        metadata: Some(GroupMetadata {
            event_type: event_type as i32,
            payload: vec![],
            sig: vec![],
        }),
        event: payload.encode_to_vec(),
    }
}

/// Build a message log entry carrying an already-serialized envelope.
pub fn raw_message_event(
    group_pk: &[u8],
    id: &[u8],
    device_pk: &[u8],
    message: Vec<u8>,
) -> GroupMessageEvent {
    GroupMessageEvent {
        event_context: Some(EventContext {
            id: id.to_vec(),
            parent_ids: vec![],
            group_pk: group_pk.to_vec(),
        }),
        headers: Some(MessageHeaders {
            counter: 0,
            device_pk: device_pk.to_vec(),
            sig: vec![],
        }),
        message,
    }
}

/// Build a message log entry carrying a user text message.
pub fn user_message_event(
    group_pk: &[u8],
    id: &[u8],
    device_pk: &[u8],
    body: &str,
) -> GroupMessageEvent {
    let app = AppMessage {
        r#type: AppMessageType::UserMessage as i32,
        payload: UserMessage {
            body: body.to_string(),
        }
        .encode_to_vec(),
        sent_date: 1_704_067_200_000,
        target_cid: String::new(),
    };
    raw_message_event(group_pk, id, device_pk, app.encode_to_vec())
}

/// Build a message log entry acknowledging `target_cid`.
pub fn acknowledge_event(
    group_pk: &[u8],
    id: &[u8],
    device_pk: &[u8],
    target_cid: &str,
) -> GroupMessageEvent {
    let app = AppMessage {
        r#type: AppMessageType::Acknowledge as i32,
        payload: vec![],
        sent_date: 1_704_067_200_500,
        target_cid: target_cid.to_string(),
    };
    raw_message_event(group_pk, id, device_pk, app.encode_to_vec())
}
