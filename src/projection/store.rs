//! Store-backed projection handler.

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use tracing::debug;

use super::{HandlerError, Notifier, ProjectionHandler, Result, StoreEvent};
use crate::proto::{
    AccountGroupJoined, AppMessage, AppMessageType, EventContext, EventType, GroupMemberDeviceAdded,
    GroupMessageEvent, GroupMetadataEvent, GroupType, UserMessage,
};
use crate::storage::{Conversation, ConversationType, Interaction, LocalStore, Member};
use crate::utils::ids::encode_pk;

/// Projection handler that writes conversations, members and interactions
/// into a [`LocalStore`].
///
/// Bound to one account: member-device events seen in the account group
/// create the account conversation itself.
pub struct StoreProjection {
    store: Arc<dyn LocalStore>,
    account_group_pk: Vec<u8>,
    notifier: Arc<dyn Notifier>,
}

impl StoreProjection {
    pub fn new(
        store: Arc<dyn LocalStore>,
        account_group_pk: Vec<u8>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            account_group_pk,
            notifier,
        }
    }

    async fn on_account_group_joined(&self, event: &GroupMetadataEvent) -> Result<()> {
        let joined = AccountGroupJoined::decode(event.event.as_slice())?;
        let group = joined
            .group
            .ok_or_else(|| HandlerError::InvalidEvent("AccountGroupJoined without group".into()))?;

        let conversation_type = match GroupType::try_from(group.group_type) {
            Ok(GroupType::Account) => ConversationType::Account,
            Ok(GroupType::Contact) => ConversationType::Contact,
            _ => ConversationType::MultiMember,
        };

        self.add_conversation(encode_pk(&group.public_key), conversation_type)
            .await
    }

    async fn on_member_device_added(
        &self,
        context: &EventContext,
        event: &GroupMetadataEvent,
    ) -> Result<()> {
        let added = GroupMemberDeviceAdded::decode(event.event.as_slice())?;
        let conversation = encode_pk(&context.group_pk);

        if context.group_pk == self.account_group_pk {
            self.add_conversation(conversation.clone(), ConversationType::Account)
                .await?;
        }

        let member = Member {
            conversation_public_key: conversation.clone(),
            member_public_key: encode_pk(&added.member_pk),
            device_public_key: encode_pk(&added.device_pk),
        };
        if self.store.add_member(&member).await? {
            self.notifier.notify(StoreEvent::MemberAdded {
                conversation,
                member: member.member_public_key,
            });
        }
        Ok(())
    }

    async fn add_conversation(
        &self,
        public_key: String,
        conversation_type: ConversationType,
    ) -> Result<()> {
        let conversation = Conversation {
            public_key,
            conversation_type,
        };
        if self.store.add_conversation(&conversation).await? {
            debug!(conversation = %conversation.public_key, kind = conversation_type.as_str(), "Conversation added");
            self.notifier.notify(StoreEvent::ConversationAdded {
                conversation: conversation.public_key,
            });
        }
        Ok(())
    }
}

fn require_context(context: Option<&EventContext>) -> Result<&EventContext> {
    context.ok_or_else(|| HandlerError::InvalidEvent("event without context".into()))
}

#[async_trait]
impl ProjectionHandler for StoreProjection {
    async fn apply_metadata(&self, event: &GroupMetadataEvent) -> Result<()> {
        let context = require_context(event.event_context.as_ref())?;
        let metadata = event
            .metadata
            .as_ref()
            .ok_or_else(|| HandlerError::InvalidEvent("metadata event without metadata".into()))?;

        match EventType::try_from(metadata.event_type) {
            Ok(EventType::AccountGroupJoined) => self.on_account_group_joined(event).await,
            Ok(EventType::GroupMemberDeviceAdded) => {
                self.on_member_device_added(context, event).await
            }
            other => {
                debug!(event_type = ?other, group = %encode_pk(&context.group_pk), "Metadata event not projected");
                Ok(())
            }
        }
    }

    async fn apply_message(
        &self,
        group_pk: &str,
        event: &GroupMessageEvent,
        message: &AppMessage,
    ) -> Result<()> {
        let context = require_context(event.event_context.as_ref())?;
        let cid = encode_pk(&context.id);

        let message_type = match AppMessageType::try_from(message.r#type) {
            Ok(AppMessageType::Acknowledge) => {
                if message.target_cid.is_empty() {
                    return Err(HandlerError::InvalidEvent(format!(
                        "acknowledge {} without target",
                        cid
                    )));
                }
                if self.store.mark_acknowledged(&message.target_cid).await? {
                    self.notifier.notify(StoreEvent::InteractionAcknowledged {
                        cid: message.target_cid.clone(),
                    });
                }
                return Ok(());
            }
            Ok(AppMessageType::UserMessage) => {
                UserMessage::decode(message.payload.as_slice())?;
                AppMessageType::UserMessage
            }
            Ok(
                ty @ (AppMessageType::GroupInvitation
                | AppMessageType::SetGroupInfo
                | AppMessageType::SetUserInfo),
            ) => ty,
            other => {
                debug!(message_type = ?other, group = %group_pk, cid = %cid, "Message not projected");
                return Ok(());
            }
        };

        let device_pk = event
            .headers
            .as_ref()
            .map(|h| encode_pk(&h.device_pk))
            .unwrap_or_default();

        let interaction = Interaction {
            cid,
            conversation_public_key: group_pk.to_string(),
            device_public_key: device_pk,
            message_type: message_type as i32,
            payload: message.payload.clone(),
            sent_date: message.sent_date,
            acknowledged: false,
        };
        if self.store.add_interaction(&interaction).await? {
            self.notifier.notify(StoreEvent::InteractionAdded {
                conversation: interaction.conversation_public_key,
                cid: interaction.cid,
            });
        }
        Ok(())
    }
}
