//! Mock LocalStore implementation for testing.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Account, Conversation, Interaction, LocalStore, Member, Result, StorageError,
};
use crate::test_utils::{Call, CallLog};

#[derive(Default)]
struct Records {
    accounts: Vec<Account>,
    conversations: Vec<Conversation>,
    members: Vec<Member>,
    interactions: Vec<Interaction>,
    acknowledgements: HashSet<String>,
}

/// Mock store that keeps records in memory, in insertion order.
#[derive(Default)]
pub struct MockStore {
    records: RwLock<Records>,
    log: Option<CallLog>,
    fail_on_write: RwLock<bool>,
    fail_on_list: RwLock<bool>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `ensure_account` and `list_conversations` calls into `log`.
    pub fn with_call_log(log: CallLog) -> Self {
        Self {
            log: Some(log),
            ..Default::default()
        }
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_list(&self, fail: bool) {
        *self.fail_on_list.write().await = fail;
    }

    pub async fn account_count(&self) -> usize {
        self.records.read().await.accounts.len()
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StorageError::Unavailable("write rejected".to_string()));
        }
        Ok(())
    }

    async fn record(&self, call: Call) {
        if let Some(log) = &self.log {
            log.record(call).await;
        }
    }
}

#[async_trait]
impl LocalStore for MockStore {
    async fn ensure_account(&self, public_key: &str, display_name: &str) -> Result<bool> {
        self.record(Call::EnsureAccount(public_key.to_string())).await;
        self.check_write().await?;

        let mut records = self.records.write().await;
        if records.accounts.iter().any(|a| a.public_key == public_key) {
            return Ok(false);
        }
        records.accounts.push(Account {
            public_key: public_key.to_string(),
            display_name: display_name.to_string(),
        });
        Ok(true)
    }

    async fn get_account(&self, public_key: &str) -> Result<Option<Account>> {
        let records = self.records.read().await;
        Ok(records
            .accounts
            .iter()
            .find(|a| a.public_key == public_key)
            .cloned())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.record(Call::ListConversations).await;
        if *self.fail_on_list.read().await {
            return Err(StorageError::Unavailable("list rejected".to_string()));
        }
        Ok(self.records.read().await.conversations.clone())
    }

    async fn add_conversation(&self, conversation: &Conversation) -> Result<bool> {
        self.check_write().await?;

        let mut records = self.records.write().await;
        if records
            .conversations
            .iter()
            .any(|c| c.public_key == conversation.public_key)
        {
            return Ok(false);
        }
        records.conversations.push(conversation.clone());
        Ok(true)
    }

    async fn add_member(&self, member: &Member) -> Result<bool> {
        self.check_write().await?;

        let mut records = self.records.write().await;
        if records.members.contains(member) {
            return Ok(false);
        }
        records.members.push(member.clone());
        Ok(true)
    }

    async fn list_members(&self, conversation_public_key: &str) -> Result<Vec<Member>> {
        let records = self.records.read().await;
        let mut members: Vec<Member> = records
            .members
            .iter()
            .filter(|m| m.conversation_public_key == conversation_public_key)
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            (&a.member_public_key, &a.device_public_key)
                .cmp(&(&b.member_public_key, &b.device_public_key))
        });
        Ok(members)
    }

    async fn add_interaction(&self, interaction: &Interaction) -> Result<bool> {
        self.check_write().await?;

        let mut records = self.records.write().await;
        if records.interactions.iter().any(|i| i.cid == interaction.cid) {
            return Ok(false);
        }
        let mut interaction = interaction.clone();
        interaction.acknowledged |= records.acknowledgements.contains(&interaction.cid);
        records.interactions.push(interaction);
        Ok(true)
    }

    async fn mark_acknowledged(&self, cid: &str) -> Result<bool> {
        self.check_write().await?;

        let mut records = self.records.write().await;
        records.acknowledgements.insert(cid.to_string());
        match records
            .interactions
            .iter_mut()
            .find(|i| i.cid == cid && !i.acknowledged)
        {
            Some(interaction) => {
                interaction.acknowledged = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_interactions(&self, conversation_public_key: &str) -> Result<Vec<Interaction>> {
        let records = self.records.read().await;
        Ok(records
            .interactions
            .iter()
            .filter(|i| i.conversation_public_key == conversation_public_key)
            .cloned()
            .collect())
    }
}
