//! SQLite implementation of the local store.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};

use super::schema::{
    Accounts, Acknowledgements, Conversations, Interactions, Members, CREATE_TABLES,
};
use super::{Account, Conversation, Interaction, LocalStore, Member, Result};

/// SQLite implementation of LocalStore.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    async fn is_acknowledged(&self, cid: &str) -> Result<bool> {
        let query = Query::select()
            .column(Acknowledgements::TargetCid)
            .from(Acknowledgements::Table)
            .and_where(Expr::col(Acknowledgements::TargetCid).eq(cid))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }
}

fn interaction_from_row(row: &sqlx::sqlite::SqliteRow) -> Interaction {
    let acknowledged: i64 = row.get("acknowledged");
    Interaction {
        cid: row.get("cid"),
        conversation_public_key: row.get("conversation_public_key"),
        device_public_key: row.get("device_public_key"),
        message_type: row.get("message_type"),
        payload: row.get("payload"),
        sent_date: row.get("sent_date"),
        acknowledged: acknowledged != 0,
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn ensure_account(&self, public_key: &str, display_name: &str) -> Result<bool> {
        let query = Query::insert()
            .into_table(Accounts::Table)
            .columns([Accounts::PublicKey, Accounts::DisplayName])
            .values_panic([public_key.into(), display_name.into()])
            .on_conflict(OnConflict::column(Accounts::PublicKey).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_account(&self, public_key: &str) -> Result<Option<Account>> {
        let query = Query::select()
            .columns([Accounts::PublicKey, Accounts::DisplayName])
            .from(Accounts::Table)
            .and_where(Expr::col(Accounts::PublicKey).eq(public_key))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;

        Ok(row.map(|r| Account {
            public_key: r.get("public_key"),
            display_name: r.get("display_name"),
        }))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let query = Query::select()
            .columns([Conversations::PublicKey, Conversations::ConversationType])
            .from(Conversations::Table)
            .order_by(Conversations::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            let conversation_type: String = row.get("conversation_type");
            conversations.push(Conversation {
                public_key: row.get("public_key"),
                conversation_type: conversation_type.parse()?,
            });
        }

        Ok(conversations)
    }

    async fn add_conversation(&self, conversation: &Conversation) -> Result<bool> {
        let query = Query::insert()
            .into_table(Conversations::Table)
            .columns([Conversations::PublicKey, Conversations::ConversationType])
            .values_panic([
                conversation.public_key.as_str().into(),
                conversation.conversation_type.as_str().into(),
            ])
            .on_conflict(
                OnConflict::column(Conversations::PublicKey)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_member(&self, member: &Member) -> Result<bool> {
        let query = Query::insert()
            .into_table(Members::Table)
            .columns([
                Members::ConversationPublicKey,
                Members::MemberPublicKey,
                Members::DevicePublicKey,
            ])
            .values_panic([
                member.conversation_public_key.as_str().into(),
                member.member_public_key.as_str().into(),
                member.device_public_key.as_str().into(),
            ])
            .on_conflict(
                OnConflict::columns([
                    Members::ConversationPublicKey,
                    Members::MemberPublicKey,
                    Members::DevicePublicKey,
                ])
                .do_nothing()
                .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, conversation_public_key: &str) -> Result<Vec<Member>> {
        let query = Query::select()
            .columns([
                Members::ConversationPublicKey,
                Members::MemberPublicKey,
                Members::DevicePublicKey,
            ])
            .from(Members::Table)
            .and_where(Expr::col(Members::ConversationPublicKey).eq(conversation_public_key))
            .order_by(Members::MemberPublicKey, Order::Asc)
            .order_by(Members::DevicePublicKey, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|r| Member {
                conversation_public_key: r.get("conversation_public_key"),
                member_public_key: r.get("member_public_key"),
                device_public_key: r.get("device_public_key"),
            })
            .collect())
    }

    async fn add_interaction(&self, interaction: &Interaction) -> Result<bool> {
        let acknowledged = interaction.acknowledged || self.is_acknowledged(&interaction.cid).await?;
        let acknowledged = if acknowledged { 1i32 } else { 0i32 };

        let query = Query::insert()
            .into_table(Interactions::Table)
            .columns([
                Interactions::Cid,
                Interactions::ConversationPublicKey,
                Interactions::DevicePublicKey,
                Interactions::MessageType,
                Interactions::Payload,
                Interactions::SentDate,
                Interactions::Acknowledged,
            ])
            .values_panic([
                interaction.cid.as_str().into(),
                interaction.conversation_public_key.as_str().into(),
                interaction.device_public_key.as_str().into(),
                interaction.message_type.into(),
                interaction.payload.clone().into(),
                interaction.sent_date.into(),
                acknowledged.into(),
            ])
            .on_conflict(OnConflict::column(Interactions::Cid).do_nothing().to_owned())
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_acknowledged(&self, cid: &str) -> Result<bool> {
        let record = Query::insert()
            .into_table(Acknowledgements::Table)
            .columns([Acknowledgements::TargetCid])
            .values_panic([cid.into()])
            .on_conflict(
                OnConflict::column(Acknowledgements::TargetCid)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&record).execute(&self.pool).await?;

        let query = Query::update()
            .table(Interactions::Table)
            .value(Interactions::Acknowledged, 1i32)
            .and_where(Expr::col(Interactions::Cid).eq(cid))
            .and_where(Expr::col(Interactions::Acknowledged).eq(0i32))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_interactions(&self, conversation_public_key: &str) -> Result<Vec<Interaction>> {
        let query = Query::select()
            .columns([
                Interactions::Cid,
                Interactions::ConversationPublicKey,
                Interactions::DevicePublicKey,
                Interactions::MessageType,
                Interactions::Payload,
                Interactions::SentDate,
                Interactions::Acknowledged,
            ])
            .from(Interactions::Table)
            .and_where(Expr::col(Interactions::ConversationPublicKey).eq(conversation_public_key))
            .order_by(Interactions::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(interaction_from_row).collect())
    }
}
