//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Accounts table schema.
#[derive(Iden)]
pub enum Accounts {
    Table,
    #[iden = "public_key"]
    PublicKey,
    #[iden = "display_name"]
    DisplayName,
}

/// Conversations table schema.
#[derive(Iden)]
pub enum Conversations {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "public_key"]
    PublicKey,
    #[iden = "conversation_type"]
    ConversationType,
}

/// Members table schema.
#[derive(Iden)]
pub enum Members {
    Table,
    #[iden = "conversation_public_key"]
    ConversationPublicKey,
    #[iden = "member_public_key"]
    MemberPublicKey,
    #[iden = "device_public_key"]
    DevicePublicKey,
}

/// Interactions table schema.
#[derive(Iden)]
pub enum Interactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "cid"]
    Cid,
    #[iden = "conversation_public_key"]
    ConversationPublicKey,
    #[iden = "device_public_key"]
    DevicePublicKey,
    #[iden = "message_type"]
    MessageType,
    #[iden = "payload"]
    Payload,
    #[iden = "sent_date"]
    SentDate,
    #[iden = "acknowledged"]
    Acknowledged,
}

/// Acknowledgements table schema: every acknowledged cid, stored or not.
#[derive(Iden)]
pub enum Acknowledgements {
    Table,
    #[iden = "target_cid"]
    TargetCid,
}

/// SQL for creating all messenger tables.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    public_key TEXT NOT NULL PRIMARY KEY,
    display_name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS conversations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    public_key TEXT NOT NULL UNIQUE,
    conversation_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS members (
    conversation_public_key TEXT NOT NULL,
    member_public_key TEXT NOT NULL,
    device_public_key TEXT NOT NULL,
    PRIMARY KEY (conversation_public_key, member_public_key, device_public_key)
);

CREATE TABLE IF NOT EXISTS interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cid TEXT NOT NULL UNIQUE,
    conversation_public_key TEXT NOT NULL,
    device_public_key TEXT NOT NULL,
    message_type INTEGER NOT NULL,
    payload BLOB NOT NULL,
    sent_date INTEGER NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS acknowledgements (
    target_cid TEXT NOT NULL PRIMARY KEY
);

CREATE INDEX IF NOT EXISTS idx_interactions_conversation ON interactions(conversation_public_key);
"#;
