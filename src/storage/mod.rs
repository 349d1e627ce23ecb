//! Local messenger store.
//!
//! Holds the account record and the per-group conversation read model that
//! replay rebuilds. Writes are idempotent upserts so replaying the same log
//! twice leaves the store unchanged.

use async_trait::async_trait;
use serde::Deserialize;

pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown conversation type: {0}")]
    UnknownConversationType(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path, or `:memory:`.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/messenger.db".to_string(),
        }
    }
}

/// The account whose groups are being replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Encoded public key of the account group.
    pub public_key: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationType {
    Account,
    Contact,
    MultiMember,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Account => "account",
            ConversationType::Contact => "contact",
            ConversationType::MultiMember => "multi_member",
        }
    }
}

impl std::str::FromStr for ConversationType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(ConversationType::Account),
            "contact" => Ok(ConversationType::Contact),
            "multi_member" => Ok(ConversationType::MultiMember),
            other => Err(StorageError::UnknownConversationType(other.to_string())),
        }
    }
}

/// A group the account is a member of, the account group included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Encoded group public key.
    pub public_key: String,
    pub conversation_type: ConversationType,
}

/// A member device seen in a group's metadata log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub conversation_public_key: String,
    pub member_public_key: String,
    pub device_public_key: String,
}

/// A decoded application message, keyed by its content id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub cid: String,
    pub conversation_public_key: String,
    pub device_public_key: String,
    pub message_type: i32,
    pub payload: Vec<u8>,
    pub sent_date: i64,
    pub acknowledged: bool,
}

/// Interface for the local messenger store.
///
/// All `add_*` operations are create-if-absent and report whether a new
/// record was written.
///
/// Implementations:
/// - `SqliteStore`: SQLite storage
/// - `MockStore`: In-memory mock for testing
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Create the account record if it does not exist yet.
    ///
    /// An existing record is left untouched, display name included.
    async fn ensure_account(&self, public_key: &str, display_name: &str) -> Result<bool>;

    async fn get_account(&self, public_key: &str) -> Result<Option<Account>>;

    /// All known conversations, in creation order.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    async fn add_conversation(&self, conversation: &Conversation) -> Result<bool>;

    async fn add_member(&self, member: &Member) -> Result<bool>;

    async fn list_members(&self, conversation_public_key: &str) -> Result<Vec<Member>>;

    /// Stored acknowledged when an acknowledgement for its cid was already seen.
    async fn add_interaction(&self, interaction: &Interaction) -> Result<bool>;

    /// Flag the interaction with the given content id as acknowledged.
    ///
    /// The acknowledgement is kept even when the interaction is not stored
    /// yet: a later `add_interaction` for that cid stores it acknowledged.
    /// Returns `false` when no stored interaction changed.
    async fn mark_acknowledged(&self, cid: &str) -> Result<bool>;

    /// Interactions of a conversation, in insertion order.
    async fn list_interactions(&self, conversation_public_key: &str) -> Result<Vec<Interaction>>;
}

/// Open the SQLite store described by `config` and create its schema.
#[cfg(feature = "sqlite")]
pub async fn init_store(config: &StorageConfig) -> Result<SqliteStore> {
    tracing::info!(path = %config.path, "Opening local store");

    let url = if config.path == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        if let Some(parent) = std::path::Path::new(&config.path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }
        format!("sqlite:{}?mode=rwc", config.path)
    };

    let pool = sqlx::SqlitePool::connect(&url).await?;
    let store = SqliteStore::new(pool);
    store.init().await?;
    Ok(store)
}
