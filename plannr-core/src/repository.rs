use async_trait::async_trait;
use tokio::sync::mpsc;
use plannr_shared::{ChatMessage, Conversation, Hold, User};

use crate::ServiceResult;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),
    #[error("Stored value under '{key}' is not valid JSON: {reason}")]
    Corrupt { key: String, reason: String },
}

/// String key/value store with browser local-storage semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Load/save adapter for the hold collection. `save` replaces the whole
/// collection in one write.
pub trait HoldPersistence: Send + Sync {
    fn load(&self) -> Result<Vec<Hold>, StorageError>;

    fn save(&self, holds: &[Hold]) -> Result<(), StorageError>;
}

/// Conversation and message endpoints of the platform API.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn individual_chats(&self, user_key: &str) -> ServiceResult<Vec<Conversation>>;

    async fn group_chats(&self, user_key: &str) -> ServiceResult<Vec<Conversation>>;

    async fn history(&self, conversation: &Conversation) -> ServiceResult<Vec<ChatMessage>>;

    /// Non-real-time send path; returns the stored message.
    async fn post_message(
        &self,
        conversation: &Conversation,
        sender_id: &str,
        content: &str,
    ) -> ServiceResult<ChatMessage>;

    async fn create_chat(&self, participant_ids: &[String]) -> ServiceResult<Conversation>;
}

/// Identity lookups used for display names and current-user resolution.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn search_users(&self, query: &str) -> ServiceResult<Vec<User>>;

    async fn get_user(&self, id: &str) -> ServiceResult<User>;
}

/// A frame pushed by the broker on a subscribed destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub subscription_id: Option<String>,
    pub body: String,
}

/// Publish/subscribe channel for live chat.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the session. Pushed frames arrive on the returned receiver until
    /// the connection drops.
    async fn connect(&self) -> ServiceResult<mpsc::UnboundedReceiver<Delivery>>;

    /// Returns the subscription id to pass to `unsubscribe`.
    async fn subscribe(&self, destination: &str) -> ServiceResult<String>;

    async fn unsubscribe(&self, subscription_id: &str) -> ServiceResult<()>;

    async fn publish(&self, destination: &str, body: &serde_json::Value) -> ServiceResult<()>;

    async fn disconnect(&self) -> ServiceResult<()>;
}
