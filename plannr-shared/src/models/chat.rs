use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationKind {
    #[default]
    Individual,
    Group,
}

/// Client-side mirror of a server-owned chat thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(alias = "participants")]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub kind: ConversationKind,
    /// Server-side name, only set for group chats.
    #[serde(default)]
    pub name: Option<String>,
    /// Derived locally from the non-self participants.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Conversation {
    pub fn individual(id: impl Into<String>, a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participant_ids: vec![a.into(), b.into()],
            kind: ConversationKind::Individual,
            name: None,
            display_name: None,
        }
    }

    pub fn group(id: impl Into<String>, name: impl Into<String>, participants: Vec<String>) -> Self {
        Self {
            id: id.into(),
            participant_ids: participants,
            kind: ConversationKind::Group,
            name: Some(name.into()),
            display_name: None,
        }
    }

    /// Participants other than `self_id`, in server order.
    pub fn others<'a>(&'a self, self_id: Option<&'a str>) -> impl Iterator<Item = &'a String> + 'a {
        self.participant_ids
            .iter()
            .filter(move |p| Some(p.as_str()) != self_id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Chat,
    Join,
    Leave,
}

/// A message from history fetch or live push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub chat_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_email: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_type: MessageType,
}

/// Payload published to `/app/sendMessage` and `/app/joinChat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: MessageType,
}
