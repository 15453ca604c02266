use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Events projected onto the UI (toasts, timers, inline error panels).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    HoldCreated {
        hold_id: Uuid,
        venue_name: String,
        expires_at: DateTime<Utc>,
    },
    HoldCountdown {
        hold_id: Uuid,
        remaining_secs: i64,
    },
    HoldExpired {
        hold_id: Uuid,
        venue_name: String,
    },
    HoldCancelled {
        hold_id: Uuid,
        venue_name: String,
    },
    AuthenticationRequired {
        reason: String,
    },
    ConversationOpened {
        chat_id: String,
    },
    MessageReceived {
        chat_id: String,
        message_id: Option<String>,
        from_self: bool,
    },
    MessageSent {
        chat_id: String,
    },
    DuplicateConversations {
        pair_key: String,
        conversation_ids: Vec<String>,
    },
    PendingBookingsRefreshed {
        count: usize,
    },
    InlineError {
        scope: String,
        message: String,
    },
}

impl Notification {
    /// Short human-readable line, used for toasts and the recent-activity log.
    pub fn summary(&self) -> String {
        match self {
            Notification::HoldCreated { venue_name, .. } => format!("Dates held at {}", venue_name),
            Notification::HoldCountdown { remaining_secs, .. } => format!("{}s left on hold", remaining_secs),
            Notification::HoldExpired { venue_name, .. } => format!("Your hold at {} has expired", venue_name),
            Notification::HoldCancelled { venue_name, .. } => format!("Hold at {} cancelled", venue_name),
            Notification::AuthenticationRequired { reason } => format!("Please sign in: {}", reason),
            Notification::ConversationOpened { chat_id } => format!("Opened conversation {}", chat_id),
            Notification::MessageReceived { chat_id, .. } => format!("New message in {}", chat_id),
            Notification::MessageSent { chat_id } => format!("Message sent to {}", chat_id),
            Notification::DuplicateConversations { pair_key, conversation_ids } => {
                format!("Duplicate conversations for {}: {}", pair_key, conversation_ids.join(", "))
            }
            Notification::PendingBookingsRefreshed { count } => format!("{} bookings awaiting approval", count),
            Notification::InlineError { scope, message } => format!("{}: {}", scope, message),
        }
    }
}
