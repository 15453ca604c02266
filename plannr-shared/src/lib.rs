pub mod models;
pub mod pii;

pub use models::booking::{BookingDetail, BookingStatus, ServiceKind};
pub use models::chat::{ChatMessage, Conversation, ConversationKind, MessageType, OutgoingMessage};
pub use models::events::Notification;
pub use models::hold::{Hold, HoldStatus};
pub use models::user::{AuthResponse, TokenClaims, User};
pub use models::venue::Venue;
pub use pii::Masked;
