//! Live conversation synchronization: conversation discovery, duplicate
//! detection, single-subscription transport handling and ordered message
//! timelines with self/other attribution.

pub mod classify;
pub mod dedupe;
pub mod identity;
pub mod names;
pub mod session;
pub mod synchronizer;
pub mod timeline;

pub use classify::{classify_message, Authorship};
pub use dedupe::{detect_duplicates, pair_key, DuplicateFinding};
pub use identity::CurrentUser;
pub use names::NameCache;
pub use session::{ConnectionState, TransitionError, TransportState};
pub use synchronizer::{ConversationSynchronizer, RenderedMessage, SendOutcome};
pub use timeline::{PushOutcome, Timeline};

use plannr_core::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Conversation {0} is not the active conversation")]
    NotActive(String),

    #[error("No signed-in user")]
    NotAuthenticated,

    #[error("Conversation not found: {0}")]
    UnknownConversation(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
