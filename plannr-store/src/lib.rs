pub mod activity;
pub mod app_config;
pub mod drafts;
pub mod events;
pub mod local_storage;
pub mod session_store;

pub use activity::RecentActivity;
pub use drafts::FormDrafts;
pub use events::EventBus;
pub use local_storage::{LocalStorage, MemoryStorage};
pub use session_store::{SessionStore, StoredHolds};

/// Storage keys shared with the web front end.
pub mod keys {
    pub const AUTH_TOKEN: &str = "authToken";
    pub const USER_DATA: &str = "userData";
    pub const USER_BOOKINGS: &str = "userBookings";
    pub const RECENT_ACTIVITY: &str = "plannrai_recent_activity";
    pub const DRAFT_PREFIX: &str = "plannrai_draft_";
}
