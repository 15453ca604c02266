//! Recent-activity feed shown on the dashboard (`plannrai_recent_activity`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use plannr_core::repository::StorageError;
use plannr_shared::Notification;

use crate::{keys, EventBus, SessionStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub kind: String,
    pub description: String,
    pub at: DateTime<Utc>,
}

/// Newest-first list capped at `limit` entries.
#[derive(Clone)]
pub struct RecentActivity {
    store: SessionStore,
    limit: usize,
}

impl RecentActivity {
    pub fn new(store: SessionStore, limit: usize) -> Self {
        Self { store, limit: limit.max(1) }
    }

    pub fn entries(&self) -> Result<Vec<ActivityEntry>, StorageError> {
        Ok(self.store.read_json(keys::RECENT_ACTIVITY)?.unwrap_or_default())
    }

    pub fn record(&self, kind: &str, description: impl Into<String>) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.insert(0, ActivityEntry {
            kind: kind.to_string(),
            description: description.into(),
            at: Utc::now(),
        });
        entries.truncate(self.limit);
        self.store.write_json(keys::RECENT_ACTIVITY, &entries)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.storage().remove(keys::RECENT_ACTIVITY)
    }
}

/// Activity kind for a notification, or `None` for noise such as timer ticks.
fn activity_kind(event: &Notification) -> Option<&'static str> {
    match event {
        Notification::HoldCreated { .. } => Some("hold_created"),
        Notification::HoldExpired { .. } => Some("hold_expired"),
        Notification::HoldCancelled { .. } => Some("hold_cancelled"),
        Notification::MessageSent { .. } => Some("message_sent"),
        Notification::ConversationOpened { .. } => Some("conversation_opened"),
        _ => None,
    }
}

/// Persist relevant notifications into the activity feed until `cancel` fires.
pub fn spawn_recorder(bus: &EventBus, activity: RecentActivity, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => {
                        if let Some(kind) = activity_kind(&event) {
                            if let Err(e) = activity.record(kind, event.summary()) {
                                tracing::warn!(error = %e, "Failed to record activity");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Activity recorder lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
