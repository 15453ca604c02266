use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Default window between hold creation and automatic expiry (10 minutes).
pub const DEFAULT_HOLD_DURATION_MS: i64 = 600_000;

/// Hold status. Only `Temporary` is produced client-side; confirmation is server-driven.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    Temporary,
    Confirmed,
}

/// A time-boxed reservation of calendar dates, owned by the local session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hold {
    pub id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub venue_name: String,
    pub selected_dates: Vec<NaiveDate>,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// Build a temporary hold. Dates are sorted and de-duplicated.
    pub fn new(
        user_id: String,
        venue_id: String,
        venue_name: String,
        mut selected_dates: Vec<NaiveDate>,
        created_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        selected_dates.sort();
        selected_dates.dedup();

        Self {
            id: Uuid::new_v4(),
            user_id,
            venue_id,
            venue_name,
            selected_dates,
            status: HoldStatus::Temporary,
            created_at,
            expires_at: created_at + duration,
        }
    }

    /// Window this hold was created with.
    pub fn duration(&self) -> Duration {
        self.expires_at - self.created_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
