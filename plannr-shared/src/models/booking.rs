use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

/// Approval state of a booking request on the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

/// Add-on service attachable to a booking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Vendor,
    Cook,
    Decorator,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Vendor => "vendor",
            ServiceKind::Cook => "cook",
            ServiceKind::Decorator => "decorator",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    pub id: String,
    pub venue_id: String,
    #[serde(default)]
    pub venue_name: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    pub status: BookingStatus,
    #[serde(default)]
    pub vendors: Vec<serde_json::Value>,
    #[serde(default)]
    pub cooks: Vec<serde_json::Value>,
    #[serde(default)]
    pub decorators: Vec<serde_json::Value>,
}
