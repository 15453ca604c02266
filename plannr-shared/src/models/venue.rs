use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Map from a `"{month}/{yy}"` key (e.g. `"7/25"`) to the days of that month.
pub type DayMap = HashMap<String, Vec<u32>>;

/// Venue as returned by `/api/venues/search` and `/api/venues/all`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    /// Confirmed bookings.
    #[serde(default)]
    pub current_bookings: DayMap,
    /// Dates temporarily held by other users.
    #[serde(default)]
    pub temp_event: DayMap,
}

impl Venue {
    pub fn is_booked(&self, month_key: &str, day: u32) -> bool {
        contains_day(&self.current_bookings, month_key, day)
    }

    pub fn is_held(&self, month_key: &str, day: u32) -> bool {
        contains_day(&self.temp_event, month_key, day)
    }
}

fn contains_day(map: &DayMap, month_key: &str, day: u32) -> bool {
    map.get(month_key).is_some_and(|days| days.contains(&day))
}
