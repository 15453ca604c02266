//! Calendar-day classification for the venue date picker.
//!
//! Booked and held days come from the venue's `currentBookings` and
//! `tempEvent` maps, keyed by `"{month}/{yy}"` with no leading zero on the
//! month and a two-digit year (`"7/25"` for July 2025).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use plannr_shared::Venue;

/// Exactly one status per day. Variants are listed in precedence order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayStatus {
    Past,
    Booked,
    Held,
    Selected,
    Available,
}

impl DayStatus {
    pub fn is_selectable(&self) -> bool {
        matches!(self, DayStatus::Selected | DayStatus::Available)
    }
}

/// Wire key for the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    format!("{}/{:02}", date.month(), date.year().rem_euclid(100))
}

/// Classify `date` relative to `today`. First matching predicate wins:
/// past > booked > held > selected > available.
pub fn classify_day(date: NaiveDate, today: NaiveDate, venue: &Venue, selection: &[NaiveDate]) -> DayStatus {
    if date < today {
        return DayStatus::Past;
    }

    let key = month_key(date);
    let day = date.day();

    if venue.is_booked(&key, day) {
        DayStatus::Booked
    } else if venue.is_held(&key, day) {
        DayStatus::Held
    } else if selection.contains(&date) {
        DayStatus::Selected
    } else {
        DayStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn venue() -> Venue {
        Venue {
            id: "v1".into(),
            name: "Lake House".into(),
            current_bookings: HashMap::from([("7/25".to_string(), vec![5, 6])]),
            temp_event: HashMap::from([("7/25".to_string(), vec![6, 8])]),
            ..Default::default()
        }
    }

    #[test]
    fn test_month_key_format() {
        assert_eq!(month_key(d("2025-07-05")), "7/25");
        assert_eq!(month_key(d("2025-12-31")), "12/25");
        assert_eq!(month_key(d("2005-01-01")), "1/05");
    }

    #[test]
    fn test_booked_and_available() {
        let today = d("2025-07-01");
        assert_eq!(classify_day(d("2025-07-05"), today, &venue(), &[]), DayStatus::Booked);
        assert_eq!(classify_day(d("2025-07-07"), today, &venue(), &[]), DayStatus::Available);
    }

    #[test]
    fn test_precedence_order() {
        let v = venue();
        let today = d("2025-07-06");

        // Past beats booked.
        assert_eq!(classify_day(d("2025-07-05"), today, &v, &[d("2025-07-05")]), DayStatus::Past);
        // Booked beats held.
        assert_eq!(classify_day(d("2025-07-06"), today, &v, &[]), DayStatus::Booked);
        // Held beats selected.
        assert_eq!(classify_day(d("2025-07-08"), today, &v, &[d("2025-07-08")]), DayStatus::Held);
        assert_eq!(classify_day(d("2025-07-09"), today, &v, &[d("2025-07-09")]), DayStatus::Selected);
    }

    #[test]
    fn test_same_day_number_other_month_is_free() {
        let today = d("2025-01-01");
        assert_eq!(classify_day(d("2025-08-05"), today, &venue(), &[]), DayStatus::Available);
        assert_eq!(classify_day(d("2026-07-05"), today, &venue(), &[]), DayStatus::Available);
    }

    #[test]
    fn test_classification_is_total_over_a_month() {
        let v = venue();
        let today = d("2025-07-03");
        let mut day = d("2025-07-01");
        while day.month() == 7 {
            let status = classify_day(day, today, &v, &[d("2025-07-20")]);
            let expected = if day < today {
                DayStatus::Past
            } else if [5, 6].contains(&day.day()) {
                DayStatus::Booked
            } else if day.day() == 8 {
                DayStatus::Held
            } else if day.day() == 20 {
                DayStatus::Selected
            } else {
                DayStatus::Available
            };
            assert_eq!(status, expected, "day {}", day);
            day = day.succ_opt().unwrap();
        }
    }
}
