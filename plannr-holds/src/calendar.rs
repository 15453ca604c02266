//! In-progress date selection and month rendering for the venue calendar.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use plannr_core::availability::{classify_day, DayStatus};
use plannr_shared::Venue;

use crate::manager::HoldError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: DayStatus,
}

/// Dates picked for one venue, before they are turned into a hold.
#[derive(Debug, Default, Clone)]
pub struct DateSelection {
    venue_id: Option<String>,
    dates: BTreeSet<NaiveDate>,
}

impl DateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn venue_id(&self) -> Option<&str> {
        self.venue_id.as_deref()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.dates.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn clear(&mut self) {
        self.venue_id = None;
        self.dates.clear();
    }

    /// Select or deselect `date`. Switching venues starts a fresh selection.
    /// Returns the day's status after the toggle.
    pub fn toggle(&mut self, date: NaiveDate, today: NaiveDate, venue: &Venue) -> Result<DayStatus, HoldError> {
        if self.venue_id.as_deref() != Some(venue.id.as_str()) {
            self.clear();
            self.venue_id = Some(venue.id.clone());
        }

        let current: Vec<NaiveDate> = self.dates();
        match classify_day(date, today, venue, &current) {
            DayStatus::Selected => {
                self.dates.remove(&date);
                Ok(DayStatus::Available)
            }
            DayStatus::Available => {
                self.dates.insert(date);
                Ok(DayStatus::Selected)
            }
            status => Err(HoldError::NotSelectable { date, status }),
        }
    }
}

/// Classify every day of `year`-`month`.
pub fn month_view(year: i32, month: u32, today: NaiveDate, venue: &Venue, selection: &[NaiveDate]) -> Vec<CalendarDay> {
    let Some(mut day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut days = Vec::with_capacity(31);
    while day.month() == month {
        days.push(CalendarDay {
            date: day,
            status: classify_day(day, today, venue, selection),
        });
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}
