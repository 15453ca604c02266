use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use plannr_core::availability::DayStatus;
use plannr_core::clock::Clock;
use plannr_core::repository::{HoldPersistence, StorageError};
use plannr_shared::{Hold, Notification, User, Venue};
use plannr_store::EventBus;

use crate::calendar::DateSelection;
use crate::store::HoldStore;

/// Countdown state of a hold at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTick {
    Remaining(Duration),
    Expired,
}

/// `Expired` exactly when `now >= expires_at`.
pub fn tick(hold: &Hold, now: DateTime<Utc>) -> HoldTick {
    if hold.is_expired_at(now) {
        HoldTick::Expired
    } else {
        HoldTick::Remaining(hold.expires_at - now)
    }
}

/// `MM:SS` for the dashboard timer, rounded up so `00:00` only shows at expiry.
pub fn format_remaining(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let secs = (millis + 999) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoldOutcome {
    Created(Hold),
    /// No authenticated user: the selection was parked until sign-in.
    Deferred,
}

/// Selection parked while the user authenticates.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHold {
    pub venue: Venue,
    pub dates: Vec<NaiveDate>,
}

/// Owns the hold lifecycle: create, list, expire, cancel.
///
/// Every mutation re-reads the persisted collection, applies the change and
/// writes the whole collection back, so concurrent timers and user actions
/// always act on current state.
pub struct HoldManager {
    persistence: Arc<dyn HoldPersistence>,
    clock: Arc<dyn Clock>,
    duration: Duration,
    events: EventBus,
    selection: DateSelection,
    pending: Option<PendingHold>,
}

impl HoldManager {
    pub fn new(
        persistence: Arc<dyn HoldPersistence>,
        clock: Arc<dyn Clock>,
        duration: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            persistence,
            clock,
            duration,
            events,
            selection: DateSelection::new(),
            pending: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn selection(&self) -> &DateSelection {
        &self.selection
    }

    /// Toggle a calendar day in the in-progress selection.
    pub fn toggle_date(&mut self, venue: &Venue, date: NaiveDate) -> Result<DayStatus, HoldError> {
        let today = self.clock.now().date_naive();
        self.selection.toggle(date, today, venue)
    }

    pub fn pending(&self) -> Option<&PendingHold> {
        self.pending.as_ref()
    }

    /// Create a temporary hold for `dates` at `venue`.
    ///
    /// Without a user the request is deferred: the calendar selection is
    /// cleared, the dates are parked for [`resume_pending`](Self::resume_pending),
    /// and an `AuthenticationRequired` notification is published.
    pub fn create_hold(
        &mut self,
        dates: Vec<NaiveDate>,
        venue: &Venue,
        user: Option<&User>,
    ) -> Result<HoldOutcome, HoldError> {
        if dates.is_empty() {
            return Err(HoldError::EmptySelection);
        }

        let Some(user) = user else {
            info!(venue_id = %venue.id, dates = dates.len(), "Hold deferred until sign-in");
            self.selection.clear();
            self.pending = Some(PendingHold { venue: venue.clone(), dates });
            self.events.publish(Notification::AuthenticationRequired {
                reason: "Sign in to hold these dates".to_string(),
            });
            return Ok(HoldOutcome::Deferred);
        };

        let hold = Hold::new(
            user.id.clone(),
            venue.id.clone(),
            venue.name.clone(),
            dates,
            self.clock.now(),
            self.duration,
        );

        let mut store = self.load_store()?;
        store.insert(hold.clone())?;
        self.persistence.save(store.as_slice())?;

        self.selection.clear();
        info!(hold_id = %hold.id, venue_id = %hold.venue_id, expires_at = %hold.expires_at, "Hold created");
        self.events.publish(Notification::HoldCreated {
            hold_id: hold.id,
            venue_name: hold.venue_name.clone(),
            expires_at: hold.expires_at,
        });

        Ok(HoldOutcome::Created(hold))
    }

    /// Create a hold from the manager's own date selection.
    pub fn confirm_selection(&mut self, venue: &Venue, user: Option<&User>) -> Result<HoldOutcome, HoldError> {
        let dates = self.selection.dates();
        self.create_hold(dates, venue, user)
    }

    /// Replay a request deferred by a missing sign-in.
    pub fn resume_pending(&mut self, user: &User) -> Result<Option<Hold>, HoldError> {
        let Some(pending) = self.pending.take() else {
            return Ok(None);
        };

        match self.create_hold(pending.dates, &pending.venue, Some(user))? {
            HoldOutcome::Created(hold) => Ok(Some(hold)),
            HoldOutcome::Deferred => Ok(None),
        }
    }

    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    /// All stored holds in creation order.
    pub fn list_holds(&self) -> Result<Vec<Hold>, HoldError> {
        Ok(self.load_store()?.into_vec())
    }

    pub fn get_hold(&self, hold_id: &Uuid) -> Result<Option<Hold>, HoldError> {
        Ok(self.load_store()?.get(hold_id).cloned())
    }

    /// Countdown for a stored hold, `None` if it is gone.
    pub fn tick_hold(&self, hold_id: &Uuid) -> Result<Option<HoldTick>, HoldError> {
        let now = self.clock.now();
        Ok(self.get_hold(hold_id)?.map(|hold| tick(&hold, now)))
    }

    /// Remove an expired hold. Returns `false` if it was already gone.
    pub fn expire_hold(&mut self, hold_id: &Uuid) -> Result<bool, HoldError> {
        match self.remove(hold_id)? {
            Some(hold) => {
                info!(hold_id = %hold.id, "Hold expired");
                self.events.publish(Notification::HoldExpired {
                    hold_id: hold.id,
                    venue_name: hold.venue_name,
                });
                Ok(true)
            }
            None => {
                debug!(hold_id = %hold_id, "Expire on missing hold ignored");
                Ok(false)
            }
        }
    }

    /// User-initiated removal. Returns `false` if it was already gone.
    pub fn cancel_hold(&mut self, hold_id: &Uuid) -> Result<bool, HoldError> {
        match self.remove(hold_id)? {
            Some(hold) => {
                info!(hold_id = %hold.id, "Hold cancelled");
                self.events.publish(Notification::HoldCancelled {
                    hold_id: hold.id,
                    venue_name: hold.venue_name,
                });
                Ok(true)
            }
            None => {
                debug!(hold_id = %hold_id, "Cancel on missing hold ignored");
                Ok(false)
            }
        }
    }

    /// Expire every hold whose window has lapsed, e.g. while the client was closed.
    pub fn purge_expired(&mut self) -> Result<Vec<Uuid>, HoldError> {
        let now = self.clock.now();
        let lapsed: Vec<Uuid> = self
            .load_store()?
            .as_slice()
            .iter()
            .filter(|h| h.is_expired_at(now))
            .map(|h| h.id)
            .collect();

        for id in &lapsed {
            self.expire_hold(id)?;
        }
        Ok(lapsed)
    }

    fn load_store(&self) -> Result<HoldStore, HoldError> {
        let records = self.persistence.load().map_err(|e| {
            warn!(error = %e, "Failed to load holds");
            HoldError::Storage(e)
        })?;
        Ok(HoldStore::from_records(records))
    }

    fn remove(&mut self, hold_id: &Uuid) -> Result<Option<Hold>, HoldError> {
        let mut store = self.load_store()?;
        let removed = store.remove(hold_id);
        if removed.is_some() {
            self.persistence.save(store.as_slice())?;
        }
        Ok(removed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HoldError {
    #[error("No dates selected")]
    EmptySelection,

    #[error("Date {date} cannot be selected: {status:?}")]
    NotSelectable {
        date: NaiveDate,
        status: DayStatus,
    },

    #[error("Hold {0} already exists")]
    DuplicateId(Uuid),

    #[error("Hold storage failed: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use plannr_core::clock::ManualClock;
    use plannr_store::{MemoryStorage, SessionStore};

    fn setup() -> (HoldManager, Arc<ManualClock>, EventBus) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let events = EventBus::new();
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let manager = HoldManager::new(
            Arc::new(store.holds()),
            clock.clone(),
            Duration::milliseconds(600_000),
            events.clone(),
        );
        (manager, clock, events)
    }

    fn venue() -> Venue {
        Venue { id: "v1".into(), name: "Lake House".into(), ..Default::default() }
    }

    fn user() -> User {
        User { id: "u1".into(), email: "u1@x.com".into(), name: None, role: None }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_tick_boundary() {
        let (mut manager, clock, _) = setup();
        let HoldOutcome::Created(hold) = manager.create_hold(vec![d("2025-07-05")], &venue(), Some(&user())).unwrap() else {
            panic!("expected a hold");
        };

        assert_eq!(tick(&hold, hold.expires_at - Duration::milliseconds(1)), HoldTick::Remaining(Duration::milliseconds(1)));
        assert_eq!(tick(&hold, hold.expires_at), HoldTick::Expired);

        clock.advance(Duration::milliseconds(599_999));
        assert!(matches!(manager.tick_hold(&hold.id).unwrap(), Some(HoldTick::Remaining(_))));
        clock.advance(Duration::milliseconds(1));
        assert_eq!(manager.tick_hold(&hold.id).unwrap(), Some(HoldTick::Expired));
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let (mut manager, _, _) = setup();
        assert!(matches!(manager.create_hold(vec![], &venue(), Some(&user())), Err(HoldError::EmptySelection)));
        assert!(manager.list_holds().unwrap().is_empty());
    }

    #[test]
    fn test_create_clears_selection() {
        let (mut manager, clock, _) = setup();
        clock.set(DateTime::parse_from_rfc3339("2025-07-01T09:00:00Z").unwrap().with_timezone(&Utc));

        manager.toggle_date(&venue(), d("2025-07-05")).unwrap();
        manager.toggle_date(&venue(), d("2025-07-06")).unwrap();
        let outcome = manager.confirm_selection(&venue(), Some(&user())).unwrap();

        let HoldOutcome::Created(hold) = outcome else { panic!("expected a hold") };
        assert_eq!(hold.selected_dates, vec![d("2025-07-05"), d("2025-07-06")]);
        assert!(manager.selection().is_empty());
    }

    #[test]
    fn test_deferred_without_user_then_resumed() {
        let (mut manager, _, events) = setup();
        let mut rx = events.subscribe();

        let outcome = manager.create_hold(vec![d("2025-07-05")], &venue(), None).unwrap();
        assert_eq!(outcome, HoldOutcome::Deferred);
        assert!(manager.list_holds().unwrap().is_empty());
        assert!(matches!(rx.try_recv().unwrap(), Notification::AuthenticationRequired { .. }));

        let hold = manager.resume_pending(&user()).unwrap().expect("pending hold should be created");
        assert_eq!(hold.user_id, "u1");
        assert_eq!(manager.list_holds().unwrap(), vec![hold]);
        assert!(manager.pending().is_none());
        assert_eq!(manager.resume_pending(&user()).unwrap(), None);
    }

    #[test]
    fn test_expire_and_cancel_are_idempotent() {
        let (mut manager, _, events) = setup();
        let mut rx = events.subscribe();

        let HoldOutcome::Created(a) = manager.create_hold(vec![d("2025-07-05")], &venue(), Some(&user())).unwrap() else { panic!() };
        let HoldOutcome::Created(b) = manager.create_hold(vec![d("2025-07-09")], &venue(), Some(&user())).unwrap() else { panic!() };

        assert!(manager.expire_hold(&a.id).unwrap());
        assert!(!manager.expire_hold(&a.id).unwrap());
        assert!(manager.cancel_hold(&b.id).unwrap());
        assert!(!manager.cancel_hold(&b.id).unwrap());
        assert!(manager.list_holds().unwrap().is_empty());

        let kinds: Vec<Notification> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(kinds.iter().filter(|n| matches!(n, Notification::HoldExpired { .. })).count(), 1);
        assert_eq!(kinds.iter().filter(|n| matches!(n, Notification::HoldCancelled { .. })).count(), 1);
    }

    #[test]
    fn test_purge_expired_only_removes_lapsed() {
        let (mut manager, clock, _) = setup();
        let HoldOutcome::Created(old) = manager.create_hold(vec![d("2025-07-05")], &venue(), Some(&user())).unwrap() else { panic!() };
        clock.advance(Duration::minutes(5));
        let HoldOutcome::Created(fresh) = manager.create_hold(vec![d("2025-07-06")], &venue(), Some(&user())).unwrap() else { panic!() };
        clock.advance(Duration::minutes(6));

        assert_eq!(manager.purge_expired().unwrap(), vec![old.id]);
        assert_eq!(manager.list_holds().unwrap(), vec![fresh]);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::milliseconds(600_000)), "10:00");
        assert_eq!(format_remaining(Duration::milliseconds(59_001)), "01:00");
        assert_eq!(format_remaining(Duration::milliseconds(1)), "00:01");
        assert_eq!(format_remaining(Duration::milliseconds(-5)), "00:00");
    }
}
