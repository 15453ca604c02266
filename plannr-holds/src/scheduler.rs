//! Countdown timers for live holds.
//!
//! One task per hold ticks on a fixed interval. Every tick re-reads the
//! hold through the manager, so a hold removed by the user in between ends
//! the timer instead of firing on a stale copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use plannr_shared::{Notification, User, Venue};
use plannr_store::EventBus;

use crate::manager::{HoldError, HoldManager, HoldOutcome, HoldTick};

pub struct HoldScheduler {
    manager: Arc<Mutex<HoldManager>>,
    timers: StdMutex<HashMap<Uuid, CancellationToken>>,
    tick_interval: Duration,
    events: EventBus,
    /// Parent of every per-hold token; cancelled on shutdown.
    cancel: CancellationToken,
}

impl HoldScheduler {
    pub fn new(manager: Arc<Mutex<HoldManager>>, tick_interval: Duration, events: EventBus) -> Arc<Self> {
        Arc::new(Self {
            manager,
            timers: StdMutex::new(HashMap::new()),
            tick_interval,
            events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn manager(&self) -> Arc<Mutex<HoldManager>> {
        self.manager.clone()
    }

    /// Expire holds that lapsed while the client was closed and start timers
    /// for the rest. Returns the number of timers started.
    pub async fn restore(self: &Arc<Self>) -> Result<usize, HoldError> {
        let live = {
            let mut manager = self.manager.lock().await;
            let expired = manager.purge_expired()?;
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "Expired holds purged on restore");
            }
            manager.list_holds()?
        };

        for hold in &live {
            self.track(hold.id);
        }
        Ok(live.len())
    }

    /// Create a hold and start its countdown.
    pub async fn create_hold(
        self: &Arc<Self>,
        dates: Vec<NaiveDate>,
        venue: &Venue,
        user: Option<&User>,
    ) -> Result<HoldOutcome, HoldError> {
        let outcome = self.manager.lock().await.create_hold(dates, venue, user)?;
        if let HoldOutcome::Created(hold) = &outcome {
            self.track(hold.id);
        }
        Ok(outcome)
    }

    /// Create the hold parked before sign-in, if any, and start its countdown.
    pub async fn resume_pending(self: &Arc<Self>, user: &User) -> Result<Option<Uuid>, HoldError> {
        let hold = self.manager.lock().await.resume_pending(user)?;
        Ok(hold.map(|h| {
            self.track(h.id);
            h.id
        }))
    }

    /// Stop the timer and remove the hold.
    pub async fn cancel_hold(&self, hold_id: &Uuid) -> Result<bool, HoldError> {
        self.stop(hold_id);
        self.manager.lock().await.cancel_hold(hold_id)
    }

    /// Start a countdown for `hold_id`. No-op if one is already running.
    pub fn track(self: &Arc<Self>, hold_id: Uuid) {
        let token = {
            let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
            if timers.contains_key(&hold_id) {
                return;
            }
            let token = self.cancel.child_token();
            timers.insert(hold_id, token.clone());
            token
        };

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_countdown(hold_id, token).await;
            scheduler.forget(&hold_id);
        });
    }

    /// Cancel the timer for `hold_id` without touching the hold itself.
    pub fn stop(&self, hold_id: &Uuid) {
        if let Some(token) = self.forget(hold_id) {
            token.cancel();
        }
    }

    pub fn active_timers(&self) -> usize {
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn shutdown(&self) {
        tracing::info!("Stopping hold timers");
        self.cancel.cancel();
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn forget(&self, hold_id: &Uuid) -> Option<CancellationToken> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).remove(hold_id)
    }

    async fn run_countdown(&self, hold_id: Uuid, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::debug!(hold_id = %hold_id, "Hold countdown started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(hold_id = %hold_id, "Hold countdown cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let mut manager = self.manager.lock().await;
                    match manager.tick_hold(&hold_id) {
                        Ok(None) => {
                            tracing::debug!(hold_id = %hold_id, "Hold gone, countdown ends");
                            return;
                        }
                        Ok(Some(HoldTick::Remaining(left))) => {
                            self.events.publish(Notification::HoldCountdown {
                                hold_id,
                                remaining_secs: (left.num_milliseconds() + 999) / 1000,
                            });
                        }
                        Ok(Some(HoldTick::Expired)) => {
                            if let Err(e) = manager.expire_hold(&hold_id) {
                                tracing::error!(hold_id = %hold_id, error = %e, "Failed to expire hold");
                            }
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(hold_id = %hold_id, error = %e, "Hold tick failed");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plannr_core::clock::ManualClock;
    use plannr_store::{MemoryStorage, SessionStore};

    fn setup() -> (Arc<HoldScheduler>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let events = EventBus::new();
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        let manager = HoldManager::new(
            Arc::new(store.holds()),
            clock.clone(),
            chrono::Duration::minutes(10),
            events.clone(),
        );
        let scheduler = HoldScheduler::new(Arc::new(Mutex::new(manager)), Duration::from_millis(100), events);
        (scheduler, clock)
    }

    fn venue() -> Venue {
        Venue { id: "v1".into(), name: "Lake House".into(), ..Default::default() }
    }

    fn user() -> User {
        User { id: "u1".into(), email: "u1@x.com".into(), name: None, role: None }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 7, 5).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_hold() {
        let (scheduler, clock) = setup();
        let HoldOutcome::Created(hold) = scheduler.create_hold(vec![date()], &venue(), Some(&user())).await.unwrap() else {
            panic!("expected a hold");
        };
        assert_eq!(scheduler.active_timers(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(scheduler.manager().lock().await.get_hold(&hold.id).unwrap().is_some());

        clock.advance(chrono::Duration::milliseconds(600_001));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(scheduler.manager().lock().await.list_holds().unwrap().is_empty());
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_timer() {
        let (scheduler, _) = setup();
        let HoldOutcome::Created(hold) = scheduler.create_hold(vec![date()], &venue(), Some(&user())).await.unwrap() else {
            panic!("expected a hold");
        };

        assert!(scheduler.cancel_hold(&hold.id).await.unwrap());
        assert_eq!(scheduler.active_timers(), 0);
        assert!(!scheduler.cancel_hold(&hold.id).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ends_when_hold_removed_elsewhere() {
        let (scheduler, _) = setup();
        let HoldOutcome::Created(hold) = scheduler.create_hold(vec![date()], &venue(), Some(&user())).await.unwrap() else {
            panic!("expected a hold");
        };

        // Removed directly through the manager, bypassing the scheduler.
        scheduler.manager().lock().await.cancel_hold(&hold.id).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_purges_lapsed_and_tracks_live() {
        let (scheduler, clock) = setup();
        {
            let manager = scheduler.manager();
            let mut manager = manager.lock().await;
            manager.create_hold(vec![date()], &venue(), Some(&user())).unwrap();
            clock.advance(chrono::Duration::minutes(11));
            manager.create_hold(vec![date()], &venue(), Some(&user())).unwrap();
        }

        assert_eq!(scheduler.restore().await.unwrap(), 1);
        assert_eq!(scheduler.active_timers(), 1);
        assert_eq!(scheduler.manager().lock().await.list_holds().unwrap().len(), 1);

        scheduler.shutdown();
        assert_eq!(scheduler.active_timers(), 0);
    }
}
