//! Admin panel: the pending-booking queue with approve/reject and a
//! periodic refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use plannr_shared::{BookingDetail, Notification};
use plannr_store::EventBus;

use crate::api::PlannrApi;
use crate::error::{ClientError, ClientResult};

#[async_trait]
pub trait BookingReview: Send + Sync {
    async fn pending_bookings(&self) -> ClientResult<Vec<BookingDetail>>;

    async fn approve(&self, booking_id: &str) -> ClientResult<()>;

    async fn reject(&self, booking_id: &str) -> ClientResult<()>;
}

#[async_trait]
impl BookingReview for PlannrApi {
    async fn pending_bookings(&self) -> ClientResult<Vec<BookingDetail>> {
        PlannrApi::pending_bookings(self).await
    }

    async fn approve(&self, booking_id: &str) -> ClientResult<()> {
        self.approve_booking(booking_id).await
    }

    async fn reject(&self, booking_id: &str) -> ClientResult<()> {
        self.reject_booking(booking_id).await
    }
}

pub struct AdminPanel {
    review: Arc<dyn BookingReview>,
    events: EventBus,
    pending: RwLock<Vec<BookingDetail>>,
}

impl AdminPanel {
    pub fn new(review: Arc<dyn BookingReview>, events: EventBus) -> Arc<Self> {
        Arc::new(Self { review, events, pending: RwLock::new(Vec::new()) })
    }

    pub async fn pending(&self) -> Vec<BookingDetail> {
        self.pending.read().await.clone()
    }

    /// An expired or revoked session also raises `AuthenticationRequired`.
    fn report(&self, err: &ClientError) {
        if err.is_auth_failure() {
            tracing::warn!(error = %err, "Admin call rejected, session must sign in again");
            self.events.publish(Notification::AuthenticationRequired { reason: err.to_string() });
        }
        self.events.publish(Notification::InlineError { scope: "admin".into(), message: err.to_string() });
    }

    pub async fn refresh(&self) -> ClientResult<usize> {
        let bookings = match self.review.pending_bookings().await {
            Ok(b) => b,
            Err(e) => {
                self.report(&e);
                return Err(e);
            }
        };
        let count = bookings.len();
        *self.pending.write().await = bookings;
        self.events.publish(Notification::PendingBookingsRefreshed { count });
        Ok(count)
    }

    pub async fn approve(&self, booking_id: &str) -> ClientResult<()> {
        if let Err(e) = self.review.approve(booking_id).await {
            self.report(&e);
            return Err(e);
        }
        self.forget(booking_id).await;
        tracing::info!(booking_id = %booking_id, "Booking approved");
        Ok(())
    }

    pub async fn reject(&self, booking_id: &str) -> ClientResult<()> {
        if let Err(e) = self.review.reject(booking_id).await {
            self.report(&e);
            return Err(e);
        }
        self.forget(booking_id).await;
        tracing::info!(booking_id = %booking_id, "Booking rejected");
        Ok(())
    }

    async fn forget(&self, booking_id: &str) {
        self.pending.write().await.retain(|b| b.id != booking_id);
    }

    /// Refresh on a fixed interval until `cancel` fires.
    pub fn spawn_refresher(self: &Arc<Self>, every: Duration, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let panel = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(interval_secs = every.as_secs(), "Admin refresh started");
            let mut interval = tokio::time::interval(every);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Admin refresh stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match panel.refresh().await {
                            Ok(count) => tracing::debug!(count, "Pending bookings refreshed"),
                            Err(e) => tracing::warn!(error = %e, "Pending bookings refresh failed"),
                        }
                    }
                }
            }
        })
    }
}
