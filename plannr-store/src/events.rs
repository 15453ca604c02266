use tokio::sync::broadcast;
use tracing::debug;
use plannr_shared::Notification;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of UI notifications. Publishing never fails; with no
/// subscribers the event is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Notification) {
        debug!(event = %event.summary(), "Notification");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
