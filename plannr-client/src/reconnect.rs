//! Exponential-backoff reconnection for the chat transport.
//!
//! The synchronizer never reconnects on its own; the binary calls
//! [`reconnect_loop`] when the delivery channel closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use plannr_chat::synchronizer::spawn_delivery_pump;
use plannr_chat::ConversationSynchronizer;
use plannr_core::repository::Delivery;
use plannr_store::app_config::TransportConfig;

pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    pub fn from_transport(config: &TransportConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.reconnect_initial_ms),
            max_delay: Duration::from_millis(config.reconnect_max_ms),
            ..Default::default()
        }
    }
}

/// Next delay, clamped to `max_delay`.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Retry `connect` until it succeeds or `cancel` fires. The active
/// conversation is re-subscribed by the synchronizer on success.
pub async fn reconnect_loop(
    sync: &Arc<Mutex<ConversationSynchronizer>>,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<mpsc::UnboundedReceiver<Delivery>> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting chat transport");

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = async { sync.lock().await.connect().await } => result,
        };

        match result {
            Ok(rx) => {
                tracing::info!(attempt, "Chat transport reconnected");
                return Some(rx);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
            }
        }

        delay = next_delay(delay, config);
    }
}

/// Connect, pump deliveries, and reconnect whenever the socket drops.
/// Runs until `cancel` fires.
pub async fn run_connection_loop(
    sync: Arc<Mutex<ConversationSynchronizer>>,
    config: ReconnectConfig,
    cancel: CancellationToken,
) {
    let first = sync.lock().await.connect().await;
    let mut rx = match first {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(error = %e, "Chat connection failed, entering reconnect loop");
            match reconnect_loop(&sync, &config, &cancel).await {
                Some(rx) => rx,
                None => return,
            }
        }
    };

    loop {
        let pump = spawn_delivery_pump(Arc::clone(&sync), rx, cancel.child_token());
        if let Err(e) = pump.await {
            tracing::error!(error = %e, "Delivery pump panicked");
        }
        if cancel.is_cancelled() {
            return;
        }

        tracing::warn!("Chat connection lost, reconnecting");
        rx = match reconnect_loop(&sync, &config, &cancel).await {
            Some(rx) => rx,
            None => return,
        };
    }
}
