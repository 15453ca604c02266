use serde::Serialize;

/// Lifecycle of the real-time transport for one page session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed {
        chat_id: String,
        subscription_id: String,
    },
}

impl TransportState {
    fn name(&self) -> &'static str {
        match self {
            TransportState::Disconnected => "DISCONNECTED",
            TransportState::Connecting => "CONNECTING",
            TransportState::Connected => "CONNECTED",
            TransportState::Subscribed { .. } => "SUBSCRIBED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid transport transition from {from} to {to}")]
    Invalid {
        from: &'static str,
        to: &'static str,
    },
}

/// Guarded transport state machine. At most one subscription exists at a
/// time: subscribing from `Subscribed` is rejected, so callers must
/// unsubscribe first.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    state: TransportState,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self { state: TransportState::Disconnected }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, TransportState::Connected | TransportState::Subscribed { .. })
    }

    /// `(chat_id, subscription_id)` of the live subscription.
    pub fn subscription(&self) -> Option<(&str, &str)> {
        match &self.state {
            TransportState::Subscribed { chat_id, subscription_id } => Some((chat_id.as_str(), subscription_id.as_str())),
            _ => None,
        }
    }

    pub fn begin_connect(&mut self) -> Result<(), TransitionError> {
        self.transition("CONNECTING", |s| matches!(s, TransportState::Disconnected), TransportState::Connecting)
    }

    pub fn connected(&mut self) -> Result<(), TransitionError> {
        self.transition("CONNECTED", |s| matches!(s, TransportState::Connecting), TransportState::Connected)
    }

    pub fn subscribed(&mut self, chat_id: String, subscription_id: String) -> Result<(), TransitionError> {
        self.transition(
            "SUBSCRIBED",
            |s| matches!(s, TransportState::Connected),
            TransportState::Subscribed { chat_id, subscription_id },
        )
    }

    /// `Subscribed -> Connected`, returning the dropped subscription id.
    pub fn unsubscribed(&mut self) -> Result<String, TransitionError> {
        match std::mem::replace(&mut self.state, TransportState::Connected) {
            TransportState::Subscribed { subscription_id, .. } => Ok(subscription_id),
            other => {
                let from = other.name();
                self.state = other;
                Err(TransitionError::Invalid { from, to: "CONNECTED" })
            }
        }
    }

    /// Any state may drop to `Disconnected` (socket closed, connect failed, logout).
    pub fn disconnected(&mut self) {
        if self.state != TransportState::Disconnected {
            tracing::info!(from = self.state.name(), "Transport disconnected");
        }
        self.state = TransportState::Disconnected;
    }

    fn transition(
        &mut self,
        to: &'static str,
        allowed: impl Fn(&TransportState) -> bool,
        next: TransportState,
    ) -> Result<(), TransitionError> {
        if !allowed(&self.state) {
            return Err(TransitionError::Invalid { from: self.state.name(), to });
        }
        tracing::debug!(from = self.state.name(), to, "Transport transition");
        self.state = next;
        Ok(())
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
