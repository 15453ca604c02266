use plannr_core::repository::StorageError;
use plannr_core::ServiceError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered with a non-2xx status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Unexpected SockJS or STOMP frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// 401/403 from the platform: the session has to sign in again.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Api { status: 401 | 403, .. })
    }
}

impl From<ClientError> for ServiceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status: status @ (401 | 403), .. } => ServiceError::Unauthorized { status },
            ClientError::Api { status: 404, body } => ServiceError::NotFound(body),
            ClientError::Request(e) if e.is_decode() => ServiceError::Malformed(e.to_string()),
            ClientError::Token(e) => ServiceError::Malformed(e.to_string()),
            e @ (ClientError::WebSocket(_) | ClientError::Protocol(_) | ClientError::NotConnected) => {
                ServiceError::Transport(e.to_string())
            }
            other => ServiceError::Network(other.to_string()),
        }
    }
}
