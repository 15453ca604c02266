pub mod availability;
pub mod clock;
pub mod identity;
pub mod repository;

/// Failure reported by a remote collaborator (HTTP API or real-time transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Request rejected, timed out, or answered with a non-2xx status.
    #[error("Network error: {0}")]
    Network(String),
    /// 401/403: the session must re-authenticate.
    #[error("Unauthorized ({status})")]
    Unauthorized { status: u16 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ServiceError::Unauthorized { .. })
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
