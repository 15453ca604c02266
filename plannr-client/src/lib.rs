//! Platform-facing half of the client: the HTTP API, the live chat
//! transport, authentication and the per-session context that wires the
//! hold manager and conversation synchronizer together.

pub mod admin;
pub mod api;
pub mod auth;
pub mod error;
pub mod reconnect;
pub mod session;
pub mod sockjs;
pub mod stomp;
pub mod transport;

pub use admin::{AdminPanel, BookingReview};
pub use api::{PlannrApi, SignUpRequest};
pub use error::{ClientError, ClientResult};
pub use session::SessionContext;
pub use transport::StompTransport;
