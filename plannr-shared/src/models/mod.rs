pub mod booking;
pub mod chat;
pub mod events;
pub mod hold;
pub mod user;
pub mod venue;
