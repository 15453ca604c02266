pub mod calendar;
pub mod manager;
pub mod scheduler;
pub mod store;

pub use calendar::{month_view, CalendarDay, DateSelection};
pub use manager::{format_remaining, tick, HoldError, HoldManager, HoldOutcome, HoldTick, PendingHold};
pub use scheduler::HoldScheduler;
pub use store::HoldStore;
