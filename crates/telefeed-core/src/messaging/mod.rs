//! Messaging transport abstractions (Telegram today).

pub mod guarded;
pub mod port;
pub mod throttled;
pub mod types;
