//! Capture Module
//!
//! What the monitor records while it is running:
//! - Change events (one per row add, update or delete)
//! - The structural diff used to print them
//! - The event log with its start/stop gate and JSON export

pub mod diff;
pub mod event;
pub mod store;

pub use store::EventLog;
