//! Watchdog Subscriber / Adaptive Controller (spec §4.7): couples watchdog
//! alarms to compactor and message-queue concurrency, and triggers
//! opportunistic compaction when cluster conditions permit.

#[macro_use]
extern crate tracing;

pub mod compactor;
pub mod controller;
pub mod state;

pub use compactor::CompactorFsm;
pub use controller::AdaptiveController;
pub use state::{UnsafeRegistry, WatchdogState};
