//! Quorum replication (spec §4.4) and the read-repair engine (spec §4.5).

#[macro_use]
extern crate tracing;

pub mod read_repair;
pub mod replicate;

pub use read_repair::{NoopReadRepairer, ReadOutcome, ReadRepairEngine, ReadRepairer};
pub use replicate::Replicator;
