//! Peer RPC contracts, the Redundancy Resolver and quorum/request-strategy
//! helpers (spec §4.1, §6).

#[macro_use]
extern crate tracing;

pub mod peer;
pub mod quorum;
pub mod redundancy;
pub mod replication_mode;

pub use peer::*;
pub use quorum::*;
pub use redundancy::*;
pub use replication_mode::*;
