//! The N/W/R/D replication parameters (spec GLOSSARY: "N/W/R/D: replication
//! factor, write quorum, read quorum, delete quorum").

use serde::{Deserialize, Serialize};

/// Which operation a Redundancy Resolver lookup is for. May affect ordering
/// (spec §4.1: "`op` may affect ordering (preferred primary first)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
	Get,
	Put,
}

/// Replication parameters for a table/bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationParams {
	pub n: usize,
	pub w: usize,
	pub r: usize,
	pub d: usize,
}

impl ReplicationParams {
	pub fn new(n: usize, w: usize, r: usize, d: usize) -> Self {
		Self { n, w, r, d }
	}

	/// The method-specific quorum used by the Replicator (spec §4.4 point 5):
	/// PUT uses W, DELETE uses D.
	pub fn quorum_for(&self, method: crate::peer::ReplicateMethod) -> usize {
		match method {
			crate::peer::ReplicateMethod::Put => self.w,
			crate::peer::ReplicateMethod::Delete => self.d,
		}
	}
}
