//! Quorum computation and the active-replica filter shared by the Replicator
//! and the Read-Repair Engine (spec §4.4 point 5, §4.5 step 1).

use corestore_util::data::RedundancySet;
use corestore_util::error::Error;

use crate::peer::ReplicateMethod;
use crate::replication_mode::ReplicationParams;

/// Priority tag for a request, mirroring the teacher's `PRIO_NORMAL` /
/// `PRIO_BACKGROUND` / `PRIO_SECONDARY` constants; used by the node binary's
/// peer transport to prioritize interactive traffic over anti-entropy and
/// repair traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
	Background,
	Secondary,
	Normal,
}

/// How many replicas a call must reach before its initiator stops waiting.
/// Kept distinct from `ReplicationParams` because individual calls (e.g.
/// anti-entropy offload) sometimes need a quorum outside N/W/R/D.
#[derive(Debug, Clone, Copy)]
pub struct RequestStrategy {
	pub priority: Priority,
	pub quorum: usize,
}

impl RequestStrategy {
	pub fn with_priority(priority: Priority) -> Self {
		Self {
			priority,
			quorum: 1,
		}
	}

	pub fn with_quorum(mut self, quorum: usize) -> Self {
		self.quorum = quorum;
		self
	}
}

/// Compute the effective quorum for a replication operation per spec §4.4
/// point 5: the nominal quorum is `W` for PUT and `D` for DELETE; if the
/// object carries fewer replicas than that nominal quorum, it degrades to
/// `max(1, num_of_replicas - 1)`.
pub fn effective_quorum(
	params: &ReplicationParams,
	method: ReplicateMethod,
	num_of_replicas: u8,
) -> usize {
	let nominal = params.quorum_for(method);
	if (num_of_replicas as usize) < nominal {
		std::cmp::max(1, num_of_replicas.saturating_sub(1) as usize)
	} else {
		nominal
	}
}

/// `get_active_redundancies` (spec §4.4 "Active-replica filter"): returns the
/// sublist of available nodes iff `q <= |available|`, else
/// `NotSatisfyQuorum`.
pub fn get_active_redundancies(
	q: usize,
	set: &RedundancySet,
) -> Result<Vec<String>, Error> {
	let available: Vec<String> = set
		.nodes
		.iter()
		.filter(|n| n.available)
		.map(|n| n.node.clone())
		.collect();
	if q <= available.len() {
		Ok(available)
	} else {
		Err(Error::NotSatisfyQuorum)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::peer::ReplicateMethod;
	use corestore_util::data::RedundancyNode;

	fn set(available: &[bool]) -> RedundancySet {
		RedundancySet {
			nodes: available
				.iter()
				.enumerate()
				.map(|(i, a)| RedundancyNode {
					node: format!("n{}", i),
					available: *a,
				})
				.collect(),
			n: available.len(),
			w: 2,
			r: 2,
			d: 2,
			ring_hash: 0,
		}
	}

	#[test]
	fn quorum_degrades_when_replica_count_is_low() {
		let params = ReplicationParams::new(3, 2, 2, 2);
		// num_of_replicas == 1: degrade to max(1, 0) = 1
		assert_eq!(effective_quorum(&params, ReplicateMethod::Put, 1), 1);
		// num_of_replicas == 3 (>= W=2): nominal quorum stands
		assert_eq!(effective_quorum(&params, ReplicateMethod::Put, 3), 2);
	}

	#[test]
	fn active_redundancies_enforces_quorum() {
		let s = set(&[true, true, false]);
		assert_eq!(get_active_redundancies(2, &s).unwrap().len(), 2);
		assert!(matches!(
			get_active_redundancies(3, &s),
			Err(Error::NotSatisfyQuorum)
		));
	}
}
