//! The Redundancy Resolver (spec §4.1): a pure function from a key or
//! address to an ordered list of responsible peers plus N/W/R/D. The real
//! ring/consistent-hashing membership service is an external collaborator
//! (spec §1); this module defines its contract plus a deterministic
//! in-memory double used by tests and by the node binary when no production
//! ring is wired in.

use std::collections::BTreeMap;
use std::sync::RwLock;

use corestore_util::data::{vnode_id, RedundancyNode, RedundancySet};
use corestore_util::error::Error;

use crate::replication_mode::{Op, ReplicationParams};

/// Contract for the ring/membership service (spec §4.1).
pub trait RedundancyResolver: Send + Sync {
	/// Resolve the redundancy set responsible for `key`. Fails with
	/// `Error::NoRedundancy` if the ring has nothing to offer — fatal for the
	/// request (spec §4.1).
	fn lookup_by_key(&self, op: Op, key: &[u8]) -> Result<RedundancySet, Error> {
		self.lookup_by_addr(op, vnode_id(key))
	}

	/// Resolve the redundancy set responsible for `address_id` directly, for
	/// callers that already know it (e.g. HEAD/GET with a pre-stamped
	/// address).
	fn lookup_by_addr(&self, op: Op, address_id: u32) -> Result<RedundancySet, Error>;

	/// All members the ring currently considers running (used by directory
	/// delete fan-out, spec §4.8 point 4, and by the watchdog controller's
	/// `can_start_compaction`, spec §4.7).
	fn running_members(&self) -> Vec<String>;

	/// Whether `node` is currently responsible for `key` under the ring.
	fn has_charge_of_node(&self, key: &[u8], node: &str) -> bool;
}

/// An in-memory, deterministic ring double. Node order for a given address is
/// `address_id.wrapping_add(i) % nodes.len()`, which is stable across calls
/// within one process and gives every node a turn as primary as the address
/// space is swept, good enough to exercise quorum logic in tests without
/// pulling in a real consistent-hashing ring.
pub struct RingResolver {
	nodes: Vec<String>,
	params: ReplicationParams,
	/// Which of `nodes` are currently marked unavailable.
	down: RwLock<BTreeMap<String, bool>>,
}

impl RingResolver {
	pub fn new(nodes: Vec<String>, params: ReplicationParams) -> Self {
		let down = nodes.iter().map(|n| (n.clone(), false)).collect();
		Self {
			nodes,
			params,
			down: RwLock::new(down),
		}
	}

	pub fn set_available(&self, node: &str, available: bool) {
		if let Some(v) = self.down.write().unwrap().get_mut(node) {
			*v = !available;
		}
	}

	fn is_down(&self, node: &str) -> bool {
		*self.down.read().unwrap().get(node).unwrap_or(&false)
	}
}

impl RedundancyResolver for RingResolver {
	fn lookup_by_addr(&self, _op: Op, address_id: u32) -> Result<RedundancySet, Error> {
		if self.nodes.is_empty() {
			return Err(Error::NoRedundancy);
		}
		let n = self.params.n.min(self.nodes.len());
		let mut nodes = Vec::with_capacity(n);
		for i in 0..n {
			let idx = (address_id as usize).wrapping_add(i) % self.nodes.len();
			let node = &self.nodes[idx];
			nodes.push(RedundancyNode {
				node: node.clone(),
				available: !self.is_down(node),
			});
		}
		Ok(RedundancySet {
			nodes,
			n: self.params.n,
			w: self.params.w,
			r: self.params.r,
			d: self.params.d,
			ring_hash: address_id as u64,
		})
	}

	fn running_members(&self) -> Vec<String> {
		self.nodes
			.iter()
			.filter(|n| !self.is_down(n))
			.cloned()
			.collect()
	}

	fn has_charge_of_node(&self, key: &[u8], node: &str) -> bool {
		match self.lookup_by_addr(Op::Get, vnode_id(key)) {
			Ok(set) => set.nodes.iter().any(|n| n.node == node),
			Err(_) => false,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn resolver() -> RingResolver {
		RingResolver::new(
			vec!["a".into(), "b".into(), "c".into()],
			ReplicationParams::new(3, 2, 2, 2),
		)
	}

	#[test]
	fn lookup_returns_n_nodes() {
		let r = resolver();
		let set = r.lookup_by_addr(Op::Get, 42).unwrap();
		assert_eq!(set.nodes.len(), 3);
		assert_eq!(set.n, 3);
	}

	#[test]
	fn empty_ring_is_fatal() {
		let r = RingResolver::new(vec![], ReplicationParams::new(3, 2, 2, 2));
		assert!(matches!(
			r.lookup_by_addr(Op::Get, 0),
			Err(Error::NoRedundancy)
		));
	}

	#[test]
	fn unavailable_nodes_are_marked() {
		let r = resolver();
		r.set_available("b", false);
		let set = r.lookup_by_addr(Op::Get, 0).unwrap();
		let b = set.nodes.iter().find(|n| n.node == "b").unwrap();
		assert!(!b.available);
		assert_eq!(r.running_members().len(), 2);
	}
}
