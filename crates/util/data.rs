//! The core data model (spec §3): `Object`, its metadata projection, read
//! parameters, redundancy sets, compaction stats and watchdog alarms.

use std::collections::HashMap;

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

/// Sentinel range bound meaning "whole object" for `ReadParams`/`LocalStore::get`.
pub const WHOLE_OBJECT: u64 = u64::MAX;

/// A zero etag disables the if-match short-circuit (spec §3).
pub const NO_ETAG: u64 = 0;

/// The method that produced an `Object` mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
	Put,
	Delete,
}

/// A stored object, or the tombstone standing in for a deleted one.
///
/// Invariant: `del == true` implies `data_size == 0` and `data` is empty.
/// `checksum` is the content hash of `data` as of the PUT that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
	pub address_id: u32,
	#[serde(with = "serde_bytes")]
	pub key: Vec<u8>,
	#[serde(with = "serde_bytes")]
	pub data: Vec<u8>,
	pub data_size: u64,
	pub content_index: u32,
	#[serde(with = "serde_bytes", default)]
	pub parent_key: Vec<u8>,
	pub has_parent_key: bool,
	pub clock: u64,
	pub timestamp: u64,
	pub checksum: u64,
	pub method: Method,
	pub del: bool,
	pub req_id: u64,
	pub ring_hash: u64,
	pub num_of_replicas: u8,
	/// Chunk count; 0 for non-chunked objects (spec §3, §4.6 chunked-object
	/// teardown). Established by whoever assembles the object (the handler
	/// layer, on behalf of a chunked upload) and carried as-is through `put`.
	pub cnumber: u32,
}

impl Object {
	/// Build a tombstone for `key`, carrying over the clock/timestamp/req_id
	/// that the caller has already stamped (spec §4.3: "Delete writes a
	/// tombstone containing the Object's clock/timestamp").
	pub fn tombstone_of(&self) -> Object {
		Object {
			address_id: self.address_id,
			key: self.key.clone(),
			data: Vec::new(),
			data_size: 0,
			content_index: self.content_index,
			parent_key: self.parent_key.clone(),
			has_parent_key: self.has_parent_key,
			clock: self.clock,
			timestamp: self.timestamp,
			checksum: self.checksum,
			method: Method::Delete,
			del: true,
			req_id: self.req_id,
			ring_hash: self.ring_hash,
			num_of_replicas: self.num_of_replicas,
			cnumber: self.cnumber,
		}
	}

	pub fn metadata(&self) -> Metadata {
		Metadata {
			address_id: self.address_id,
			key: self.key.clone(),
			data_size: self.data_size,
			content_index: self.content_index,
			clock: self.clock,
			timestamp: self.timestamp,
			checksum: self.checksum,
			del: self.del,
			ring_hash: self.ring_hash,
			num_of_replicas: self.num_of_replicas,
			cnumber: self.cnumber,
		}
	}
}

/// Projection of `Object` without the body, plus the chunk count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
	pub address_id: u32,
	#[serde(with = "serde_bytes")]
	pub key: Vec<u8>,
	pub data_size: u64,
	pub content_index: u32,
	pub clock: u64,
	pub timestamp: u64,
	pub checksum: u64,
	pub del: bool,
	pub ring_hash: u64,
	pub num_of_replicas: u8,
	/// Chunk count; 0 for non-chunked objects.
	pub cnumber: u32,
}

/// Read parameters for a GET (spec §3).
#[derive(Debug, Clone)]
pub struct ReadParams {
	pub req_id: u64,
	pub address_id: u32,
	pub key: Vec<u8>,
	/// A zero etag disables the if-match short-circuit.
	pub etag: u64,
	pub start_pos: u64,
	pub end_pos: u64,
	pub num_of_replicas: u8,
	pub quorum: usize,
}

impl ReadParams {
	pub fn is_whole_object(&self) -> bool {
		self.start_pos == 0 && self.end_pos == WHOLE_OBJECT
	}
}

/// One entry in a `RedundancySet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyNode {
	pub node: String,
	pub available: bool,
}

/// A read-only snapshot of the replica set responsible for a key, valid for
/// the duration of one request (spec §3).
#[derive(Debug, Clone)]
pub struct RedundancySet {
	pub nodes: Vec<RedundancyNode>,
	pub n: usize,
	pub w: usize,
	pub r: usize,
	pub d: usize,
	pub ring_hash: u64,
}

impl RedundancySet {
	pub fn available_nodes(&self) -> Vec<&str> {
		self.nodes
			.iter()
			.filter(|n| n.available)
			.map(|n| n.node.as_str())
			.collect()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompactionStatus {
	Idle,
	Running,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionStats {
	pub status: CompactionStatus,
	pub pending_targets: Vec<String>,
	pub latest_exec_time: u64,
}

/// Watchdog alarm severity. `level >= ERROR` triggers conditional compaction
/// (spec §3).
pub type AlarmLevel = u8;
pub const ALARM_LEVEL_INFO: AlarmLevel = 0;
pub const ALARM_LEVEL_WARN: AlarmLevel = 1;
pub const ALARM_LEVEL_ERROR: AlarmLevel = 2;
pub const ALARM_LEVEL_CRITICAL: AlarmLevel = 3;

#[derive(Debug, Clone)]
pub struct WatchdogAlarm {
	pub level: AlarmLevel,
	pub props: HashMap<String, String>,
}

/// Content hash used for `Object::checksum` / ETags, per spec §3 ("checksum
/// is content-hash of data on PUT").
pub fn content_checksum(data: &[u8]) -> u64 {
	let mut hasher = Blake2b512::new();
	hasher.update(data);
	let digest = hasher.finalize();
	u64::from_be_bytes(digest[0..8].try_into().unwrap())
}

/// `vnode_id`: 32-bit hash of a key, used as `Object::address_id` (spec
/// GLOSSARY: "Vnode ID: virtual-node identifier derived from key hash modulo
/// ring size"). The modulo-by-ring-size step is the Redundancy Resolver's
/// job; this function produces the raw hash the resolver indexes by.
pub fn vnode_id(key: &[u8]) -> u32 {
	let mut hasher = Blake2b512::new();
	hasher.update(key);
	let digest = hasher.finalize();
	u32::from_be_bytes(digest[0..4].try_into().unwrap())
}

/// Build the synthetic chunk key `parent ‖ 0x0A ‖ ascii(index)` used by
/// chunked-object teardown (spec §4.6, GLOSSARY "Chunk").
pub fn chunk_key(parent: &[u8], index: u32) -> Vec<u8> {
	let mut key = Vec::with_capacity(parent.len() + 1 + 10);
	key.extend_from_slice(parent);
	key.push(b'\n');
	key.extend_from_slice(index.to_string().as_bytes());
	key
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn checksum_is_deterministic() {
		assert_eq!(content_checksum(b"hello"), content_checksum(b"hello"));
		assert_ne!(content_checksum(b"hello"), content_checksum(b"world"));
	}

	#[test]
	fn chunk_key_matches_spec_grammar() {
		assert_eq!(chunk_key(b"parent", 3), b"parent\n3".to_vec());
		assert_eq!(chunk_key(b"parent", 12), b"parent\n12".to_vec());
	}

	#[test]
	fn tombstone_has_no_body() {
		let o = Object {
			address_id: 1,
			key: b"k".to_vec(),
			data: b"hello".to_vec(),
			data_size: 5,
			content_index: 0,
			parent_key: Vec::new(),
			has_parent_key: false,
			clock: 10,
			timestamp: 1000,
			checksum: content_checksum(b"hello"),
			method: Method::Put,
			del: false,
			req_id: 1,
			ring_hash: 0,
			num_of_replicas: 3,
			cnumber: 0,
		};
		let tombstone = o.tombstone_of();
		assert!(tombstone.del);
		assert_eq!(tombstone.data_size, 0);
		assert!(tombstone.data.is_empty());
		assert_eq!(tombstone.clock, o.clock);
	}
}
