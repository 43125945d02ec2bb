//! Peer RPC contracts (spec §6): `get`/`put`/`delete`/`head`/`compact`/
//! `delete_objects_under_dir`, symmetric on every node. All calls carry a
//! Reference minted by the initiator; per the design note in spec §9 we
//! represent that as an explicit `req_id: u64` keying a per-request
//! completion future, rather than as opaque process-identity bookkeeping.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use corestore_util::data::{CompactionStats, Metadata, Object};
use corestore_util::error::Error;

/// Which mutation a Replicator call is performing (spec §4.4 point 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicateMethod {
	Put,
	Delete,
}

/// The taxonomy of responses a single replica can produce for a mutation
/// (spec §4.4 point 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplicaReply {
	Ok(u64),
	NotFound,
	Unavailable,
	Err(String),
}

/// Peer RPC request/response envelope (spec §6). Every variant is tagged
/// with the initiator's request id so that replies arriving out of order
/// over a shared channel can be matched back to the call that produced them
/// (spec §9 "Reference tagging").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PeerRpc {
	Get {
		req_id: u64,
		address_id: u32,
		key: Vec<u8>,
		etag: u64,
		start_pos: u64,
		end_pos: u64,
	},
	GetReply {
		req_id: u64,
		result: GetResult,
	},
	Put {
		req_id: u64,
		object: Object,
	},
	PutReply {
		req_id: u64,
		result: ReplicaReply,
	},
	Delete {
		req_id: u64,
		object: Object,
	},
	DeleteReply {
		req_id: u64,
		result: ReplicaReply,
	},
	Head {
		req_id: u64,
		address_id: u32,
		key: Vec<u8>,
	},
	HeadReply {
		req_id: u64,
		result: Option<Metadata>,
	},
	Compact {
		req_id: u64,
	},
	CompactReply {
		req_id: u64,
		stats: CompactionStats,
	},
	DeleteObjectsUnderDir {
		req_id: u64,
		prefix: Vec<u8>,
	},
	DeleteObjectsUnderDirReply {
		req_id: u64,
	},
}

/// Result of a peer GET (spec §6 `get` method).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GetResult {
	Ok(Metadata, #[serde(with = "serde_bytes")] Vec<u8>),
	NotFound,
	Err(String),
}

/// Client-side contract for talking to a peer node. A production
/// implementation carries these over the wire (framing is out of scope per
/// spec §1); the handler layer and the Replicator/Read-Repair engine only
/// ever see this trait.
#[async_trait]
pub trait PeerClient: Send + Sync {
	async fn get(
		&self,
		node: &str,
		req_id: u64,
		address_id: u32,
		key: &[u8],
		etag: u64,
		start_pos: u64,
		end_pos: u64,
	) -> Result<GetResult, Error>;

	async fn put(&self, node: &str, req_id: u64, object: Object) -> Result<ReplicaReply, Error>;

	async fn delete(&self, node: &str, req_id: u64, object: Object) -> Result<ReplicaReply, Error>;

	async fn head(&self, node: &str, address_id: u32, key: &[u8]) -> Result<Option<Metadata>, Error>;

	async fn compact(&self, node: &str) -> Result<CompactionStats, Error>;

	async fn delete_objects_under_dir(&self, node: &str, prefix: &[u8]) -> Result<(), Error>;
}
