//! Loopback `PeerClient` (spec §1: peer RPC framing — netapp or equivalent —
//! is an external collaborator, out of scope). Every remote call reports the
//! target unavailable; correct as long as the wired-in Redundancy Resolver
//! never names a node other than the local one, which is the case for the
//! single-node `RingResolver` this binary constructs when no production ring
//! is configured.

use async_trait::async_trait;

use corestore_rpc::{GetResult, PeerClient, ReplicaReply};
use corestore_util::data::{CompactionStats, Metadata, Object};
use corestore_util::error::Error;

pub struct LoopbackPeerClient;

fn unavailable(node: &str) -> Error {
	Error::Unavailable(format!("no peer transport wired in for node '{}'", node))
}

#[async_trait]
impl PeerClient for LoopbackPeerClient {
	async fn get(
		&self,
		node: &str,
		_req_id: u64,
		_address_id: u32,
		_key: &[u8],
		_etag: u64,
		_start_pos: u64,
		_end_pos: u64,
	) -> Result<GetResult, Error> {
		Err(unavailable(node))
	}

	async fn put(&self, node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
		Err(unavailable(node))
	}

	async fn delete(&self, node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
		Err(unavailable(node))
	}

	async fn head(&self, node: &str, _address_id: u32, _key: &[u8]) -> Result<Option<Metadata>, Error> {
		Err(unavailable(node))
	}

	async fn compact(&self, node: &str) -> Result<CompactionStats, Error> {
		Err(unavailable(node))
	}

	async fn delete_objects_under_dir(&self, node: &str, _prefix: &[u8]) -> Result<(), Error> {
		Err(unavailable(node))
	}
}
