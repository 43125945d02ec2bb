//! The Replicator (spec §4.4): fans a mutation out to active replicas, waits
//! for quorum, returns the first definitive outcome while letting outstanding
//! replies run to completion unobserved (spec §5 "Cancellation").
//!
//! Grounded on `garage_block::manager`'s `rpc_put_block`/quorum-gathering
//! loop: spawn one task per candidate, collect over a channel, stop waiting
//! as soon as the outcome is decided either way.

use std::sync::Arc;
use std::time::Duration;

use corestore_rpc::peer::{PeerClient, ReplicateMethod};
use corestore_rpc::ReplicaReply;
use corestore_store::{LocalStore, StoreError};
use corestore_util::data::Object;
use corestore_util::error::Error;

use tokio::sync::mpsc;

pub struct Replicator {
	local_node: String,
	timeout: Duration,
}

impl Replicator {
	pub fn new(local_node: String, timeout: Duration) -> Self {
		Self { local_node, timeout }
	}

	/// Dispatches `object` to every node in `active_replicas` and resolves as
	/// soon as `quorum` successes (or a provable quorum failure) is known.
	/// Nodes still in flight when that happens keep running detached; their
	/// outcome is logged but never observed by the caller.
	pub async fn replicate(
		&self,
		method: ReplicateMethod,
		quorum: usize,
		active_replicas: &[String],
		object: Object,
		local: Arc<dyn LocalStore>,
		peer: Arc<dyn PeerClient>,
	) -> Result<u64, Error> {
		if active_replicas.is_empty() {
			return Err(Error::NotSatisfyQuorum);
		}

		let total = active_replicas.len();
		let (tx, mut rx) = mpsc::channel::<ReplicaReply>(total);

		for node_name in active_replicas {
			let node_name = node_name.clone();
			let is_local = node_name == self.local_node;
			let object = object.clone();
			let local = local.clone();
			let peer = peer.clone();
			let tx = tx.clone();
			let timeout = self.timeout;
			let req_id = rand::random::<u64>();

			tokio::spawn(async move {
				let reply = if is_local {
					Self::apply_local(method, local.as_ref(), object).await
				} else {
					Self::apply_remote(method, peer.as_ref(), &node_name, req_id, object, timeout).await
				};
				trace!(node = %node_name, ?reply, "replica responded");
				let _ = tx.send(reply).await;
			});
		}
		drop(tx);

		let mut successes = 0usize;
		let mut last_etag = 0u64;
		let mut errors = Vec::new();
		let mut received = 0usize;

		while let Some(reply) = rx.recv().await {
			received += 1;
			match reply {
				ReplicaReply::Ok(etag) => {
					successes += 1;
					last_etag = etag;
				}
				other => errors.push(other),
			}

			if successes >= quorum {
				return Ok(last_etag);
			}

			let remaining = total - received;
			if successes + remaining < quorum {
				return Err(Self::quorum_error(&errors));
			}
		}

		Err(Self::quorum_error(&errors))
	}

	async fn apply_local(method: ReplicateMethod, local: &dyn LocalStore, object: Object) -> ReplicaReply {
		let address_id = object.address_id;
		let key = object.key.clone();
		let result = match method {
			ReplicateMethod::Put => local.put(address_id, &key, object).await,
			ReplicateMethod::Delete => {
				let etag = object.checksum;
				local.delete(address_id, &key, object).await.map(|_| etag)
			}
		};
		match result {
			Ok(etag) => ReplicaReply::Ok(etag),
			Err(StoreError::NotFound) => ReplicaReply::NotFound,
			Err(StoreError::LockedContainer) => ReplicaReply::Unavailable,
			Err(StoreError::Other(e)) => ReplicaReply::Err(e.to_string()),
		}
	}

	async fn apply_remote(
		method: ReplicateMethod,
		peer: &dyn PeerClient,
		node: &str,
		req_id: u64,
		object: Object,
		timeout: Duration,
	) -> ReplicaReply {
		let call = async {
			match method {
				ReplicateMethod::Put => peer.put(node, req_id, object).await,
				ReplicateMethod::Delete => peer.delete(node, req_id, object).await,
			}
		};
		match tokio::time::timeout(timeout, call).await {
			Ok(Ok(reply)) => reply,
			Ok(Err(e)) => ReplicaReply::Err(e.to_string()),
			Err(_) => ReplicaReply::Err("timeout".to_string()),
		}
	}

	/// `NotFound` wins over any other failure when collapsing a quorum
	/// failure to a single outcome (spec §4.4 point 4).
	fn quorum_error(errors: &[ReplicaReply]) -> Error {
		if errors.iter().any(|e| matches!(e, ReplicaReply::NotFound)) {
			Error::NotFound
		} else {
			Error::ReplicateFailure
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use async_trait::async_trait;
	use corestore_rpc::peer::{GetResult, PeerClient};
	use corestore_store::{FetchVisitor, Md5Ctx, MemStore, OwnershipPredicate, StoreResult};
	use corestore_util::data::{CompactionStats, Method, Metadata};
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn obj(key: &[u8]) -> Object {
		Object {
			address_id: 1,
			key: key.to_vec(),
			data: b"hi".to_vec(),
			data_size: 2,
			content_index: 0,
			parent_key: Vec::new(),
			has_parent_key: false,
			clock: 1,
			timestamp: 1,
			checksum: 42,
			method: Method::Put,
			del: false,
			req_id: 1,
			ring_hash: 0,
			num_of_replicas: 3,
			cnumber: 0,
		}
	}

	struct AlwaysOkPeer {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl PeerClient for AlwaysOkPeer {
		async fn get(
			&self,
			_node: &str,
			_req_id: u64,
			_address_id: u32,
			_key: &[u8],
			_etag: u64,
			_start_pos: u64,
			_end_pos: u64,
		) -> Result<GetResult, Error> {
			Ok(GetResult::NotFound)
		}

		async fn put(&self, _node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(ReplicaReply::Ok(42))
		}

		async fn delete(&self, _node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(ReplicaReply::Ok(42))
		}

		async fn head(&self, _node: &str, _address_id: u32, _key: &[u8]) -> Result<Option<Metadata>, Error> {
			Ok(None)
		}

		async fn compact(&self, _node: &str) -> Result<CompactionStats, Error> {
			unimplemented!()
		}

		async fn delete_objects_under_dir(&self, _node: &str, _prefix: &[u8]) -> Result<(), Error> {
			Ok(())
		}
	}

	struct NeverAvailablePeer;

	#[async_trait]
	impl PeerClient for NeverAvailablePeer {
		async fn get(
			&self,
			_node: &str,
			_req_id: u64,
			_address_id: u32,
			_key: &[u8],
			_etag: u64,
			_start_pos: u64,
			_end_pos: u64,
		) -> Result<GetResult, Error> {
			Ok(GetResult::NotFound)
		}

		async fn put(&self, _node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
			Ok(ReplicaReply::Unavailable)
		}

		async fn delete(&self, _node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
			Ok(ReplicaReply::Unavailable)
		}

		async fn head(&self, _node: &str, _address_id: u32, _key: &[u8]) -> Result<Option<Metadata>, Error> {
			Ok(None)
		}

		async fn compact(&self, _node: &str) -> Result<CompactionStats, Error> {
			unimplemented!()
		}

		async fn delete_objects_under_dir(&self, _node: &str, _prefix: &[u8]) -> Result<(), Error> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn quorum_met_returns_etag() {
		let replicator = Replicator::new("local".into(), Duration::from_secs(5));
		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let peer: Arc<dyn PeerClient> = Arc::new(AlwaysOkPeer { calls: AtomicUsize::new(0) });
		let active = vec!["local".to_string(), "n2".to_string(), "n3".to_string()];
		let result = replicator
			.replicate(ReplicateMethod::Put, 2, &active, obj(b"k"), local, peer)
			.await;
		assert!(result.is_ok());
	}

	#[tokio::test]
	async fn unreachable_quorum_fails() {
		let replicator = Replicator::new("local".into(), Duration::from_secs(5));
		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let peer: Arc<dyn PeerClient> = Arc::new(NeverAvailablePeer);
		let active = vec!["n2".to_string(), "n3".to_string()];
		let result = replicator
			.replicate(ReplicateMethod::Put, 2, &active, obj(b"k"), local, peer)
			.await;
		assert!(matches!(result, Err(Error::ReplicateFailure)));
	}

	#[allow(dead_code)]
	fn assert_store_trait_object_safe(_: &dyn LocalStore) {}
	#[allow(dead_code)]
	fn _unused(_: FetchVisitor, _: OwnershipPredicate, _: Md5Ctx, _: StoreResult<()>) {}
}
