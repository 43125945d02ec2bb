//! Recursive Directory Delete (spec §4.8): entered whenever a DELETE targets
//! a key ending in `/`. Fans the tombstone out to every other running member
//! and cleans up local entries under the prefix. Grounded on
//! `garage_table::sync::TableSyncer::offload_partition`'s "range-scan, fan
//! out, locally clean" shape, generalized from item offload to directory
//! prefixes and message-queue publication.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use corestore_queue::{Topic, TopicSet};
use corestore_rpc::peer::PeerClient;
use corestore_rpc::redundancy::RedundancyResolver;
use corestore_store::{FetchVisitor, LocalStore};
use corestore_util::data::Object;

#[derive(Serialize)]
struct AsyncDeleteObjRecord {
	address_id: u32,
	#[serde(with = "serde_bytes")]
	key: Vec<u8>,
}

/// Derive the parent directory key of a directory key (spec §4.8 point 1):
/// `"a/b/"` -> `"a/"`. A top-level directory has no parent and yields an
/// empty key.
fn parent_directory_key(key: &[u8]) -> Vec<u8> {
	let trimmed = key.strip_suffix(b"/").unwrap_or(key);
	match trimmed.iter().rposition(|&b| b == b'/') {
		Some(idx) => trimmed[..=idx].to_vec(),
		None => Vec::new(),
	}
}

/// Runs all six steps of the directory delete. Meant to be spawned onto a
/// `BackgroundRunner` by the handler (spec §5 "background fire-and-forget")
/// so the triggering DELETE's reply is never held up by cluster fan-out.
pub async fn delete_directory(
	local_node: &str,
	object: &Object,
	redundancy: Arc<dyn RedundancyResolver>,
	local: Arc<dyn LocalStore>,
	peer: Arc<dyn PeerClient>,
	queues: Arc<TopicSet>,
) {
	let parent = parent_directory_key(&object.key);
	debug!(
		directory = %String::from_utf8_lossy(&object.key),
		parent = %String::from_utf8_lossy(&parent),
		"invalidating cached directory listing"
	);

	if let Ok(payload) = rmp_serde::to_vec(&serde_bytes::ByteBuf::from(object.key.clone())) {
		if let Err(e) = queues.get(Topic::DelDir).publish(&object.key, payload).await {
			warn!(error = %e, "failed to publish directory-metadata-sync record");
		}
	} else {
		warn!("failed to encode directory-metadata-sync record");
	}

	let members = redundancy.running_members();
	for node in members.into_iter().filter(|n| n != local_node) {
		let prefix = object.key.clone();
		let queues = queues.clone();
		let peer = peer.clone();
		tokio::spawn(async move {
			if let Err(e) = peer.delete_objects_under_dir(&node, &prefix).await {
				warn!(node = %node, error = %e, "delete_objects_under_dir failed, queueing for retry");
				if let Ok(payload) = rmp_serde::to_vec(&serde_bytes::ByteBuf::from(prefix.clone())) {
					let _ = queues.get(Topic::AsyncDeleteDir).publish(&prefix, payload).await;
				}
			}
		});
	}

	prefix_search_and_remove_objects(&object.key, local, queues).await;
}

/// Spec §4.8 point 6: scan the local store under `prefix`; publish an
/// `ASYNC_DELETE_OBJ` record for every live entry found, skipping tombstones.
async fn prefix_search_and_remove_objects(prefix: &[u8], local: Arc<dyn LocalStore>, queues: Arc<TopicSet>) {
	let live: Arc<Mutex<Vec<(u32, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
	let collected = live.clone();
	let visitor: FetchVisitor = Box::new(move |key, metadata| {
		if !metadata.del {
			collected.lock().unwrap().push((metadata.address_id, key.to_vec()));
		}
	});

	if let Err(e) = local.fetch_by_key(prefix, visitor).await {
		warn!(error = ?e, "prefix scan failed during directory delete cleanup");
		return;
	}

	let entries = live.lock().unwrap().clone();
	let queue = queues.get(Topic::AsyncDeleteObj);
	for (address_id, key) in entries {
		let record = AsyncDeleteObjRecord { address_id, key: key.clone() };
		let payload = match rmp_serde::to_vec(&record) {
			Ok(p) => p,
			Err(e) => {
				warn!(error = %e, "failed to encode async-delete-obj record");
				continue;
			}
		};
		if let Err(e) = queue.publish(&key, payload).await {
			warn!(error = %e, "failed to publish async-delete-obj record");
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use async_trait::async_trait;
	use corestore_queue::{InMemoryQueue, MessageQueue};
	use corestore_rpc::peer::{GetResult, ReplicaReply};
	use corestore_rpc::replication_mode::Op;
	use corestore_store::MemStore;
	use corestore_util::data::{CompactionStats, Method, Metadata, RedundancySet};
	use corestore_util::error::Error;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn parent_of_nested_directory() {
		assert_eq!(parent_directory_key(b"a/b/"), b"a/".to_vec());
		assert_eq!(parent_directory_key(b"a/"), Vec::<u8>::new());
	}

	struct CountingPeer {
		calls: AtomicUsize,
		fail: bool,
	}

	#[async_trait]
	impl PeerClient for CountingPeer {
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
			unimplemented!()
		}
		async fn delete(&self, _node: &str, _req_id: u64, _object: Object) -> Result<ReplicaReply, Error> {
			unimplemented!()
		}
		async fn head(&self, _node: &str, _address_id: u32, _key: &[u8]) -> Result<Option<Metadata>, Error> {
			Ok(None)
		}
		async fn compact(&self, _node: &str) -> Result<CompactionStats, Error> {
			unimplemented!()
		}
		async fn delete_objects_under_dir(&self, _node: &str, _prefix: &[u8]) -> Result<(), Error> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if self.fail {
				Err(Error::Timeout)
			} else {
				Ok(())
			}
		}
	}

	struct StubResolver(Vec<String>);

	impl RedundancyResolver for StubResolver {
		fn lookup_by_addr(&self, _op: Op, address_id: u32) -> Result<RedundancySet, Error> {
			Ok(RedundancySet {
				nodes: Vec::new(),
				n: self.0.len(),
				w: 1,
				r: 1,
				d: 1,
				ring_hash: address_id as u64,
			})
		}
		fn running_members(&self) -> Vec<String> {
			self.0.clone()
		}
		fn has_charge_of_node(&self, _key: &[u8], _node: &str) -> bool {
			true
		}
	}

	fn dir_obj(key: &[u8]) -> Object {
		Object {
			address_id: 1,
			key: key.to_vec(),
			data: Vec::new(),
			data_size: 0,
			content_index: 0,
			parent_key: Vec::new(),
			has_parent_key: false,
			clock: 1,
			timestamp: 1,
			checksum: 0,
			method: Method::Delete,
			del: true,
			req_id: 1,
			ring_hash: 0,
			num_of_replicas: 3,
			cnumber: 0,
		}
	}

	fn topic_set() -> (Arc<TopicSet>, Arc<InMemoryQueue>, Arc<InMemoryQueue>, Arc<InMemoryQueue>) {
		let del_dir = Arc::new(InMemoryQueue::new(Topic::DelDir));
		let async_delete_obj = Arc::new(InMemoryQueue::new(Topic::AsyncDeleteObj));
		let async_delete_dir = Arc::new(InMemoryQueue::new(Topic::AsyncDeleteDir));
		let handles: Vec<Arc<dyn MessageQueue>> =
			vec![del_dir.clone(), async_delete_obj.clone(), async_delete_dir.clone()];
		(Arc::new(TopicSet::new(handles)), del_dir, async_delete_obj, async_delete_dir)
	}

	#[tokio::test]
	async fn live_entries_under_prefix_are_queued_for_async_delete() {
		let (queues, del_dir, async_delete_obj, _async_delete_dir) = topic_set();
		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let mut child = dir_obj(b"a/b/child");
		child.del = false;
		child.data = b"v".to_vec();
		child.data_size = 1;
		local.put(child.address_id, &child.key.clone(), child).await.unwrap();

		let redundancy: Arc<dyn RedundancyResolver> = Arc::new(StubResolver(vec!["local".into()]));
		let peer: Arc<dyn PeerClient> = Arc::new(CountingPeer { calls: AtomicUsize::new(0), fail: false });

		delete_directory("local", &dir_obj(b"a/b/"), redundancy, local, peer, queues).await;

		assert_eq!(del_dir.published().len(), 1);
		assert_eq!(async_delete_obj.published().len(), 1);
	}

	#[tokio::test]
	async fn peer_fan_out_failure_queues_async_delete_dir_retry() {
		let (queues, _del_dir, _async_delete_obj, async_delete_dir) = topic_set();
		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let redundancy: Arc<dyn RedundancyResolver> = Arc::new(StubResolver(vec!["local".into(), "remote".into()]));
		let peer: Arc<dyn PeerClient> = Arc::new(CountingPeer { calls: AtomicUsize::new(0), fail: true });

		delete_directory("local", &dir_obj(b"a/b/"), redundancy, local, peer, queues).await;

		// the peer dispatch is itself fire-and-forget (tokio::spawn); give it a
		// turn to run before asserting on its side effect.
		tokio::task::yield_now().await;
		tokio::time::sleep(std::time::Duration::from_millis(10)).await;
		assert_eq!(async_delete_dir.published().len(), 1);
	}
}
