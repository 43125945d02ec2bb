//! The Handler Layer (spec §4.6): GET/PUT/DELETE/HEAD against the local
//! store and peer replicas, chunked-object teardown, inbound replication
//! handling and the pre-flight watchdog guard. Grounded on
//! `garage_model::k2v::rpc::K2VRpcHandler` (a handler struct holding store +
//! peer handles, dispatching on an RPC enum) and `garage_block::manager`'s
//! `BlockRpc` handling for the peer-facing replies.

use std::sync::Arc;

use corestore_queue::TopicSet;
use corestore_replicator::{ReadOutcome, ReadRepairEngine, Replicator};
use corestore_rpc::peer::{PeerClient, ReplicateMethod, ReplicaReply};
use corestore_rpc::quorum::{effective_quorum, get_active_redundancies};
use corestore_rpc::redundancy::RedundancyResolver;
use corestore_rpc::replication_mode::{Op, ReplicationParams};
use corestore_store::{LocalStore, StoreError};
use corestore_util::background::BackgroundRunner;
use corestore_util::data::{chunk_key, vnode_id, Metadata, Method, Object, ReadParams};
use corestore_util::error::Error;
use corestore_util::time::LogicalClock;
use corestore_watchdog::WatchdogState;

use crate::dir_delete::delete_directory;
use crate::notifier::EventNotifier;

/// Result of a `HEAD` (spec §4.6): "not found" is a normal outcome, not an
/// error, matching the "empty set yields `NotFound`" wording.
#[derive(Debug, Clone)]
pub enum HeadOutcome {
	Found(Metadata),
	NotFound,
}

pub struct Handler {
	local_node: String,
	replication: ReplicationParams,
	local: Arc<dyn LocalStore>,
	redundancy: Arc<dyn RedundancyResolver>,
	peer: Arc<dyn PeerClient>,
	replicator: Arc<Replicator>,
	read_repair: Arc<ReadRepairEngine>,
	watchdog: Arc<dyn WatchdogState>,
	queues: Arc<TopicSet>,
	notifier: Arc<dyn EventNotifier>,
	background: Arc<BackgroundRunner>,
	clock: LogicalClock,
}

impl Handler {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		local_node: String,
		replication: ReplicationParams,
		local: Arc<dyn LocalStore>,
		redundancy: Arc<dyn RedundancyResolver>,
		peer: Arc<dyn PeerClient>,
		replicator: Arc<Replicator>,
		read_repair: Arc<ReadRepairEngine>,
		watchdog: Arc<dyn WatchdogState>,
		queues: Arc<TopicSet>,
		notifier: Arc<dyn EventNotifier>,
		background: Arc<BackgroundRunner>,
	) -> Self {
		Self {
			local_node,
			replication,
			local,
			redundancy,
			peer,
			replicator,
			read_repair,
			watchdog,
			queues,
			notifier,
			background,
			clock: LogicalClock::new(),
		}
	}

	/// Spec §4.6 "Pre-flight guard": every local PUT/DELETE/GET-fun consults
	/// `find_not_safe_items`. No item is excluded here — the handler doesn't
	/// know which container a key maps to until the store resolves it.
	fn guard_safe(&self) -> Result<(), Error> {
		let unsafe_items = self.watchdog.find_not_safe_items(&[]);
		if !unsafe_items.is_empty() {
			return Err(Error::Unavailable(format!(
				"unsafe items present: {:?}",
				unsafe_items
			)));
		}
		Ok(())
	}

	/// **GET(addr, key, [etag], [start,end], req_id)** (spec §4.6).
	pub async fn get(
		&self,
		req_id: u64,
		address_id: u32,
		key: &[u8],
		etag: u64,
		start_pos: u64,
		end_pos: u64,
	) -> Result<ReadOutcome, Error> {
		self.guard_safe()?;
		let set = self.redundancy.lookup_by_addr(Op::Get, address_id)?;
		let params = ReadParams {
			req_id,
			address_id,
			key: key.to_vec(),
			etag,
			start_pos,
			end_pos,
			num_of_replicas: set.n as u8,
			quorum: set.r,
		};
		self.read_repair
			.read_and_repair(&params, &set, self.local.clone(), self.peer.clone())
			.await
	}

	/// **PUT(object, req_id)** (spec §4.6).
	pub async fn put(&self, mut object: Object, req_id: u64) -> Result<u64, Error> {
		self.guard_safe()?;
		object.method = Method::Put;
		object.clock = self.clock.tick();
		object.req_id = req_id;

		let etag = self.replicate(ReplicateMethod::Put, object.clone(), false).await?;
		self.notifier.notify_mutation(&object).await;
		Ok(etag)
	}

	/// **DELETE(object, req_id, check_under_dir)** (spec §4.6), including
	/// chunked-object teardown.
	pub async fn delete(&self, mut object: Object, req_id: u64, check_under_dir: bool) -> Result<u64, Error> {
		self.guard_safe()?;
		object.method = Method::Put;
		object.del = true;
		object.data = Vec::new();
		object.data_size = 0;
		object.clock = self.clock.tick();
		object.req_id = req_id;

		self.teardown_chunks_if_any(&object, req_id).await?;

		let etag = self.replicate(ReplicateMethod::Delete, object.clone(), check_under_dir).await?;
		self.notifier.notify_mutation(&object).await;
		Ok(etag)
	}

	/// If local metadata for `object`'s key claims chunks (`cnumber > 0`),
	/// deletes them `cnumber, cnumber-1, ..., 1` through the full DELETE path
	/// with quorum forced to 0, so that a single chunk's replica shortfall is
	/// isolated rather than failing the whole teardown. Only a hard error
	/// from a chunk's own replicate call aborts before the parent delete
	/// runs (spec §4.6 "proceed ... only after all chunks report Ok").
	async fn teardown_chunks_if_any(&self, object: &Object, req_id: u64) -> Result<(), Error> {
		let cnumber = match self.local.head(object.address_id, &object.key).await {
			Ok(metadata) => metadata.cnumber,
			Err(StoreError::NotFound) => 0,
			Err(e) => return Err(e.into_core_error()),
		};
		if cnumber == 0 {
			return Ok(());
		}

		for index in (1..=cnumber).rev() {
			let key = chunk_key(&object.key, index);
			let address_id = vnode_id(&key);
			let mut chunk = object.clone();
			chunk.address_id = address_id;
			chunk.key = key;
			chunk.has_parent_key = true;
			chunk.parent_key = object.key.clone();
			chunk.clock = self.clock.tick();
			chunk.req_id = req_id;

			self.replicate_with_quorum(ReplicateMethod::Delete, chunk, false, Some(0)).await?;
		}
		Ok(())
	}

	/// Looks up redundancies, computes quorum, filters available replicas and
	/// invokes the Replicator (spec §4.6 "`replicate_fun`").
	async fn replicate(&self, method: ReplicateMethod, object: Object, check_under_dir: bool) -> Result<u64, Error> {
		self.replicate_with_quorum(method, object, check_under_dir, None).await
	}

	/// `quorum_override` forces the quorum instead of deriving it from
	/// `effective_quorum` — used by chunked-object teardown (spec §4.6:
	/// "quorum=0 so failures are isolated").
	async fn replicate_with_quorum(
		&self,
		method: ReplicateMethod,
		object: Object,
		check_under_dir: bool,
		quorum_override: Option<usize>,
	) -> Result<u64, Error> {
		let set = self.redundancy.lookup_by_addr(Op::Put, object.address_id)?;
		let quorum = quorum_override
			.unwrap_or_else(|| effective_quorum(&self.replication, method, object.num_of_replicas));
		let active = get_active_redundancies(quorum, &set)?;

		let result = self
			.replicator
			.replicate(method, quorum, &active, object.clone(), self.local.clone(), self.peer.clone())
			.await;

		let is_dir_key = object.key.ends_with(b"/");
		match result {
			Ok(etag) => {
				if check_under_dir && is_dir_key {
					self.trigger_dir_delete(&object);
				}
				Ok(etag)
			}
			// Only DELETE tolerates a NotFound outcome as success (spec §4.6:
			// "If replication returns Ok or NotFound [for DELETE] ... trigger
			// recursive directory delete"); a PUT that fails to reach quorum
			// with NotFound must still surface as an error to its caller.
			Err(Error::NotFound) if method == ReplicateMethod::Delete => {
				if check_under_dir && is_dir_key {
					self.trigger_dir_delete(&object);
				}
				Ok(0)
			}
			Err(e) => Err(e),
		}
	}

	fn trigger_dir_delete(&self, object: &Object) {
		let object = object.clone();
		let local_node = self.local_node.clone();
		let redundancy = self.redundancy.clone();
		let local = self.local.clone();
		let peer = self.peer.clone();
		let queues = self.queues.clone();
		self.background.spawn(async move {
			delete_directory(&local_node, &object, redundancy, local, peer, queues).await;
			Ok(())
		});
	}

	/// **Inbound replication (from a peer)** (spec §4.6): applies a
	/// peer-initiated PUT locally and classifies the result for the reply.
	pub async fn handle_inbound_put(&self, object: Object) -> ReplicaReply {
		if let Err(e) = self.guard_safe() {
			return Self::guard_failure_reply(e);
		}
		let address_id = object.address_id;
		let key = object.key.clone();
		match self.local.put(address_id, &key, object).await {
			Ok(etag) => ReplicaReply::Ok(etag),
			Err(StoreError::NotFound) => ReplicaReply::NotFound,
			Err(StoreError::LockedContainer) => ReplicaReply::Unavailable,
			Err(StoreError::Other(e)) => ReplicaReply::Err(e.to_string()),
		}
	}

	/// **Inbound replication (from a peer)**, DELETE side. A `NotFound` with
	/// `req_id == 0` is normalized to `Ok(0)` because it indicates a
	/// concurrent rebalance rather than a genuine failure.
	pub async fn handle_inbound_delete(&self, object: Object) -> ReplicaReply {
		if let Err(e) = self.guard_safe() {
			return Self::guard_failure_reply(e);
		}
		let req_id = object.req_id;
		let address_id = object.address_id;
		let key = object.key.clone();
		match self.local.delete(address_id, &key, object).await {
			Ok(()) => ReplicaReply::Ok(0),
			Err(StoreError::NotFound) if req_id == 0 => ReplicaReply::Ok(0),
			Err(StoreError::NotFound) => ReplicaReply::NotFound,
			Err(StoreError::LockedContainer) => ReplicaReply::Unavailable,
			Err(StoreError::Other(e)) => ReplicaReply::Err(e.to_string()),
		}
	}

	fn guard_failure_reply(e: Error) -> ReplicaReply {
		match e {
			Error::Unavailable(msg) => {
				warn!(reason = %msg, "rejecting inbound replication, unsafe items present");
				ReplicaReply::Unavailable
			}
			other => ReplicaReply::Err(other.to_string()),
		}
	}

	/// **HEAD(addr, key, can_retry)** (spec §4.6).
	pub async fn head(&self, address_id: u32, key: &[u8], can_retry: bool) -> Result<HeadOutcome, Error> {
		self.guard_safe()?;

		if !can_retry {
			return match self.local.head(address_id, key).await {
				Ok(metadata) => Ok(HeadOutcome::Found(metadata)),
				Err(StoreError::NotFound) => Ok(HeadOutcome::NotFound),
				Err(e) => Err(e.into_core_error()),
			};
		}

		let set = self.redundancy.lookup_by_addr(Op::Get, address_id)?;
		for node in &set.nodes {
			let found = if node.node == self.local_node {
				self.local.head(address_id, key).await.ok()
			} else {
				self.peer.head(&node.node, address_id, key).await.unwrap_or(None)
			};
			if let Some(metadata) = found {
				return Ok(HeadOutcome::Found(metadata));
			}
		}
		Ok(HeadOutcome::NotFound)
	}
}
