//! The Read-Repair Engine (spec §4.5): performs the primary read across the
//! active replica set, preserves the if-match short-circuit, and spawns
//! asynchronous repair against stale replicas without delaying the reply.
//!
//! Grounded on `garage_table::sync`'s "read one, compare against others,
//! repair in the background" shape, adapted from table-sync's merkle
//! comparison to a single-object metadata comparison.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use corestore_rpc::peer::{GetResult, PeerClient};
use corestore_rpc::quorum::get_active_redundancies;
use corestore_store::{LocalStore, StoreError};
use corestore_util::background::BackgroundRunner;
use corestore_util::data::{Metadata, Object, ReadParams, RedundancySet};
use corestore_util::error::Error;

/// Outcome of a read that went through repair-aware resolution (spec §4.5
/// step 4). Every variant here is *terminal*: once a candidate attempt
/// produces one, `read_and_repair` returns it immediately without trying
/// further replicas. Only an "other" error (anything not in this taxonomy)
/// causes the engine to fall through to the next candidate.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
	/// The local copy's checksum matched `params.etag`; caller should treat
	/// this as a conditional-GET 304-equivalent.
	Match,
	Found(Metadata, Object),
	NotFound,
	Timeout,
}

/// External collaborator (spec §4.5): compares metadata across replicas and
/// issues corrective PUT/DELETE as needed. The engine supplies a completion
/// callback mapping `Ok` to `(meta, data)` and errors to `RecoverFailure`,
/// modeled here as the repairer's own `Result`.
#[async_trait]
pub trait ReadRepairer: Send + Sync {
	async fn repair(
		&self,
		params: ReadParams,
		authoritative: Metadata,
		remaining: Vec<String>,
	) -> Result<(), Error>;
}

/// A repairer that takes no corrective action. Used standalone, where no
/// production Read-Repairer is wired in — the engine still spawns the
/// background task, it just has nothing to do.
pub struct NoopReadRepairer;

#[async_trait]
impl ReadRepairer for NoopReadRepairer {
	async fn repair(&self, _params: ReadParams, _authoritative: Metadata, _remaining: Vec<String>) -> Result<(), Error> {
		Ok(())
	}
}

/// One candidate attempt's raw result, before `read_and_repair_3`'s
/// terminal/continue classification is applied.
enum Attempt {
	Match,
	Got(Metadata, Object),
	NotFound,
	Timeout,
	Other(Error),
}

pub struct ReadRepairEngine {
	local_node: String,
	timeout: Duration,
	background: Arc<BackgroundRunner>,
	repairer: Arc<dyn ReadRepairer>,
}

impl ReadRepairEngine {
	pub fn new(
		local_node: String,
		timeout: Duration,
		background: Arc<BackgroundRunner>,
		repairer: Arc<dyn ReadRepairer>,
	) -> Self {
		Self {
			local_node,
			timeout,
			background,
			repairer,
		}
	}

	pub async fn read_and_repair(
		&self,
		params: &ReadParams,
		redundancies: &RedundancySet,
		local: Arc<dyn LocalStore>,
		peer: Arc<dyn PeerClient>,
	) -> Result<ReadOutcome, Error> {
		let active = get_active_redundancies(params.quorum, redundancies)?;

		let mut last_error = Error::NotFound;
		for (i, candidate) in active.iter().enumerate() {
			let remaining = &active[i + 1..];
			match self.attempt(params, candidate, local.as_ref(), peer.as_ref()).await {
				Attempt::Match => return Ok(ReadOutcome::Match),
				Attempt::NotFound => return Ok(ReadOutcome::NotFound),
				Attempt::Timeout => return Ok(ReadOutcome::Timeout),
				Attempt::Got(metadata, object) => return Ok(self.finish(params, remaining, metadata, object)),
				Attempt::Other(e) => last_error = e,
			}
		}
		Err(last_error)
	}

	/// `read_and_repair_2`: run one candidate read, classifying the raw
	/// result into a terminal outcome or a retryable error.
	async fn attempt(&self, params: &ReadParams, candidate: &str, local: &dyn LocalStore, peer: &dyn PeerClient) -> Attempt {
		let is_local = candidate == self.local_node;

		if is_local && params.etag != 0 {
			match local.head(params.address_id, &params.key).await {
				Ok(metadata) => {
					if metadata.checksum == params.etag {
						return Attempt::Match;
					}
					if params.num_of_replicas == 1 {
						return self.local_get(params, local).await;
					}
					// fall through to an unconditional read below
				}
				Err(e) => return Self::classify_store_error(e),
			}
			return self.local_get(params, local).await;
		}

		if is_local {
			return self.local_get(params, local).await;
		}

		self.remote_get(params, candidate, peer).await
	}

	async fn local_get(&self, params: &ReadParams, local: &dyn LocalStore) -> Attempt {
		match local
			.get(params.address_id, &params.key, params.start_pos, params.end_pos, false)
			.await
		{
			Ok((metadata, object)) if metadata.del || object.data.is_empty() => Attempt::NotFound,
			Ok((metadata, object)) => Attempt::Got(metadata, object),
			Err(e) => Self::classify_store_error(e),
		}
	}

	fn classify_store_error(e: StoreError) -> Attempt {
		match e {
			StoreError::NotFound => Attempt::NotFound,
			StoreError::LockedContainer => Attempt::Other(Error::Unavailable("container is locked".into())),
			StoreError::Other(e) => Attempt::Other(e),
		}
	}

	async fn remote_get(&self, params: &ReadParams, node: &str, peer: &dyn PeerClient) -> Attempt {
		let call = peer.get(
			node,
			params.req_id,
			params.address_id,
			&params.key,
			params.etag,
			params.start_pos,
			params.end_pos,
		);
		match tokio::time::timeout(self.timeout, call).await {
			Ok(Ok(GetResult::Ok(metadata, data))) => {
				if metadata.del || data.is_empty() {
					return Attempt::NotFound;
				}
				let object = Object {
					address_id: metadata.address_id,
					key: metadata.key.clone(),
					data,
					data_size: metadata.data_size,
					content_index: metadata.content_index,
					parent_key: Vec::new(),
					has_parent_key: false,
					clock: metadata.clock,
					timestamp: metadata.timestamp,
					checksum: metadata.checksum,
					method: corestore_util::data::Method::Put,
					del: metadata.del,
					req_id: params.req_id,
					ring_hash: metadata.ring_hash,
					num_of_replicas: metadata.num_of_replicas,
					cnumber: metadata.cnumber,
				};
				Attempt::Got(metadata, object)
			}
			Ok(Ok(GetResult::NotFound)) => Attempt::NotFound,
			Ok(Ok(GetResult::Err(msg))) => Attempt::Other(Error::from_peer(node, Error::Message(msg))),
			Ok(Err(e)) => Attempt::Other(Error::from_peer(node, e)),
			Err(_) => Attempt::Timeout,
		}
	}

	/// `read_and_repair_3`'s success path: return immediately if no replicas
	/// remain, otherwise spawn background repair first (spec §4.5 step 4).
	fn finish(&self, params: &ReadParams, remaining: &[String], metadata: Metadata, object: Object) -> ReadOutcome {
		if remaining.is_empty() {
			return ReadOutcome::Found(metadata, object);
		}

		let repairer = self.repairer.clone();
		let params = params.clone();
		let remaining = remaining.to_vec();
		let authoritative = metadata.clone();
		self.background.spawn(async move {
			repairer.repair(params, authoritative, remaining).await.map_err(|e| {
				warn!(error = %e, "read repair failed to converge");
				Error::RecoverFailure(e.to_string())
			})
		});

		ReadOutcome::Found(metadata, object)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use async_trait::async_trait;
	use corestore_rpc::peer::{GetResult, PeerClient};
	use corestore_store::MemStore;
	use corestore_util::data::{CompactionStats, Method, RedundancyNode, WHOLE_OBJECT};
	use std::sync::atomic::{AtomicBool, Ordering};
	use tokio::sync::watch;

	struct NoopPeer;

	#[async_trait]
	impl PeerClient for NoopPeer {
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
		async fn put(&self, _node: &str, _req_id: u64, _object: Object) -> Result<corestore_rpc::ReplicaReply, Error> {
			unimplemented!()
		}
		async fn delete(&self, _node: &str, _req_id: u64, _object: Object) -> Result<corestore_rpc::ReplicaReply, Error> {
			unimplemented!()
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

	struct FlagRepairer(Arc<AtomicBool>);

	#[async_trait]
	impl ReadRepairer for FlagRepairer {
		async fn repair(&self, _params: ReadParams, _authoritative: Metadata, _remaining: Vec<String>) -> Result<(), Error> {
			self.0.store(true, Ordering::SeqCst);
			Ok(())
		}
	}

	fn obj(key: &[u8], data: &[u8]) -> Object {
		Object {
			address_id: 7,
			key: key.to_vec(),
			data: data.to_vec(),
			data_size: data.len() as u64,
			content_index: 0,
			parent_key: Vec::new(),
			has_parent_key: false,
			clock: 1,
			timestamp: 1,
			checksum: 0,
			method: Method::Put,
			del: false,
			req_id: 1,
			ring_hash: 0,
			num_of_replicas: 2,
			cnumber: 0,
		}
	}

	fn redundancy_set(nodes: &[&str]) -> RedundancySet {
		RedundancySet {
			nodes: nodes
				.iter()
				.map(|n| RedundancyNode {
					node: n.to_string(),
					available: true,
				})
				.collect(),
			n: nodes.len(),
			w: 2,
			r: 1,
			d: 2,
			ring_hash: 0,
		}
	}

	#[tokio::test]
	async fn single_replica_returns_without_repair() {
		let (_stop_tx, stop_rx) = watch::channel(false);
		let (background, _join) = BackgroundRunner::new(1, stop_rx);
		let flag = Arc::new(AtomicBool::new(false));
		let engine = ReadRepairEngine::new(
			"local".into(),
			Duration::from_secs(5),
			background,
			Arc::new(FlagRepairer(flag.clone())),
		);

		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let o = obj(b"k", b"value");
		local.put(o.address_id, b"k", o.clone()).await.unwrap();

		let params = ReadParams {
			req_id: 1,
			address_id: o.address_id,
			key: b"k".to_vec(),
			etag: 0,
			start_pos: 0,
			end_pos: WHOLE_OBJECT,
			num_of_replicas: 1,
			quorum: 1,
		};
		let set = redundancy_set(&["local"]);
		let peer: Arc<dyn PeerClient> = Arc::new(NoopPeer);

		let outcome = engine.read_and_repair(&params, &set, local, peer).await.unwrap();
		assert!(matches!(outcome, ReadOutcome::Found(_, _)));
		assert!(!flag.load(Ordering::SeqCst));
	}

	#[tokio::test]
	async fn matching_etag_short_circuits() {
		let (_stop_tx, stop_rx) = watch::channel(false);
		let (background, _join) = BackgroundRunner::new(1, stop_rx);
		let flag = Arc::new(AtomicBool::new(false));
		let engine = ReadRepairEngine::new(
			"local".into(),
			Duration::from_secs(5),
			background,
			Arc::new(FlagRepairer(flag.clone())),
		);

		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let o = obj(b"k", b"value");
		let etag = local.put(o.address_id, b"k", o.clone()).await.unwrap();

		let params = ReadParams {
			req_id: 1,
			address_id: o.address_id,
			key: b"k".to_vec(),
			etag,
			start_pos: 0,
			end_pos: WHOLE_OBJECT,
			num_of_replicas: 2,
			quorum: 1,
		};
		let set = redundancy_set(&["local", "n2"]);
		let peer: Arc<dyn PeerClient> = Arc::new(NoopPeer);

		let outcome = engine.read_and_repair(&params, &set, local, peer).await.unwrap();
		assert!(matches!(outcome, ReadOutcome::Match));
	}

	#[tokio::test]
	async fn absent_key_returns_not_found_without_trying_peer() {
		let (_stop_tx, stop_rx) = watch::channel(false);
		let (background, _join) = BackgroundRunner::new(1, stop_rx);
		let engine = ReadRepairEngine::new(
			"local".into(),
			Duration::from_secs(5),
			background,
			Arc::new(FlagRepairer(Arc::new(AtomicBool::new(false)))),
		);

		let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());
		let params = ReadParams {
			req_id: 1,
			address_id: 99,
			key: b"missing".to_vec(),
			etag: 0,
			start_pos: 0,
			end_pos: WHOLE_OBJECT,
			num_of_replicas: 2,
			quorum: 1,
		};
		let set = redundancy_set(&["local", "n2"]);
		let peer: Arc<dyn PeerClient> = Arc::new(NoopPeer);

		let outcome = engine.read_and_repair(&params, &set, local, peer).await.unwrap();
		assert!(matches!(outcome, ReadOutcome::NotFound));
	}
}
