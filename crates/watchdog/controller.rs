//! The Adaptive Controller (spec §4.7): Channel A couples CPU/disk/cluster/
//! message-count alarms to compactor and queue concurrency; Channel B
//! couples fragmentation alarms to opportunistic compaction.

use std::sync::Arc;
use std::time::Duration;

use corestore_queue::TopicSet;
use corestore_rpc::peer::PeerClient;
use corestore_rpc::redundancy::RedundancyResolver;
use corestore_store::LocalStore;
use corestore_util::config::Config;
use corestore_util::data::{CompactionStatus, WatchdogAlarm, ALARM_LEVEL_ERROR};
use corestore_util::time::now_msec;

use crate::compactor::CompactorFsm;

pub struct AdaptiveController {
	config: Arc<Config>,
	queues: Arc<TopicSet>,
	compactor: Arc<CompactorFsm>,
	local: Arc<dyn LocalStore>,
	redundancy: Arc<dyn RedundancyResolver>,
	peer: Arc<dyn PeerClient>,
	local_node: String,
}

impl AdaptiveController {
	pub fn new(
		config: Arc<Config>,
		queues: Arc<TopicSet>,
		compactor: Arc<CompactorFsm>,
		local: Arc<dyn LocalStore>,
		redundancy: Arc<dyn RedundancyResolver>,
		peer: Arc<dyn PeerClient>,
		local_node: String,
	) -> Self {
		Self {
			config,
			queues,
			compactor,
			local,
			redundancy,
			peer,
			local_node,
		}
	}

	fn channel_a_enabled(&self) -> bool {
		self.config.wd_cpu_enabled || self.config.wd_disk_enabled
	}

	/// Channel A, alarm side (spec §4.7 point 1 / scenario S6): a watchdog
	/// alarm with both CPU and disk watchdogs disabled has no effect
	/// (invariant 6).
	pub fn on_channel_a_alarm(&self) {
		if !self.channel_a_enabled() {
			return;
		}
		self.compactor.decrease();
		self.queues.decrease_channel_a();
	}

	/// Channel A, "safe count reached" side: symmetric increase.
	pub fn on_channel_a_safe(&self) {
		if !self.channel_a_enabled() {
			return;
		}
		self.compactor.increase();
		self.queues.increase_channel_a();
	}

	/// Channel B (fragmentation watchdog): alarm at level ≥ ERROR may trigger
	/// a compaction pass, gated by `can_start_compaction` and the compactor's
	/// own idle/interval bookkeeping.
	pub async fn on_channel_b_alarm(&self, alarm: &WatchdogAlarm) {
		if alarm.level < ALARM_LEVEL_ERROR {
			return;
		}
		if !self.can_start_compaction().await {
			return;
		}

		tokio::time::sleep(Duration::from_millis(self.config.compaction_pre_wait_ms)).await;

		let stats = self.compactor.status();
		let elapsed = now_msec().saturating_sub(stats.latest_exec_time);
		if stats.status == CompactionStatus::Idle
			&& !stats.pending_targets.is_empty()
			&& elapsed >= self.config.auto_compaction_interval
		{
			let local_node = self.local_node.clone();
			let redundancy = self.redundancy.clone();
			let predicate: corestore_store::OwnershipPredicate =
				Box::new(move |target: &str| redundancy.has_charge_of_node(target.as_bytes(), &local_node));

			if let Err(e) = self
				.compactor
				.run(self.local.as_ref(), self.config.auto_compaction_parallel_procs, predicate)
				.await
			{
				warn!(error = %e, "opportunistic compaction failed");
			}
		}
	}

	/// `can_start_compaction()` (spec §4.7): holds when, across all RUNNING
	/// cluster members queried for compaction status, fewer than
	/// `max(1, round(|members| / N) - 1)` are currently RUNNING. `N` comes
	/// from `replication_factor`; zero means "unconfigured" and is fatal to
	/// the check (always `false`), per spec "missing N means false".
	///
	/// `|members| == 0` is deliberately not special-cased: with zero running
	/// members the observed-running count is also zero, so the formula below
	/// falls out to `0 < max(1, ...)`, i.e. `true`. This mirrors the source
	/// literally rather than guarding against what looks like a startup-window
	/// edge case.
	async fn can_start_compaction(&self) -> bool {
		let n = self.config.replication_factor;
		if n == 0 {
			return false;
		}

		let members = self.redundancy.running_members();

		let mut running = 0i64;
		for member in &members {
			let status = if *member == self.local_node {
				Some(self.compactor.status())
			} else {
				self.peer.compact(member).await.ok()
			};
			if let Some(stats) = status {
				if stats.status == CompactionStatus::Running {
					running += 1;
				}
			}
		}

		let threshold = std::cmp::max(1, ((members.len() as f64 / n as f64).round() as i64) - 1);
		running < threshold
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use async_trait::async_trait;
	use corestore_queue::{InMemoryQueue, Topic};
	use corestore_rpc::peer::{GetResult, ReplicaReply};
	use corestore_rpc::redundancy::RingResolver;
	use corestore_rpc::replication_mode::ReplicationParams;
	use corestore_store::MemStore;
	use corestore_util::data::{CompactionStats, Metadata, Object, ALARM_LEVEL_INFO};
	use corestore_util::error::Error;

	fn topic_set() -> Arc<TopicSet> {
		let topics = [
			Topic::PerObject,
			Topic::SyncByVnodeId,
			Topic::Rebalance,
			Topic::AsyncDeleteObj,
			Topic::AsyncDeleteDir,
			Topic::RecoveryNode,
			Topic::SyncObjWithDc,
			Topic::CompMetaWithDc,
			Topic::DelDir,
		];
		let handles: Vec<Arc<dyn corestore_queue::MessageQueue>> =
			topics.iter().map(|t| Arc::new(InMemoryQueue::new(*t)) as Arc<dyn corestore_queue::MessageQueue>).collect();
		Arc::new(TopicSet::new(handles))
	}

	struct StubPeer;

	#[async_trait]
	impl PeerClient for StubPeer {
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
			Ok(CompactionStats {
				status: CompactionStatus::Idle,
				pending_targets: Vec::new(),
				latest_exec_time: 0,
			})
		}
		async fn delete_objects_under_dir(&self, _node: &str, _prefix: &[u8]) -> Result<(), Error> {
			Ok(())
		}
	}

	fn controller(cpu: bool, disk: bool) -> AdaptiveController {
		let config = Config {
			rpc_bind_addr: "127.0.0.1:3901".parse().unwrap(),
			replication_factor: 3,
			write_quorum: 2,
			read_quorum: 2,
			delete_quorum: 2,
			wd_cpu_enabled: cpu,
			wd_disk_enabled: disk,
			auto_compaction_interval: 6 * 60 * 60 * 1000,
			auto_compaction_parallel_procs: 1,
			request_timeout_ms: 5_000,
			worker_pool_pending_limit: 200,
			compaction_pre_wait_ms: 1,
		};
		AdaptiveController::new(
			Arc::new(config),
			topic_set(),
			Arc::new(CompactorFsm::new()),
			Arc::new(MemStore::new()),
			Arc::new(RingResolver::new(vec!["local".into(), "b".into(), "c".into()], ReplicationParams::new(3, 2, 2, 2))),
			Arc::new(StubPeer),
			"local".into(),
		)
	}

	#[test]
	fn disabled_channel_a_has_no_effect() {
		let c = controller(false, false);
		c.on_channel_a_alarm();
		assert_eq!(c.compactor.concurrency(), 1);
	}

	#[test]
	fn enabled_channel_a_decreases_then_increases_symmetrically() {
		let c = controller(true, false);
		c.on_channel_a_alarm();
		assert_eq!(c.compactor.concurrency(), 0);
		c.on_channel_a_safe();
		assert_eq!(c.compactor.concurrency(), 1);
	}

	#[tokio::test]
	async fn sub_error_level_alarm_is_ignored() {
		let c = controller(true, true);
		c.on_channel_b_alarm(&WatchdogAlarm {
			level: ALARM_LEVEL_INFO,
			props: Default::default(),
		})
		.await;
		assert_eq!(c.compactor.status().status, CompactionStatus::Idle);
	}
}
