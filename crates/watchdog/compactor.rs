//! The compactor FSM the watchdog controller drives: a concurrency dial
//! plus IDLE/RUNNING status, pending targets and the timestamp of the last
//! run (spec §3 `CompactionStats`, §4.7).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use corestore_store::{LocalStore, OwnershipPredicate};
use corestore_util::data::{CompactionStats, CompactionStatus};
use corestore_util::error::Error;
use corestore_util::time::now_msec;

pub struct CompactorFsm {
	concurrency: AtomicI64,
	status: Mutex<CompactionStatus>,
	pending_targets: Mutex<Vec<String>>,
	latest_exec_time: AtomicU64,
}

impl Default for CompactorFsm {
	fn default() -> Self {
		Self::new()
	}
}

impl CompactorFsm {
	pub fn new() -> Self {
		Self {
			concurrency: AtomicI64::new(1),
			status: Mutex::new(CompactionStatus::Idle),
			pending_targets: Mutex::new(Vec::new()),
			latest_exec_time: AtomicU64::new(0),
		}
	}

	pub fn increase(&self) {
		self.concurrency.fetch_add(1, Ordering::SeqCst);
	}

	pub fn decrease(&self) {
		self.concurrency.fetch_sub(1, Ordering::SeqCst);
	}

	pub fn concurrency(&self) -> i64 {
		self.concurrency.load(Ordering::SeqCst)
	}

	pub fn set_pending_targets(&self, targets: Vec<String>) {
		*self.pending_targets.lock().unwrap() = targets;
	}

	pub fn status(&self) -> CompactionStats {
		CompactionStats {
			status: *self.status.lock().unwrap(),
			pending_targets: self.pending_targets.lock().unwrap().clone(),
			latest_exec_time: self.latest_exec_time.load(Ordering::SeqCst),
		}
	}

	/// Runs a compaction pass against `local`, marking the FSM RUNNING for
	/// its duration and stamping `latest_exec_time` on completion regardless
	/// of outcome.
	pub async fn run(
		&self,
		local: &dyn LocalStore,
		parallelism: usize,
		ownership_predicate: OwnershipPredicate,
	) -> Result<(), Error> {
		let targets = self.pending_targets.lock().unwrap().clone();
		*self.status.lock().unwrap() = CompactionStatus::Running;

		let result = local.compact_data(targets, parallelism, ownership_predicate).await;

		*self.status.lock().unwrap() = CompactionStatus::Idle;
		self.latest_exec_time.store(now_msec(), Ordering::SeqCst);
		self.pending_targets.lock().unwrap().clear();

		result.map_err(|e| e.into_core_error())
	}
}
