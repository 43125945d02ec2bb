//! Worker Pool / Admission (spec §4.2): a bounded, named pool that rejects
//! new work once its aggregate pending depth exceeds the configured
//! high-water mark (200 by default, spec §6 `worker_pool_pending_limit`).
//! Tasks always run to completion; whatever they return is captured as a
//! structured outcome rather than surfaced as the pool call's own failure.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corestore_util::error::Error;

/// What became of an admitted task. The pool call itself only fails on
/// admission (`Unavailable`, over capacity); whatever the task produced —
/// success or its own error — is reported here instead.
#[derive(Debug)]
pub enum TaskOutcome<T> {
	Completed(T),
	Failed(Error),
}

impl<T> TaskOutcome<T> {
	pub fn into_result(self) -> Result<T, Error> {
		match self {
			TaskOutcome::Completed(v) => Ok(v),
			TaskOutcome::Failed(e) => Err(e),
		}
	}
}

pub struct WorkerPool {
	name: String,
	limit: usize,
	pending: Arc<AtomicUsize>,
}

impl WorkerPool {
	pub fn new(name: impl Into<String>, limit: usize) -> Self {
		Self {
			name: name.into(),
			limit,
			pending: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn pending_depth(&self) -> usize {
		self.pending.load(Ordering::SeqCst)
	}

	/// Admits `task` if the aggregate pending depth is at or below the
	/// high-water mark, dispatches it, and awaits it to completion. No
	/// ordering guarantee is made across concurrently enqueued tasks.
	pub async fn enqueue<F, T>(&self, task: F) -> Result<TaskOutcome<T>, Error>
	where
		F: Future<Output = Result<T, Error>> + Send + 'static,
		T: Send + 'static,
	{
		let depth = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
		if depth > self.limit {
			self.pending.fetch_sub(1, Ordering::SeqCst);
			return Err(Error::Unavailable(format!(
				"worker pool '{}' is over its {}-task limit",
				self.name, self.limit
			)));
		}

		let pending = self.pending.clone();
		let handle = tokio::spawn(async move {
			let result = task.await;
			pending.fetch_sub(1, Ordering::SeqCst);
			result
		});

		match handle.await {
			Ok(Ok(value)) => Ok(TaskOutcome::Completed(value)),
			Ok(Err(e)) => Ok(TaskOutcome::Failed(e)),
			Err(join_err) => Ok(TaskOutcome::Failed(Error::Message(format!(
				"worker pool '{}' task did not complete cleanly: {}",
				self.name, join_err
			)))),
		}
	}
}
