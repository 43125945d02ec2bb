//! Background task and worker runtime, shared by every long-running loop in
//! the node core (resync/repair loops, the watchdog controller, the worker
//! pool's job runners).

pub mod job_worker;
pub mod worker;

use core::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};

use crate::error::Error;
use worker::{Worker, WorkerProcessor};

pub(crate) type JobOutput = Result<(), Error>;
pub(crate) type Job = Pin<Box<dyn Future<Output = JobOutput> + Send>>;

/// Job runner for detached futures and long-lived `Worker`s.
pub struct BackgroundRunner {
	send_job: mpsc::UnboundedSender<(Job, bool)>,
	send_worker: mpsc::UnboundedSender<Box<dyn Worker>>,
}

impl BackgroundRunner {
	/// Create a new `BackgroundRunner` with `n_runners` job workers draining
	/// the detached-task queue concurrently. Returns the handle plus a join
	/// handle that resolves once every worker has drained out after
	/// `stop_signal` fires.
	pub fn new(
		n_runners: usize,
		stop_signal: watch::Receiver<bool>,
	) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
		let (send_worker, worker_out) = mpsc::unbounded_channel::<Box<dyn Worker>>();

		let await_all_done = tokio::spawn(async move {
			WorkerProcessor::new(worker_out, stop_signal).run().await
		});

		let (send_job, queue_out) = mpsc::unbounded_channel();
		let queue_out = Arc::new(Mutex::new(queue_out));

		let bgrunner = Arc::new(Self {
			send_job,
			send_worker,
		});

		for _ in 0..n_runners.max(1) {
			bgrunner.spawn_worker(job_worker::JobWorker {
				job_chan: queue_out.clone(),
				next_job: None,
			});
		}

		(bgrunner, await_all_done)
	}

	/// Spawn a fire-and-forget background task (spec §5 "Background
	/// fire-and-forget": directory delete fan-out and read-repair never
	/// expose a join handle to their caller).
	pub fn spawn<T>(&self, job: T)
	where
		T: Future<Output = JobOutput> + Send + 'static,
	{
		let boxed: Job = Box::pin(job);
		self.send_job
			.send((boxed, false))
			.ok()
			.expect("could not enqueue background job");
	}

	pub fn spawn_worker<W>(&self, worker: W)
	where
		W: Worker + 'static,
	{
		self.send_worker
			.send(Box::new(worker))
			.ok()
			.expect("could not register background worker");
	}
}
