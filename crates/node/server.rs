//! Service wiring and lifecycle, grounded on `garage::server::run_server`:
//! load config, stand up the background runner against a shutdown-signal
//! watch channel, construct every service, then block until the signal
//! fires and drain background work before returning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use corestore_handler::{EventNotifier, Handler, NoopNotifier, QueueNotifier, WorkerPool};
use corestore_queue::{InMemoryQueue, MessageQueue, Topic, TopicSet};
use corestore_replicator::{NoopReadRepairer, ReadRepairEngine, Replicator};
use corestore_rpc::{PeerClient, RedundancyResolver, ReplicationParams, RingResolver};
use corestore_store::{LocalStore, MemStore};
use corestore_util::background::BackgroundRunner;
use corestore_util::config::read_config;
use corestore_util::error::Error;
use corestore_watchdog::{AdaptiveController, CompactorFsm, UnsafeRegistry, WatchdogState};

use crate::peer::LoopbackPeerClient;

const ALL_TOPICS: [Topic; 9] = [
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

fn build_topic_set() -> Arc<TopicSet> {
	let handles: Vec<Arc<dyn MessageQueue>> = ALL_TOPICS
		.iter()
		.map(|t| Arc::new(InMemoryQueue::new(*t)) as Arc<dyn MessageQueue>)
		.collect();
	Arc::new(TopicSet::new(handles))
}

pub async fn run_server(config_file: PathBuf) -> Result<(), Error> {
	info!("loading configuration...");
	let config = Arc::new(read_config(config_file)?);
	let local_node = config.rpc_bind_addr.to_string();

	info!("initializing background runner...");
	let watch_cancel = watch_shutdown_signal();
	let (background, await_background_done) = BackgroundRunner::new(4, watch_cancel.clone());

	info!("initializing local store...");
	let local: Arc<dyn LocalStore> = Arc::new(MemStore::new());

	info!("initializing redundancy resolver...");
	let replication = ReplicationParams::new(
		config.replication_factor,
		config.write_quorum,
		config.read_quorum,
		config.delete_quorum,
	);
	// No cluster-membership service is wired in here (spec §1: ring
	// maintenance is an external collaborator); this node always sees
	// itself as the sole running member.
	let redundancy: Arc<dyn RedundancyResolver> = Arc::new(RingResolver::new(vec![local_node.clone()], replication));

	info!("initializing peer client...");
	let peer: Arc<dyn PeerClient> = Arc::new(LoopbackPeerClient);

	info!("initializing message queues...");
	let queues = build_topic_set();

	info!("initializing replication and read-repair engines...");
	let timeout = Duration::from_millis(config.request_timeout_ms);
	let replicator = Arc::new(Replicator::new(local_node.clone(), timeout));
	let read_repair = Arc::new(ReadRepairEngine::new(
		local_node.clone(),
		timeout,
		background.clone(),
		Arc::new(NoopReadRepairer),
	));

	info!("initializing watchdog state and adaptive controller...");
	let watchdog: Arc<dyn WatchdogState> = Arc::new(UnsafeRegistry::new());
	let compactor = Arc::new(CompactorFsm::new());
	let _controller = AdaptiveController::new(
		config.clone(),
		queues.clone(),
		compactor,
		local.clone(),
		redundancy.clone(),
		peer.clone(),
		local_node.clone(),
	);

	let notifier: Arc<dyn EventNotifier> = Arc::new(QueueNotifier::new(queues.clone()));

	info!("wiring handler layer...");
	let handler = Arc::new(Handler::new(
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
		background.clone(),
	));

	// Admission control in front of the handler (spec §4.2). No public-facing
	// request surface is wired up here (protocol framing is out of scope),
	// but the pool is constructed so a gateway front-end has something to
	// enqueue onto.
	let _pool = WorkerPool::new("handler", config.worker_pool_pending_limit);

	info!("storage node core is up; awaiting shutdown signal");
	wait_for_cancel(watch_cancel).await;

	drop(handler);
	info!("draining background tasks...");
	await_background_done
		.await
		.map_err(|e| Error::Message(format!("background runner did not shut down cleanly: {}", e)))?;

	info!("cleaning up...");
	Ok(())
}

async fn wait_for_cancel(mut chan: watch::Receiver<bool>) {
	while !*chan.borrow() {
		if chan.changed().await.is_err() {
			return;
		}
	}
}

#[cfg(unix)]
fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::unix::{signal, SignalKind};

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
		let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
		let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
		tokio::select! {
			_ = sigint.recv() => info!("received SIGINT, shutting down"),
			_ = sigterm.recv() => info!("received SIGTERM, shutting down"),
			_ = sighup.recv() => info!("received SIGHUP, shutting down"),
		}
		send_cancel.send(true).ok();
	});
	watch_cancel
}

#[cfg(windows)]
fn watch_shutdown_signal() -> watch::Receiver<bool> {
	use tokio::signal::windows::ctrl_c;

	let (send_cancel, watch_cancel) = watch::channel(false);
	tokio::spawn(async move {
		let mut sigint = ctrl_c().expect("failed to install Ctrl-C handler");
		sigint.recv().await;
		info!("received Ctrl-C, shutting down");
		send_cancel.send(true).ok();
	});
	watch_cancel
}
