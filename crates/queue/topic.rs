//! Topic identifiers and the per-queue capability handle (spec §6, design
//! note "Dynamic queue throttling": "Model as a capability handle per queue
//! with `set_concurrency(delta)`; avoid global lookup by name at the call
//! site").

use async_trait::async_trait;
use corestore_util::error::Error;

/// The nine durable topics named in spec §6. `AsyncDeleteDir` backs the
/// retry envelope for a failed `delete_objects_under_dir` peer call (spec
/// §4.8 point 5) and is distinct from `DelDir`, the directory-tombstone
/// sync record published once per directory delete (spec §4.8 point 3);
/// only the latter is one of the eight queues the watchdog throttles on
/// Channel A (spec §4.7 point 1 / scenario S6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
	PerObject,
	SyncByVnodeId,
	Rebalance,
	AsyncDeleteObj,
	AsyncDeleteDir,
	RecoveryNode,
	SyncObjWithDc,
	CompMetaWithDc,
	DelDir,
}

impl Topic {
	pub fn qid(self) -> &'static str {
		match self {
			Topic::PerObject => "PER_OBJECT",
			Topic::SyncByVnodeId => "SYNC_BY_VNODE_ID",
			Topic::Rebalance => "REBALANCE",
			Topic::AsyncDeleteObj => "ASYNC_DELETE_OBJ",
			Topic::AsyncDeleteDir => "ASYNC_DELETE_DIR",
			Topic::RecoveryNode => "RECOVERY_NODE",
			Topic::SyncObjWithDc => "SYNC_OBJ_WITH_DC",
			Topic::CompMetaWithDc => "COMP_META_WITH_DC",
			Topic::DelDir => "DEL_DIR",
		}
	}

	/// The eight topics whose consumer concurrency Channel A raises and
	/// lowers in lockstep with the compactor FSM (spec §4.7 point 1).
	/// `AsyncDeleteDir` is excluded: it is a retry-only sink, never a
	/// steady-state consumer the cluster needs to throttle.
	pub fn channel_a_topics() -> [Topic; 8] {
		[
			Topic::PerObject,
			Topic::SyncByVnodeId,
			Topic::Rebalance,
			Topic::AsyncDeleteObj,
			Topic::RecoveryNode,
			Topic::SyncObjWithDc,
			Topic::CompMetaWithDc,
			Topic::DelDir,
		]
	}
}

/// A single named queue, supporting publish plus dynamic consumer-concurrency
/// adjustment (spec §6).
#[async_trait]
pub trait MessageQueue: Send + Sync {
	fn topic(&self) -> Topic;

	async fn publish(&self, key: &[u8], payload: Vec<u8>) -> Result<(), Error>;

	/// Raise consumer concurrency by one step.
	fn increase(&self);

	/// Lower consumer concurrency by one step.
	fn decrease(&self);
}

/// The full set of topic handles a node holds open, indexed by `Topic` so
/// the handler/watchdog never performs a name lookup at the call site.
pub struct TopicSet {
	handles: std::collections::HashMap<Topic, std::sync::Arc<dyn MessageQueue>>,
}

impl TopicSet {
	pub fn new(handles: Vec<std::sync::Arc<dyn MessageQueue>>) -> Self {
		let mut map = std::collections::HashMap::new();
		for h in handles {
			map.insert(h.topic(), h);
		}
		Self { handles: map }
	}

	/// Panics if `topic` has no registered handle; every topic in `Topic`
	/// must be wired at startup, so a missing handle is a construction bug.
	pub fn get(&self, topic: Topic) -> std::sync::Arc<dyn MessageQueue> {
		self.handles
			.get(&topic)
			.cloned()
			.unwrap_or_else(|| panic!("no queue handle registered for topic {:?}", topic))
	}

	pub fn increase_channel_a(&self) {
		for t in Topic::channel_a_topics() {
			self.get(t).increase();
		}
	}

	pub fn decrease_channel_a(&self) {
		for t in Topic::channel_a_topics() {
			self.get(t).decrease();
		}
	}
}
