//! Event Notifier hooks (spec §2 item 8): outbound notifications to
//! downstream directory/remote-cluster syncers after each completed
//! mutation. The durable fan-out itself rides the `PER_OBJECT` queue topic
//! already defined in `corestore_queue`; this module is the thin call site
//! the handler invokes once a mutation has been acknowledged.

use std::sync::Arc;

use async_trait::async_trait;

use corestore_queue::{Topic, TopicSet};
use corestore_util::data::Object;

#[async_trait]
pub trait EventNotifier: Send + Sync {
	async fn notify_mutation(&self, object: &Object);
}

/// Used where no downstream syncer is wired in (e.g. single-node demo mode).
pub struct NoopNotifier;

#[async_trait]
impl EventNotifier for NoopNotifier {
	async fn notify_mutation(&self, _object: &Object) {}
}

/// Publishes a MessagePack-encoded mutation record to `PER_OBJECT`.
pub struct QueueNotifier {
	queues: Arc<TopicSet>,
}

impl QueueNotifier {
	pub fn new(queues: Arc<TopicSet>) -> Self {
		Self { queues }
	}
}

#[async_trait]
impl EventNotifier for QueueNotifier {
	async fn notify_mutation(&self, object: &Object) {
		let payload = match rmp_serde::to_vec(object) {
			Ok(p) => p,
			Err(e) => {
				warn!(error = %e, "failed to encode mutation event, dropping notification");
				return;
			}
		};
		let queue = self.queues.get(Topic::PerObject);
		if let Err(e) = queue.publish(&object.key, payload).await {
			warn!(error = %e, "failed to publish mutation event");
		}
	}
}
