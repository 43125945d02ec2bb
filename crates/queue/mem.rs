//! An in-memory queue handle used by tests to assert on published payloads
//! and on `increase`/`decrease` call counts, in lieu of a real durable broker.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use corestore_util::error::Error;

use crate::topic::{MessageQueue, Topic};

pub struct InMemoryQueue {
	topic: Topic,
	published: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
	concurrency: AtomicI64,
}

impl InMemoryQueue {
	pub fn new(topic: Topic) -> Self {
		Self {
			topic,
			published: Mutex::new(Vec::new()),
			concurrency: AtomicI64::new(1),
		}
	}

	pub fn published(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
		self.published.lock().unwrap().clone()
	}

	pub fn concurrency(&self) -> i64 {
		self.concurrency.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
	fn topic(&self) -> Topic {
		self.topic
	}

	async fn publish(&self, key: &[u8], payload: Vec<u8>) -> Result<(), Error> {
		self.published.lock().unwrap().push((key.to_vec(), payload));
		Ok(())
	}

	fn increase(&self) {
		self.concurrency.fetch_add(1, Ordering::SeqCst);
	}

	fn decrease(&self) {
		self.concurrency.fetch_sub(1, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::topic::TopicSet;
	use std::sync::Arc;

	fn full_set() -> (TopicSet, Vec<Arc<InMemoryQueue>>) {
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
		let queues: Vec<Arc<InMemoryQueue>> = topics.iter().map(|t| Arc::new(InMemoryQueue::new(*t))).collect();
		let handles: Vec<Arc<dyn MessageQueue>> = queues.iter().map(|q| q.clone() as Arc<dyn MessageQueue>).collect();
		(TopicSet::new(handles), queues)
	}

	#[tokio::test]
	async fn publish_records_key_and_payload() {
		let q = InMemoryQueue::new(Topic::AsyncDeleteObj);
		q.publish(b"addr/key", b"payload".to_vec()).await.unwrap();
		assert_eq!(q.published(), vec![(b"addr/key".to_vec(), b"payload".to_vec())]);
	}

	#[test]
	fn channel_a_decrease_skips_async_delete_dir() {
		let (set, queues) = full_set();
		set.decrease_channel_a();
		for q in &queues {
			if q.topic() == Topic::AsyncDeleteDir {
				assert_eq!(q.concurrency(), 1);
			} else {
				assert_eq!(q.concurrency(), 0);
			}
		}
	}

	#[test]
	fn channel_a_increase_then_decrease_is_symmetric() {
		let (set, queues) = full_set();
		set.decrease_channel_a();
		set.increase_channel_a();
		for q in &queues {
			assert_eq!(q.concurrency(), 1);
		}
	}
}
