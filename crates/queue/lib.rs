//! The durable, at-least-once message queue contract (spec §6): nine named
//! topics, each publishable and each independently throttleable by the
//! watchdog's adaptive controller. The durable broker itself is an external
//! collaborator, out of scope per spec §1; this crate defines the topic
//! contract plus an in-memory test double.

#[macro_use]
extern crate tracing;

pub mod mem;
pub mod topic;

pub use mem::InMemoryQueue;
pub use topic::{MessageQueue, Topic, TopicSet};
