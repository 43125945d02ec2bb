//! The Handler Layer (spec §4.6): GET/PUT/DELETE/HEAD, chunked-object
//! teardown, inbound replication RPC handling, the admission-bounded Worker
//! Pool (spec §4.2), the recursive directory delete fan-out (spec §4.8) and
//! the Event Notifier hooks (spec §2 item 8).

#[macro_use]
extern crate tracing;

pub mod dir_delete;
pub mod handler;
pub mod notifier;
pub mod pool;

pub use dir_delete::delete_directory;
pub use handler::{Handler, HeadOutcome};
pub use notifier::{EventNotifier, NoopNotifier, QueueNotifier};
pub use pool::{TaskOutcome, WorkerPool};
