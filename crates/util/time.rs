//! Time helpers. The node's own wall clock drives `Object::timestamp`; the
//! logical clock (`Object::clock`) is a separate, monotone-per-key counter
//! maintained by the handler layer (spec §3).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_msec() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("system clock is before the epoch")
		.as_millis() as u64
}

/// A per-process monotone logical clock. Spec §3: "`clock` is monotone per
/// (node,key) within a single process lifetime." A single shared counter
/// seeded from wall-clock time gives that monotonicity without needing
/// per-key state, and ties break in favor of the most recently admitted
/// request, matching the "highest clock wins" conflict rule in spec §5.
#[derive(Debug)]
pub struct LogicalClock {
	last: AtomicU64,
}

impl Default for LogicalClock {
	fn default() -> Self {
		Self {
			last: AtomicU64::new(now_msec()),
		}
	}
}

impl LogicalClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Produce the next value, guaranteed strictly greater than any value
	/// previously returned by this clock.
	pub fn tick(&self) -> u64 {
		let now = now_msec();
		loop {
			let prev = self.last.load(Ordering::SeqCst);
			let next = std::cmp::max(now, prev + 1);
			if self
				.last
				.compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
				.is_ok()
			{
				return next;
			}
		}
	}
}
