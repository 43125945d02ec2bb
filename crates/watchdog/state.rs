//! Watchdog state query used as the Handler layer's pre-flight guard (spec
//! §4.6: "every local PUT/DELETE/GET-fun consults a watchdog state query
//! `find_not_safe_items(exclude_set)`"). Kept distinct from the adaptive
//! controller: the controller reacts to alarms, this is the read-only
//! surface the handler polls before touching the store.

use std::collections::HashSet;
use std::sync::RwLock;

/// Contract for the process-wide "what's currently unsafe" query.
pub trait WatchdogState: Send + Sync {
	/// Items (container ids) currently flagged unsafe, excluding anything in
	/// `exclude`.
	fn find_not_safe_items(&self, exclude: &[String]) -> Vec<String>;
}

/// An in-memory registry of unsafe items, written by the adaptive controller
/// (or tests) and read by the handler's pre-flight guard.
pub struct UnsafeRegistry {
	items: RwLock<HashSet<String>>,
}

impl Default for UnsafeRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl UnsafeRegistry {
	pub fn new() -> Self {
		Self {
			items: RwLock::new(HashSet::new()),
		}
	}

	pub fn mark_unsafe(&self, item: impl Into<String>) {
		self.items.write().unwrap().insert(item.into());
	}

	pub fn mark_safe(&self, item: &str) {
		self.items.write().unwrap().remove(item);
	}
}

impl WatchdogState for UnsafeRegistry {
	fn find_not_safe_items(&self, exclude: &[String]) -> Vec<String> {
		self.items
			.read()
			.unwrap()
			.iter()
			.filter(|i| !exclude.contains(i))
			.cloned()
			.collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn exclude_set_filters_matches() {
		let reg = UnsafeRegistry::new();
		reg.mark_unsafe("shard-3");
		reg.mark_unsafe("shard-9");
		let found = reg.find_not_safe_items(&["shard-3".to_string()]);
		assert_eq!(found, vec!["shard-9".to_string()]);
	}

	#[test]
	fn mark_safe_clears_an_item() {
		let reg = UnsafeRegistry::new();
		reg.mark_unsafe("shard-3");
		reg.mark_safe("shard-3");
		assert!(reg.find_not_safe_items(&[]).is_empty());
	}
}
