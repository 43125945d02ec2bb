//! The `LocalStore` trait (spec §4.3) and its error taxonomy.

use async_trait::async_trait;

use corestore_util::data::{Metadata, Object};
use corestore_util::error::Error;

/// Sentinel for `head_with_md5`'s running-digest context; the real engine
/// would thread an actual MD5 state through repeated calls, this core only
/// needs to pass it through unchanged.
#[derive(Debug, Clone, Default)]
pub struct Md5Ctx(pub Vec<u8>);

/// Errors the Local Store Facade can produce. `LockedContainer` MUST be
/// translated by callers to `Error::Unavailable` at the handler boundary
/// (spec §4.3) — it is kept distinct here so that callers can tell "the
/// compactor has this container locked" apart from every other failure mode.
#[derive(Debug)]
pub enum StoreError {
	NotFound,
	LockedContainer,
	Other(Error),
}

impl From<Error> for StoreError {
	fn from(e: Error) -> Self {
		StoreError::Other(e)
	}
}

impl StoreError {
	/// Translate to the core error taxonomy at the handler boundary (spec
	/// §4.3: "`LockedContainer` MUST be translated by callers to
	/// `Unavailable`").
	pub fn into_core_error(self) -> Error {
		match self {
			StoreError::NotFound => Error::NotFound,
			StoreError::LockedContainer => Error::Unavailable("container is locked".into()),
			StoreError::Other(e) => e,
		}
	}
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Visitor invoked by `fetch_by_key` for every matching entry.
pub type FetchVisitor = Box<dyn FnMut(&[u8], &Metadata) + Send>;

/// Ownership predicate used by `compact_data` (spec §4.3) to decide which
/// scheduled containers this node is still responsible for by the time the
/// compaction actually runs.
pub type OwnershipPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Thin contract over the object store primitives (spec §4.3).
#[async_trait]
pub trait LocalStore: Send + Sync {
	/// Ranges are inclusive; sentinel positions (`corestore_util::data::WHOLE_OBJECT`)
	/// mean "whole object". `forced_integrity_check` requires verifying the
	/// stored checksum against the data before returning.
	async fn get(
		&self,
		address_id: u32,
		key: &[u8],
		start_pos: u64,
		end_pos: u64,
		forced_integrity_check: bool,
	) -> StoreResult<(Metadata, Object)>;

	/// Returns the ETag (content checksum) of the stored object.
	async fn put(&self, address_id: u32, key: &[u8], object: Object) -> StoreResult<u64>;

	/// Writes a tombstone containing the object's clock/timestamp.
	async fn delete(&self, address_id: u32, key: &[u8], object: Object) -> StoreResult<()>;

	async fn head(&self, address_id: u32, key: &[u8]) -> StoreResult<Metadata>;

	async fn head_with_md5(
		&self,
		address_id: u32,
		key: &[u8],
		ctx: Md5Ctx,
	) -> StoreResult<(Metadata, Md5Ctx)>;

	/// Scans metadata whose key begins with `prefix`, invoking `visitor` with
	/// `(key, metadata)` for each match.
	async fn fetch_by_key(&self, prefix: &[u8], visitor: FetchVisitor) -> StoreResult<()>;

	async fn compact_data(
		&self,
		targets: Vec<String>,
		parallelism: usize,
		ownership_predicate: OwnershipPredicate,
	) -> StoreResult<()>;
}
