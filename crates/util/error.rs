//! Error taxonomy for the storage node core (spec §7).
//!
//! Kinds are the ones named in the error handling design: `NotFound`,
//! `Unavailable`, `Timeout`, `NoRedundancy`, `NotSatisfyQuorum`,
//! `RecoverFailure`, `ReplicateFailure` and `InvalidData`, plus the plumbing
//! needed to wrap peer-attributed failures and lower-level causes.

use err_derive::Error;

/// The single error type shared by every crate in the workspace.
#[derive(Debug, Error)]
pub enum Error {
	/// Object or metadata absent.
	#[error(display = "not found")]
	NotFound,

	/// Local store locked (compaction in progress) or watchdog reports an
	/// unsafe condition; caller may retry.
	#[error(display = "unavailable: {}", _0)]
	Unavailable(String),

	/// A peer RPC deadline was exceeded.
	#[error(display = "timeout")]
	Timeout,

	/// The ring/redundancy service returned no usable set. Fatal for the
	/// request that triggered it.
	#[error(display = "no redundancy information for this key")]
	NoRedundancy,

	/// Too few available replicas to satisfy the requested quorum.
	#[error(display = "not enough available replicas to satisfy quorum")]
	NotSatisfyQuorum,

	/// Read-repair could not converge replicas. Logged only, never surfaced
	/// to the original caller (repair runs in the background).
	#[error(display = "read repair could not converge: {}", _0)]
	RecoverFailure(String),

	/// Replication completed under quorum, and no replica reported
	/// `NotFound` (which would have been reported as `NotFound` instead).
	#[error(display = "replication failed to reach quorum")]
	ReplicateFailure,

	/// Stored metadata failed to decode; the object is treated as corrupt.
	#[error(display = "invalid data: {}", _0)]
	InvalidData(String),

	/// A peer-attributed failure: the cause came back tagged with the node
	/// that produced it, so that callers can log or penalize that node
	/// specifically.
	#[error(display = "peer {} reported: {}", node, cause)]
	Peer { node: String, cause: Box<Error> },

	/// Catch-all for conditions not covered by the taxonomy above, mirroring
	/// the teacher's bare `Message(String)` variant.
	#[error(display = "{}", _0)]
	Message(String),

	#[error(display = "IO error: {}", _0)]
	Io(#[error(source)] std::io::Error),

	#[error(display = "messagepack encode error: {}", _0)]
	RmpEncode(#[error(source)] rmp_serde::encode::Error),

	#[error(display = "messagepack decode error: {}", _0)]
	RmpDecode(#[error(source)] rmp_serde::decode::Error),

	#[error(display = "TOML decode error: {}", _0)]
	TomlDecode(#[error(source)] toml::de::Error),

	#[error(display = "JSON error: {}", _0)]
	Json(#[error(source)] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
	/// Tag an error with the node that produced it, per the propagation rule
	/// in spec §7 ("peer-side errors are wrapped `{Err, node, cause}`").
	pub fn from_peer(node: impl Into<String>, cause: Error) -> Error {
		Error::Peer {
			node: node.into(),
			cause: Box::new(cause),
		}
	}

	/// True when this error (or the cause it wraps, if it is a `Peer` error)
	/// is a `NotFound`. Used by the Replicator's error-collapsing callback
	/// (spec §4.4 point 4: "NotFound wins over generic failure").
	pub fn is_not_found(&self) -> bool {
		match self {
			Error::NotFound => true,
			Error::Peer { cause, .. } => cause.is_not_found(),
			_ => false,
		}
	}

	pub fn unexpected_rpc_message(msg: impl std::fmt::Debug) -> Error {
		Error::Message(format!("Unexpected RPC message: {:?}", msg))
	}
}

/// Convenience trait mirroring `garage_util`'s `OkOrMessage`, used to turn an
/// `Option` into a `Result` with a `Message` error at call sites that aren't
/// already part of the formal taxonomy.
pub trait OkOrMessage<T> {
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T>;
}

impl<T> OkOrMessage<T> for Option<T> {
	fn ok_or_message<M: Into<String>>(self, message: M) -> Result<T> {
		self.ok_or_else(|| Error::Message(message.into()))
	}
}
