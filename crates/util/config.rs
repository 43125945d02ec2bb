//! Node configuration (spec §6 "Configuration keys consumed").

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;

/// Top-level node configuration, loaded from a TOML file.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
	/// Address to bind for peer RPC.
	pub rpc_bind_addr: SocketAddr,

	/// Replication factor (N).
	#[serde(default = "default_replication_factor")]
	pub replication_factor: usize,
	/// Write quorum (W).
	#[serde(default = "default_write_quorum")]
	pub write_quorum: usize,
	/// Read quorum (R).
	#[serde(default = "default_read_quorum")]
	pub read_quorum: usize,
	/// Delete quorum (D).
	#[serde(default = "default_delete_quorum")]
	pub delete_quorum: usize,

	/// Whether the CPU watchdog is enabled.
	#[serde(default)]
	pub wd_cpu_enabled: bool,
	/// Whether the disk watchdog is enabled.
	#[serde(default)]
	pub wd_disk_enabled: bool,

	/// Minimum interval between automatic compactions.
	#[serde(default = "default_auto_compaction_interval")]
	pub auto_compaction_interval: u64,
	/// Parallelism used for automatic compaction runs.
	#[serde(default = "default_auto_compaction_parallel_procs")]
	pub auto_compaction_parallel_procs: usize,

	/// Per-call peer RPC timeout, in milliseconds.
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,

	/// Worker pool pending-task high-water mark (spec §4.2).
	#[serde(default = "default_worker_pool_pending_limit")]
	pub worker_pool_pending_limit: usize,

	/// Sleep before re-checking compactor state after a fragmentation alarm
	/// (spec §4.7 Channel B).
	#[serde(default = "default_compaction_pre_wait_ms")]
	pub compaction_pre_wait_ms: u64,
}

fn default_replication_factor() -> usize {
	3
}
fn default_write_quorum() -> usize {
	2
}
fn default_read_quorum() -> usize {
	2
}
fn default_delete_quorum() -> usize {
	2
}
fn default_auto_compaction_interval() -> u64 {
	6 * 60 * 60 * 1000
}
fn default_auto_compaction_parallel_procs() -> usize {
	1
}
fn default_request_timeout_ms() -> u64 {
	5_000
}
fn default_worker_pool_pending_limit() -> usize {
	200
}
fn default_compaction_pre_wait_ms() -> u64 {
	100
}

/// Read and parse the node configuration file.
pub fn read_config(config_file: PathBuf) -> Result<Config, Error> {
	let mut file = std::fs::OpenOptions::new()
		.read(true)
		.open(config_file.as_path())?;

	let mut config = String::new();
	file.read_to_string(&mut config)?;

	Ok(toml::from_str(&config)?)
}
