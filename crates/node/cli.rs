//! Command-line surface. A single `server` subcommand: node bootstrap,
//! cluster join and the other administrative operations the teacher's CLI
//! exposes are out of scope here (spec §1 Non-goals).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "corestore", about = "Distributed object storage node core")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run the storage node core against a config file.
	Server(ServerOpt),
}

#[derive(Parser, Debug)]
pub struct ServerOpt {
	/// Configuration file.
	#[arg(short = 'c', long = "config", default_value = "./config.toml")]
	pub config_file: PathBuf,
}
