//! Storage node binary entry point.

#[macro_use]
extern crate tracing;

mod cli;
mod peer;
mod server;

use clap::Parser;

use cli::{Cli, Command};

fn main() {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.expect("failed to start tokio runtime");

	let result = runtime.block_on(async move {
		match cli.command {
			Command::Server(opt) => server::run_server(opt.config_file).await,
		}
	});

	if let Err(e) = result {
		error!(error = %e, "node exited with error");
		std::process::exit(1);
	}
}
