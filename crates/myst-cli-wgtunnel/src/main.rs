// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use myst_wgtunnel_config::{load_config, load_config_with_file, LogFormat};

use myst_cli_wgtunnel::{
	handle_cleanup, handle_config, handle_connect, handle_keygen, handle_provide, handle_stats,
	init_tracing, ConnectArgs, KeygenArgs, NodeContext, ProvideArgs, StatsArgs,
};

/// WireGuard provider and consumer sessions
#[derive(Parser, Debug)]
#[command(name = "myst-wg", version, about, long_about = None)]
struct Args {
	/// Path to a configuration file (default: /etc/myst/wgtunnel.toml)
	#[arg(short, long, env = "MYST_WG_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Accept one consumer and serve its session until Ctrl+C
	Provide(ProvideArgs),
	/// Connect to a provider as consumer
	Connect(ConnectArgs),
	/// Remove WireGuard interfaces left behind by earlier runs
	Cleanup,
	/// Show peer statistics of an interface
	Stats(StatsArgs),
	/// Generate a WireGuard key pair
	Keygen(KeygenArgs),
	/// Print the effective configuration as TOML
	Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let mut config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	if let Some(level) = args.log_level {
		config.logging.level = level;
	}
	if args.json_logs {
		config.logging.format = LogFormat::Json;
	}
	init_tracing(&config.logging);

	match args.command {
		Command::Keygen(keygen) => handle_keygen(keygen),
		Command::Config => handle_config(&config),
		Command::Provide(provide) => handle_provide(provide, &NodeContext::build(config).await?).await,
		Command::Connect(connect) => handle_connect(connect, &NodeContext::build(config).await?).await,
		Command::Cleanup => handle_cleanup(&NodeContext::build(config).await?).await,
		Command::Stats(stats) => handle_stats(stats, &NodeContext::build(config).await?).await,
	}
}
