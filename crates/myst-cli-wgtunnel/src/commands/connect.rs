// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::commands::read_input;
use crate::context::NodeContext;
use clap::Args;
use console::style;
use myst_wgtunnel_endpoint::PollingHandshakeWaiter;
use myst_wgtunnel_session::{Connection, ConnectionOptions, ConnectionState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Args)]
pub struct ConnectArgs {
	/// Service config JSON file from the provider, `-` or omitted for stdin
	#[arg(long, short = 's')]
	pub service_config: Option<PathBuf>,

	/// Ports offered to the provider (repeatable)
	#[arg(long = "port")]
	pub ports: Vec<u16>,

	/// Seconds between traffic reports, 0 to disable
	#[arg(long, default_value_t = 10)]
	pub stats_every: u64,
}

fn state_label(state: ConnectionState) -> console::StyledObject<&'static str> {
	match state {
		ConnectionState::Connecting => style("connecting").yellow(),
		ConnectionState::Connected => style("connected").green().bold(),
		ConnectionState::Disconnecting => style("disconnecting").yellow(),
		ConnectionState::NotConnected => style("not connected").dim(),
	}
}

async fn print_states(mut states: mpsc::Receiver<ConnectionState>) {
	while let Some(state) = states.recv().await {
		eprintln!("{} {}", style("→").dim(), state_label(state));
	}
}

#[instrument(skip(ctx))]
pub async fn handle_connect(args: ConnectArgs, ctx: &NodeContext) -> anyhow::Result<()> {
	let settings = &ctx.config.connection;
	let conn = Arc::new(
		Connection::new(
			Arc::clone(&ctx.allocator),
			Arc::clone(&ctx.client),
			Arc::new(PollingHandshakeWaiter::new(settings.handshake_poll_interval())),
			ConnectionOptions {
				handshake_timeout: settings.handshake_timeout(),
				keepalive_secs: settings.keepalive_secs,
			},
		)
		.with_ports(args.ports.clone()),
	);

	// The provider needs our public key before it can hand out a service config.
	println!("{}", serde_json::to_string(&conn.get_config())?);
	if args.service_config.is_none() {
		eprintln!("Paste the provider's service config, then close stdin (Ctrl+D)...");
	}
	let service_config = read_input(args.service_config.as_deref()).await?;

	let printer = conn
		.state_receiver()
		.map(|states| tokio::spawn(print_states(states)));

	let start = conn.start(&service_config);
	tokio::pin!(start);
	let started = tokio::select! {
		result = &mut start => result,
		_ = tokio::signal::ctrl_c() => {
			eprintln!("\n{} Cancelling...", style("→").yellow());
			let (_, result) = tokio::join!(conn.stop(), &mut start);
			result
		}
	};

	match started {
		Ok(()) => {
			if let Some(iface) = conn.interface_name() {
				eprintln!("{} Tunnel up on {}", style("✓").green().bold(), style(iface).cyan());
			}
			eprintln!("\nPress Ctrl+C to disconnect...");
			run_until_interrupted(&conn, args.stats_every).await;
			conn.stop().await;
		}
		Err(e) if e.is_cancelled() => {}
		Err(e) => {
			if let Some(printer) = printer {
				let _ = printer.await;
			}
			if e.is_handshake_timeout() {
				anyhow::bail!("provider did not answer the handshake: {e}");
			}
			return Err(e.into());
		}
	}

	if let Some(printer) = printer {
		let _ = printer.await;
	}
	if let Err(e) = ctx.client.close().await {
		warn!(error = %e, "failed to close WireGuard client");
	}
	eprintln!("{} Disconnected", style("✓").green().bold());
	Ok(())
}

async fn run_until_interrupted(conn: &Connection, stats_every: u64) {
	let mut ticker = (stats_every > 0)
		.then(|| tokio::time::interval(Duration::from_secs(stats_every)));

	loop {
		let tick = async {
			match ticker.as_mut() {
				Some(ticker) => {
					ticker.tick().await;
				}
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				eprintln!("\n{} Disconnecting...", style("→").yellow());
				return;
			}
			_ = conn.wait() => return,
			_ = tick => match conn.statistics().await {
				Ok(stats) => eprintln!(
					"  {} sent {} B, received {} B",
					style("↕").dim(),
					stats.bytes_sent,
					stats.bytes_received
				),
				Err(e) => warn!(error = %e, "failed to read connection statistics"),
			},
		}
	}
}
