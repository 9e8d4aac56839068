// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::context::NodeContext;
use clap::Args;
use console::style;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Args)]
pub struct StatsArgs {
	/// Interface to query, e.g. myst0
	pub iface: String,
}

/// Destroys WireGuard interfaces left behind by a previous run.
#[instrument(skip(ctx))]
pub async fn handle_cleanup(ctx: &NodeContext) -> anyhow::Result<()> {
	let abandoned = ctx.allocator.abandoned_interfaces()?;
	if abandoned.is_empty() {
		println!("{} No abandoned interfaces", style("✓").green().bold());
		return Ok(());
	}

	let mut failed = 0usize;
	for iface in &abandoned {
		match ctx.client.destroy_device(iface).await {
			Ok(()) => println!("{} Removed {}", style("✓").green().bold(), style(iface).cyan()),
			Err(e) => {
				failed += 1;
				warn!(%iface, error = %e, "failed to remove abandoned interface");
				println!("{} Could not remove {}: {}", style("✗").red().bold(), iface, e);
			}
		}
	}

	if failed > 0 {
		anyhow::bail!("{failed} of {} interfaces could not be removed", abandoned.len());
	}
	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_stats(args: StatsArgs, ctx: &NodeContext) -> anyhow::Result<()> {
	let stats = ctx.client.peer_stats(&args.iface).await?;

	println!("Interface: {}", style(&args.iface).cyan());
	println!("  Sent:      {} bytes", stats.bytes_sent);
	println!("  Received:  {} bytes", stats.bytes_received);
	match stats.last_handshake {
		Some(at) => println!("  Handshake: {}", at.to_rfc3339()),
		None => println!("  Handshake: {}", style("never").yellow()),
	}
	Ok(())
}
