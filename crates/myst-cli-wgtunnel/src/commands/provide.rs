// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::commands::read_input;
use crate::context::NodeContext;
use clap::Args;
use console::style;
use myst_wgtunnel_session::{
	BroadcastPublisher, EventPublisher, IpResolver, IptablesNat, Manager, ManagerOptions,
	NatService, NoopNat, OutboundIpResolver, SessionEvent, SessionId, StaticIpResolver,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Args)]
pub struct ProvideArgs {
	/// Consumer config JSON file, `-` or omitted for stdin
	#[arg(long, short = 'c')]
	pub consumer_config: Option<PathBuf>,

	/// Address announced to the consumer (overrides config)
	#[arg(long)]
	pub public_ip: Option<IpAddr>,

	/// Hand the consumer the tunnel address as DNS server (overrides config)
	#[arg(long)]
	pub dns: bool,
}

#[instrument(skip(ctx))]
pub async fn handle_provide(args: ProvideArgs, ctx: &NodeContext) -> anyhow::Result<()> {
	let provider = &ctx.config.provider;

	let resolver: Arc<dyn IpResolver> = match args.public_ip.or(provider.public_ip) {
		Some(ip) => Arc::new(StaticIpResolver(ip)),
		None => Arc::new(OutboundIpResolver::default()),
	};
	let nat: Arc<dyn NatService> = if provider.nat_enabled {
		Arc::new(IptablesNat::new(Arc::clone(&ctx.runner)))
	} else {
		Arc::new(NoopNat)
	};
	let events = BroadcastPublisher::new();
	let mut rx = events.subscribe();
	let publisher: Arc<dyn EventPublisher> = Arc::new(events);

	let manager = Manager::new(
		Arc::clone(&ctx.allocator),
		Arc::clone(&ctx.client),
		resolver,
		nat,
		publisher,
		ManagerOptions {
			dns_enabled: args.dns || provider.dns_enabled,
			dns_port: provider.dns_port,
			stats_interval: provider.stats_interval(),
		},
	);

	let consumer_config = read_input(args.consumer_config.as_deref()).await?;
	let session_id = SessionId::new();
	let service_config = manager.provide_config(session_id, &consumer_config).await?;
	info!(%session_id, endpoint = %service_config.provider.endpoint, "session started");

	println!("{}", serde_json::to_string_pretty(&service_config)?);
	eprintln!("{} Session {} started", style("✓").green().bold(), style(session_id).cyan());
	eprintln!("  Endpoint:    {}", style(service_config.provider.endpoint).cyan());
	eprintln!("  Consumer IP: {}", style(service_config.consumer.ip_address).cyan());
	eprintln!("\nPress Ctrl+C to stop...");

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				eprintln!("\n{} Shutting down...", style("→").yellow());
				break;
			}
			event = rx.recv() => match event {
				Ok(SessionEvent::DataTransferred { bytes_sent, bytes_received, .. }) => {
					eprintln!(
						"  {} sent {} B, received {} B",
						style("↕").dim(),
						bytes_sent,
						bytes_received
					);
				}
				Ok(_) => {}
				Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed session events"),
				Err(RecvError::Closed) => break,
			},
		}
	}

	manager.stop().await;
	if let Err(e) = ctx.client.close().await {
		warn!(error = %e, "failed to close WireGuard client");
	}
	eprintln!("{} Session stopped", style("✓").green().bold());
	Ok(())
}
