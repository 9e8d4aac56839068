// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Waiting for the first WireGuard handshake of a freshly configured device.

use crate::error::HandshakeError;
use crate::stats::StatsSupplier;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// UDP discard service; the probe datagram only has to be queued.
const PROBE_PORT: u16 = 9;

#[async_trait]
pub trait HandshakeWaiter: Send + Sync {
	/// Resolves once the peer reports a handshake.
	///
	/// `probe` is an address behind the tunnel. A datagram is sent there
	/// first, since WireGuard only initiates a handshake when it has
	/// something to send.
	async fn wait(
		&self,
		stats: &dyn StatsSupplier,
		probe: Option<IpAddr>,
		timeout: Duration,
		cancel: &CancellationToken,
	) -> Result<(), HandshakeError>;
}

#[derive(Debug, Clone)]
pub struct PollingHandshakeWaiter {
	poll_interval: Duration,
}

impl Default for PollingHandshakeWaiter {
	fn default() -> Self {
		Self::new(DEFAULT_POLL_INTERVAL)
	}
}

impl PollingHandshakeWaiter {
	pub fn new(poll_interval: Duration) -> Self {
		Self { poll_interval }
	}
}

#[async_trait]
impl HandshakeWaiter for PollingHandshakeWaiter {
	#[instrument(skip(self, stats, cancel))]
	async fn wait(
		&self,
		stats: &dyn StatsSupplier,
		probe: Option<IpAddr>,
		timeout: Duration,
		cancel: &CancellationToken,
	) -> Result<(), HandshakeError> {
		if let Some(ip) = probe {
			if let Err(e) = send_probe(ip).await {
				warn!(%ip, error = %e, "failed to send handshake probe");
			}
		}

		let deadline = tokio::time::sleep(timeout);
		tokio::pin!(deadline);
		let mut ticker = tokio::time::interval(self.poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				biased;

				_ = cancel.cancelled() => return Err(HandshakeError::Cancelled),
				_ = &mut deadline => return Err(HandshakeError::Timeout(timeout)),
				_ = ticker.tick() => {
					let current = stats.peer_stats().await.map_err(HandshakeError::Stats)?;
					if current.has_handshake() {
						debug!(last_handshake = ?current.last_handshake, "handshake observed");
						return Ok(());
					}
				}
			}
		}
	}
}

async fn send_probe(ip: IpAddr) -> std::io::Result<()> {
	let bind: SocketAddr = match ip {
		IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
		IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
	};
	let socket = UdpSocket::bind(bind).await?;
	socket.send_to(&[0], (ip, PROBE_PORT)).await?;
	Ok(())
}
