// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::events::{EventPublisher, SessionEvent, SessionId};
use myst_wgtunnel_endpoint::StatsSupplier;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(3);

/// Periodically publishes the transfer counters of one session.
pub struct StatsPublisher {
	publisher: Arc<dyn EventPublisher>,
	interval: Duration,
	cancel: CancellationToken,
}

impl StatsPublisher {
	pub fn new(publisher: Arc<dyn EventPublisher>, interval: Duration) -> Self {
		Self {
			publisher,
			interval,
			cancel: CancellationToken::new(),
		}
	}

	pub fn start(&self, session_id: SessionId, stats: Arc<dyn StatsSupplier>) -> JoinHandle<()> {
		let publisher = Arc::clone(&self.publisher);
		let cancel = self.cancel.clone();
		let period = self.interval;

		tokio::spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				tokio::select! {
					biased;

					_ = cancel.cancelled() => {
						debug!(%session_id, "stats publisher stopped");
						break;
					}
					_ = ticker.tick() => {
						match stats.peer_stats().await {
							Ok(current) => publisher.publish(SessionEvent::DataTransferred {
								session_id,
								bytes_sent: current.bytes_sent,
								bytes_received: current.bytes_received,
							}),
							Err(e) => warn!(%session_id, error = %e, "failed to get peer stats"),
						}
					}
				}
			}
		})
	}

	/// Safe to call any number of times.
	pub fn stop(&self) {
		self.cancel.cancel();
	}
}
