// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl FromStr for SessionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s).map(Self)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
	SessionStarted {
		session_id: SessionId,
		iface: String,
	},
	/// Cumulative counters of the session peer.
	DataTransferred {
		session_id: SessionId,
		bytes_sent: u64,
		bytes_received: u64,
	},
	SessionEnded {
		session_id: SessionId,
	},
}

/// Fire-and-forget sink for session events.
pub trait EventPublisher: Send + Sync {
	fn publish(&self, event: SessionEvent);
}

/// Fans events out to any number of subscribers. Events published while
/// nobody listens are dropped.
#[derive(Clone)]
pub struct BroadcastPublisher {
	tx: broadcast::Sender<SessionEvent>,
}

impl Default for BroadcastPublisher {
	fn default() -> Self {
		Self::new()
	}
}

impl BroadcastPublisher {
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.tx.subscribe()
	}
}

impl EventPublisher for BroadcastPublisher {
	fn publish(&self, event: SessionEvent) {
		debug!(?event, "publishing session event");
		let _ = self.tx.send(event);
	}
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
	fn publish(&self, event: SessionEvent) {
		match &event {
			SessionEvent::DataTransferred {
				session_id,
				bytes_sent,
				bytes_received,
			} => info!(%session_id, bytes_sent, bytes_received, "data transferred"),
			SessionEvent::SessionStarted { session_id, iface } => {
				info!(%session_id, %iface, "session started")
			}
			SessionEvent::SessionEnded { session_id } => info!(%session_id, "session ended"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn data_transferred_serializes_with_type_tag() {
		let id: SessionId = "7f1c6c1e-3c4f-4f3e-9d55-0c9d3c2f8a11".parse().unwrap();
		let event = SessionEvent::DataTransferred {
			session_id: id,
			bytes_sent: 10,
			bytes_received: 11,
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "data_transferred");
		assert_eq!(json["session_id"], "7f1c6c1e-3c4f-4f3e-9d55-0c9d3c2f8a11");
		assert_eq!(json["bytes_sent"], 10);
	}

	#[tokio::test]
	async fn broadcast_reaches_subscribers() {
		let publisher = BroadcastPublisher::new();
		let mut rx = publisher.subscribe();
		let id = SessionId::new();

		publisher.publish(SessionEvent::SessionEnded { session_id: id });

		assert_eq!(
			rx.recv().await.unwrap(),
			SessionEvent::SessionEnded { session_id: id }
		);
	}

	#[test]
	fn publish_without_subscribers_is_dropped() {
		BroadcastPublisher::new().publish(SessionEvent::SessionEnded {
			session_id: SessionId::new(),
		});
	}
}
