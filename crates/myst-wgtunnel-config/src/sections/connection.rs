// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer connection timing.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionConfig {
	pub handshake_timeout_secs: u64,
	pub handshake_poll_interval_ms: u64,
	pub keepalive_secs: u32,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		ConnectionConfigLayer::default().finalize()
	}
}

impl ConnectionConfig {
	pub fn handshake_timeout(&self) -> Duration {
		Duration::from_secs(self.handshake_timeout_secs)
	}

	pub fn handshake_poll_interval(&self) -> Duration {
		Duration::from_millis(self.handshake_poll_interval_ms)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfigLayer {
	#[serde(default)]
	pub handshake_timeout_secs: Option<u64>,
	#[serde(default)]
	pub handshake_poll_interval_ms: Option<u64>,
	#[serde(default)]
	pub keepalive_secs: Option<u32>,
}

impl ConnectionConfigLayer {
	pub fn merge(&mut self, other: ConnectionConfigLayer) {
		if other.handshake_timeout_secs.is_some() {
			self.handshake_timeout_secs = other.handshake_timeout_secs;
		}
		if other.handshake_poll_interval_ms.is_some() {
			self.handshake_poll_interval_ms = other.handshake_poll_interval_ms;
		}
		if other.keepalive_secs.is_some() {
			self.keepalive_secs = other.keepalive_secs;
		}
	}

	pub fn finalize(self) -> ConnectionConfig {
		ConnectionConfig {
			handshake_timeout_secs: self.handshake_timeout_secs.unwrap_or(30),
			handshake_poll_interval_ms: self.handshake_poll_interval_ms.unwrap_or(100),
			keepalive_secs: self.keepalive_secs.unwrap_or(18),
		}
	}
}
