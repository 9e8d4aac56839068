// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider session settings.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
	/// Announced to consumers. Detected from the outbound route when unset.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub public_ip: Option<IpAddr>,
	pub stats_interval_secs: u64,
	pub dns_enabled: bool,
	pub dns_port: u16,
	pub nat_enabled: bool,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		ProviderConfigLayer::default().finalize()
	}
}

impl ProviderConfig {
	pub fn stats_interval(&self) -> Duration {
		Duration::from_secs(self.stats_interval_secs)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfigLayer {
	#[serde(default)]
	pub public_ip: Option<IpAddr>,
	#[serde(default)]
	pub stats_interval_secs: Option<u64>,
	#[serde(default)]
	pub dns_enabled: Option<bool>,
	#[serde(default)]
	pub dns_port: Option<u16>,
	#[serde(default)]
	pub nat_enabled: Option<bool>,
}

impl ProviderConfigLayer {
	pub fn merge(&mut self, other: ProviderConfigLayer) {
		if other.public_ip.is_some() {
			self.public_ip = other.public_ip;
		}
		if other.stats_interval_secs.is_some() {
			self.stats_interval_secs = other.stats_interval_secs;
		}
		if other.dns_enabled.is_some() {
			self.dns_enabled = other.dns_enabled;
		}
		if other.dns_port.is_some() {
			self.dns_port = other.dns_port;
		}
		if other.nat_enabled.is_some() {
			self.nat_enabled = other.nat_enabled;
		}
	}

	pub fn finalize(self) -> ProviderConfig {
		ProviderConfig {
			public_ip: self.public_ip,
			stats_interval_secs: self.stats_interval_secs.unwrap_or(3),
			dns_enabled: self.dns_enabled.unwrap_or(false),
			dns_port: self.dns_port.unwrap_or(11253),
			nat_enabled: self.nat_enabled.unwrap_or(true),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = ProviderConfig::default();
		assert_eq!(config.public_ip, None);
		assert_eq!(config.stats_interval(), Duration::from_secs(3));
		assert!(!config.dns_enabled);
		assert_eq!(config.dns_port, 11253);
		assert!(config.nat_enabled);
	}

	#[test]
	fn test_merge_public_ip() {
		let mut layer = ProviderConfigLayer::default();
		layer.merge(ProviderConfigLayer {
			public_ip: Some("198.51.100.9".parse().unwrap()),
			..Default::default()
		});
		assert_eq!(
			layer.finalize().public_ip,
			Some("198.51.100.9".parse().unwrap())
		);
	}
}
