// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interface, subnet and port pool configuration.

use crate::error::ConfigError;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const DEFAULT_SUBNET_PREFIX: u8 = 24;
pub const DEFAULT_MAX_RESOURCES: usize = 256;
pub const DEFAULT_PORT_MIN: u16 = 52820;
pub const DEFAULT_PORT_MAX: u16 = 53075;
pub const DEFAULT_FIXED_PORT: u16 = 51820;

pub fn default_subnet() -> Ipv4Net {
	Ipv4Net::new(Ipv4Addr::new(10, 182, 0, 0), 16).unwrap_or_default()
}

/// How provider listen ports are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStrategyKind {
	/// Any free port from `port_min..=port_max`.
	#[default]
	Pool,
	/// Always `fixed_port`, one provider session at a time.
	Fixed,
}

impl FromStr for PortStrategyKind {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pool" | "range" => Ok(Self::Pool),
			"fixed" => Ok(Self::Fixed),
			other => Err(ConfigError::invalid_value(
				"port_strategy",
				format!("expected 'pool' or 'fixed', got '{other}'"),
			)),
		}
	}
}

impl fmt::Display for PortStrategyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Pool => f.write_str("pool"),
			Self::Fixed => f.write_str("fixed"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcesConfig {
	pub subnet: Ipv4Net,
	pub subnet_prefix: u8,
	pub max_resources: usize,
	pub port_strategy: PortStrategyKind,
	pub port_min: u16,
	pub port_max: u16,
	pub fixed_port: u16,
}

impl Default for ResourcesConfig {
	fn default() -> Self {
		ResourcesConfigLayer::default().finalize()
	}
}

impl ResourcesConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.subnet.prefix_len() > 16 {
			return Err(ConfigError::validation(format!(
				"resources.subnet {} must have a prefix of /16 or shorter",
				self.subnet
			)));
		}
		if !(24..=25).contains(&self.subnet_prefix) {
			return Err(ConfigError::validation(format!(
				"resources.subnet_prefix must be 24 or 25, got {}",
				self.subnet_prefix
			)));
		}
		if !(1..=DEFAULT_MAX_RESOURCES).contains(&self.max_resources) {
			return Err(ConfigError::validation(format!(
				"resources.max_resources must be within 1..=256, got {}",
				self.max_resources
			)));
		}
		if self.port_strategy == PortStrategyKind::Pool && self.port_min >= self.port_max {
			return Err(ConfigError::validation(format!(
				"resources.port_min ({}) must be lower than resources.port_max ({})",
				self.port_min, self.port_max
			)));
		}
		if self.port_strategy == PortStrategyKind::Fixed && self.fixed_port == 0 {
			return Err(ConfigError::validation("resources.fixed_port must not be 0"));
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourcesConfigLayer {
	#[serde(default)]
	pub subnet: Option<Ipv4Net>,
	#[serde(default)]
	pub subnet_prefix: Option<u8>,
	#[serde(default)]
	pub max_resources: Option<usize>,
	#[serde(default)]
	pub port_strategy: Option<PortStrategyKind>,
	#[serde(default)]
	pub port_min: Option<u16>,
	#[serde(default)]
	pub port_max: Option<u16>,
	#[serde(default)]
	pub fixed_port: Option<u16>,
}

impl ResourcesConfigLayer {
	pub fn merge(&mut self, other: ResourcesConfigLayer) {
		if other.subnet.is_some() {
			self.subnet = other.subnet;
		}
		if other.subnet_prefix.is_some() {
			self.subnet_prefix = other.subnet_prefix;
		}
		if other.max_resources.is_some() {
			self.max_resources = other.max_resources;
		}
		if other.port_strategy.is_some() {
			self.port_strategy = other.port_strategy;
		}
		if other.port_min.is_some() {
			self.port_min = other.port_min;
		}
		if other.port_max.is_some() {
			self.port_max = other.port_max;
		}
		if other.fixed_port.is_some() {
			self.fixed_port = other.fixed_port;
		}
	}

	pub fn finalize(self) -> ResourcesConfig {
		ResourcesConfig {
			subnet: self.subnet.unwrap_or_else(default_subnet),
			subnet_prefix: self.subnet_prefix.unwrap_or(DEFAULT_SUBNET_PREFIX),
			max_resources: self.max_resources.unwrap_or(DEFAULT_MAX_RESOURCES),
			port_strategy: self.port_strategy.unwrap_or_default(),
			port_min: self.port_min.unwrap_or(DEFAULT_PORT_MIN),
			port_max: self.port_max.unwrap_or(DEFAULT_PORT_MAX),
			fixed_port: self.fixed_port.unwrap_or(DEFAULT_FIXED_PORT),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_defaults() {
		let config = ResourcesConfig::default();
		assert_eq!(config.subnet.to_string(), "10.182.0.0/16");
		assert_eq!(config.subnet_prefix, 24);
		assert_eq!(config.max_resources, 256);
		assert_eq!(config.port_strategy, PortStrategyKind::Pool);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = ResourcesConfigLayer {
			port_min: Some(40000),
			port_max: Some(40100),
			..Default::default()
		};
		base.merge(ResourcesConfigLayer {
			port_max: Some(40200),
			..Default::default()
		});
		assert_eq!(base.port_min, Some(40000));
		assert_eq!(base.port_max, Some(40200));
	}

	#[test]
	fn test_subnet_must_be_wide_enough() {
		let config = ResourcesConfigLayer {
			subnet: Some("10.182.0.0/20".parse().unwrap()),
			..Default::default()
		}
		.finalize();
		assert!(config.validate().unwrap_err().to_string().contains("/16"));
	}

	#[test]
	fn test_fixed_strategy_ignores_pool_bounds() {
		let config = ResourcesConfigLayer {
			port_strategy: Some(PortStrategyKind::Fixed),
			port_min: Some(60000),
			port_max: Some(50000),
			..Default::default()
		}
		.finalize();
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_strategy_from_str() {
		assert_eq!("Fixed".parse::<PortStrategyKind>().unwrap(), PortStrategyKind::Fixed);
		assert_eq!("range".parse::<PortStrategyKind>().unwrap(), PortStrategyKind::Pool);
		assert!("random".parse::<PortStrategyKind>().is_err());
	}

	proptest! {
		#[test]
		fn prop_subnet_prefix_bounds(prefix in 0u8..=32) {
			let config = ResourcesConfigLayer {
				subnet_prefix: Some(prefix),
				..Default::default()
			}
			.finalize();
			prop_assert_eq!(config.validate().is_ok(), prefix == 24 || prefix == 25);
		}

		#[test]
		fn prop_port_range_ordering(min in 1u16..=u16::MAX, max in 1u16..=u16::MAX) {
			let config = ResourcesConfigLayer {
				port_min: Some(min),
				port_max: Some(max),
				..Default::default()
			}
			.finalize();
			prop_assert_eq!(config.validate().is_ok(), min < max);
		}
	}
}
