// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the WireGuard tunnel node.
//!
//! Layered from built-in defaults, a TOML file (`/etc/myst/wgtunnel.toml`)
//! and `MYST_WG_*` environment variables, later sources overriding earlier
//! ones field by field.
//!
//! ```ignore
//! let config = myst_wgtunnel_config::load_config()?;
//! println!("leasing subnets from {}", config.resources.subnet);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::WgTunnelConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WgTunnelConfig {
	pub resources: ResourcesConfig,
	pub client: ClientConfig,
	pub connection: ConnectionConfig,
	pub provider: ProviderConfig,
	pub logging: LoggingConfig,
}

impl WgTunnelConfig {
	pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
		toml::to_string_pretty(self)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`MYST_WG_*`)
/// 2. Config file (`/etc/myst/wgtunnel.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<WgTunnelConfig, ConfigError> {
	load_config_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::process()),
	])
}

/// Like [`load_config`] with a different config file.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<WgTunnelConfig, ConfigError> {
	load_config_from(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::process()),
	])
}

pub fn load_config_from(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<WgTunnelConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = WgTunnelConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: WgTunnelConfigLayer) -> Result<WgTunnelConfig, ConfigError> {
	let config = WgTunnelConfig {
		resources: layer.resources.unwrap_or_default().finalize(),
		client: layer.client.unwrap_or_default().finalize(),
		connection: layer.connection.unwrap_or_default().finalize(),
		provider: layer.provider.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	config.resources.validate()?;
	if config.connection.handshake_poll_interval_ms == 0 {
		return Err(ConfigError::validation(
			"connection.handshake_poll_interval_ms must be greater than 0",
		));
	}
	if config.provider.stats_interval_secs == 0 {
		return Err(ConfigError::validation(
			"provider.stats_interval_secs must be greater than 0",
		));
	}

	info!(
		subnet = %config.resources.subnet,
		port_strategy = %config.resources.port_strategy,
		backend = ?config.client.backend,
		dns_enabled = config.provider.dns_enabled,
		nat_enabled = config.provider.nat_enabled,
		"configuration loaded"
	);

	Ok(config)
}
