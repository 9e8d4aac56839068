// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::WgTunnelConfigLayer;
use crate::sections::{
	BackendSetting, ClientConfigLayer, ConnectionConfigLayer, LogFormat, LoggingConfigLayer,
	PortStrategyKind, ProviderConfigLayer, ResourcesConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/myst/wgtunnel.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<WgTunnelConfigLayer, ConfigError>;
}

/// Built-in defaults. Sections finalize their own defaults, so the layer is empty.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<WgTunnelConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(WgTunnelConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<WgTunnelConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(WgTunnelConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: WgTunnelConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `MYST_WG_<SECTION>_<FIELD>`, e.g. `MYST_WG_PROVIDER_DNS_PORT`.
#[derive(Debug, Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn process() -> Self {
		Self::default()
	}

	/// Reads from the given pairs instead of the process environment.
	pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T::Err: std::fmt::Display,
	{
		match self.var(name) {
			Some(v) => v
				.parse()
				.map(Some)
				.map_err(|e| ConfigError::invalid_value(name, format!("'{v}': {e}"))),
			None => Ok(None),
		}
	}

	fn load_resources(&self) -> Result<ResourcesConfigLayer, ConfigError> {
		Ok(ResourcesConfigLayer {
			subnet: self.parsed("MYST_WG_RESOURCES_SUBNET")?,
			subnet_prefix: self.parsed("MYST_WG_RESOURCES_SUBNET_PREFIX")?,
			max_resources: self.parsed("MYST_WG_RESOURCES_MAX_RESOURCES")?,
			port_strategy: self.parsed::<PortStrategyKind>("MYST_WG_RESOURCES_PORT_STRATEGY")?,
			port_min: self.parsed("MYST_WG_RESOURCES_PORT_MIN")?,
			port_max: self.parsed("MYST_WG_RESOURCES_PORT_MAX")?,
			fixed_port: self.parsed("MYST_WG_RESOURCES_FIXED_PORT")?,
		})
	}

	fn load_client(&self) -> Result<ClientConfigLayer, ConfigError> {
		Ok(ClientConfigLayer {
			backend: self.parsed::<BackendSetting>("MYST_WG_CLIENT_BACKEND")?,
			socket_dir: self.var("MYST_WG_CLIENT_SOCKET_DIR").map(PathBuf::from),
			userspace_binary: self.var("MYST_WG_CLIENT_USERSPACE_BINARY"),
			sudo: self.bool("MYST_WG_CLIENT_SUDO"),
		})
	}

	fn load_connection(&self) -> Result<ConnectionConfigLayer, ConfigError> {
		Ok(ConnectionConfigLayer {
			handshake_timeout_secs: self.parsed("MYST_WG_CONNECTION_HANDSHAKE_TIMEOUT_SECS")?,
			handshake_poll_interval_ms: self
				.parsed("MYST_WG_CONNECTION_HANDSHAKE_POLL_INTERVAL_MS")?,
			keepalive_secs: self.parsed("MYST_WG_CONNECTION_KEEPALIVE_SECS")?,
		})
	}

	fn load_provider(&self) -> Result<ProviderConfigLayer, ConfigError> {
		Ok(ProviderConfigLayer {
			public_ip: self.parsed("MYST_WG_PROVIDER_PUBLIC_IP")?,
			stats_interval_secs: self.parsed("MYST_WG_PROVIDER_STATS_INTERVAL_SECS")?,
			dns_enabled: self.bool("MYST_WG_PROVIDER_DNS_ENABLED"),
			dns_port: self.parsed("MYST_WG_PROVIDER_DNS_PORT")?,
			nat_enabled: self.bool("MYST_WG_PROVIDER_NAT_ENABLED"),
		})
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		let format = match self.var("MYST_WG_LOGGING_FORMAT") {
			Some(v) => Some(match v.to_ascii_lowercase().as_str() {
				"json" => LogFormat::Json,
				"pretty" => LogFormat::Pretty,
				_ => {
					return Err(ConfigError::invalid_value(
						"MYST_WG_LOGGING_FORMAT",
						format!("expected 'pretty' or 'json', got '{v}'"),
					))
				}
			}),
			None => None,
		};

		Ok(LoggingConfigLayer {
			level: self.var("MYST_WG_LOGGING_LEVEL"),
			format,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<WgTunnelConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(WgTunnelConfigLayer {
			resources: Some(self.load_resources()?),
			client: Some(self.load_client()?),
			connection: Some(self.load_connection()?),
			provider: Some(self.load_provider()?),
			logging: Some(self.load_logging()?),
		})
	}
}
