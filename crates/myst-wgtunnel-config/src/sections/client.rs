// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device backend selection.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";
pub const DEFAULT_USERSPACE_BINARY: &str = "wireguard-go";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSetting {
	/// Kernel module when present, userspace otherwise.
	#[default]
	Auto,
	Kernel,
	Userspace,
}

impl FromStr for BackendSetting {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"auto" => Ok(Self::Auto),
			"kernel" => Ok(Self::Kernel),
			"userspace" => Ok(Self::Userspace),
			other => Err(ConfigError::invalid_value(
				"backend",
				format!("expected 'auto', 'kernel' or 'userspace', got '{other}'"),
			)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
	pub backend: BackendSetting,
	pub socket_dir: PathBuf,
	pub userspace_binary: String,
	/// Run `ip` and `wg` through `sudo`.
	pub sudo: bool,
}

impl Default for ClientConfig {
	fn default() -> Self {
		ClientConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfigLayer {
	#[serde(default)]
	pub backend: Option<BackendSetting>,
	#[serde(default)]
	pub socket_dir: Option<PathBuf>,
	#[serde(default)]
	pub userspace_binary: Option<String>,
	#[serde(default)]
	pub sudo: Option<bool>,
}

impl ClientConfigLayer {
	pub fn merge(&mut self, other: ClientConfigLayer) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.socket_dir.is_some() {
			self.socket_dir = other.socket_dir;
		}
		if other.userspace_binary.is_some() {
			self.userspace_binary = other.userspace_binary;
		}
		if other.sudo.is_some() {
			self.sudo = other.sudo;
		}
	}

	pub fn finalize(self) -> ClientConfig {
		ClientConfig {
			backend: self.backend.unwrap_or_default(),
			socket_dir: self
				.socket_dir
				.unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR)),
			userspace_binary: self
				.userspace_binary
				.unwrap_or_else(|| DEFAULT_USERSPACE_BINARY.to_string()),
			sudo: self.sudo.unwrap_or(false),
		}
	}
}
