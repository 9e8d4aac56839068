// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::Result;
use async_trait::async_trait;
use myst_wgtunnel_common::{DeviceConfig, Peer, Stats, WgPublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
	Kernel,
	Userspace,
}

impl fmt::Display for BackendKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackendKind::Kernel => write!(f, "kernel"),
			BackendKind::Userspace => write!(f, "userspace"),
		}
	}
}

/// Control surface of a WireGuard implementation.
///
/// One client is shared by every connection endpoint of the process; all
/// methods address a device by interface name.
#[async_trait]
pub trait WgClient: Send + Sync {
	fn backend(&self) -> BackendKind;

	/// Creates the device if needed, assigns its address and applies the config.
	async fn configure_device(&self, config: &DeviceConfig) -> Result<()>;

	/// Re-applies a config to an existing device.
	async fn reconfigure_device(&self, config: &DeviceConfig) -> Result<()>;

	async fn destroy_device(&self, iface: &str) -> Result<()>;

	/// Stats of the single peer configured on `iface`.
	async fn peer_stats(&self, iface: &str) -> Result<Stats>;

	async fn add_peer(&self, iface: &str, peer: &Peer) -> Result<()>;

	async fn remove_peer(&self, iface: &str, public_key: &WgPublicKey) -> Result<()>;

	async fn configure_routes(&self, iface: &str, peer_ip: IpAddr) -> Result<()>;

	async fn close(&self) -> Result<()>;
}
