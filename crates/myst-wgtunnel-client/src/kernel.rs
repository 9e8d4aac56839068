// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kernel WireGuard through the `ip` and `wg` tools.

use crate::client::{BackendKind, WgClient};
use crate::command::{self, args, CommandRunner};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use myst_wgtunnel_common::{
	parse_device_peer_stats, DeviceConfig, Peer, Stats, UserspaceDevice, UserspaceDevicePeer,
	WgPrivateKey, WgPublicKey,
};
use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Name of the throwaway link created by [`kernel_supported`].
pub const PROBE_INTERFACE: &str = "wgmystprobe";

pub struct KernelClient {
	runner: Arc<dyn CommandRunner>,
}

impl KernelClient {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self { runner }
	}

	async fn wg(&self, parts: Vec<String>) -> Result<String> {
		self.runner.run("wg", &parts).await
	}

	async fn set_private_key(&self, iface: &str, key: &WgPrivateKey, port: u16) -> Result<()> {
		let mut file = tempfile::NamedTempFile::new().map_err(ClientError::KeyFile)?;
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))
				.map_err(ClientError::KeyFile)?;
		}
		writeln!(file, "{}", key.to_base64()).map_err(ClientError::KeyFile)?;

		let path = file.path().to_string_lossy().into_owned();
		let mut parts = args(["set", iface, "private-key", path.as_str()]);
		if port != 0 {
			parts.extend(args(["listen-port", &port.to_string()]));
		}
		self.wg(parts).await?;
		Ok(())
	}

	async fn apply(&self, config: &DeviceConfig) -> Result<()> {
		let iface = config.iface_name.as_str();
		self.set_private_key(iface, &config.private_key, config.listen_port)
			.await?;

		if config.replace_peers {
			let keep = config.peer.as_ref().map(|p| p.public_key);
			for existing in self.device(iface).await?.peers {
				if Some(existing.public_key) != keep {
					self.remove_peer(iface, &existing.public_key).await?;
				}
			}
		}
		if let Some(peer) = &config.peer {
			self.add_peer(iface, peer).await?;
		}
		Ok(())
	}

	async fn device(&self, iface: &str) -> Result<UserspaceDevice> {
		let output = self.wg(args(["show", iface, "dump"])).await?;
		parse_dump(&output).ok_or_else(|| ClientError::UnexpectedOutput {
			command: format!("wg show {iface} dump"),
			output,
		})
	}
}

#[async_trait]
impl WgClient for KernelClient {
	fn backend(&self) -> BackendKind {
		BackendKind::Kernel
	}

	#[instrument(skip(self, config), fields(iface = %config.iface_name))]
	async fn configure_device(&self, config: &DeviceConfig) -> Result<()> {
		let iface = config.iface_name.as_str();
		if !command::link_exists(self.runner.as_ref(), iface).await {
			self.runner
				.run("ip", &args(["link", "add", "dev", iface, "type", "wireguard"]))
				.await?;
		}
		command::assign_address(self.runner.as_ref(), iface, &config.subnet.to_string()).await?;
		self.apply(config).await?;
		command::link_up(self.runner.as_ref(), iface).await?;
		info!("kernel device configured");
		Ok(())
	}

	#[instrument(skip(self, config), fields(iface = %config.iface_name))]
	async fn reconfigure_device(&self, config: &DeviceConfig) -> Result<()> {
		self.apply(config).await
	}

	#[instrument(skip(self))]
	async fn destroy_device(&self, iface: &str) -> Result<()> {
		command::delete_link(self.runner.as_ref(), iface).await?;
		debug!("kernel device destroyed");
		Ok(())
	}

	async fn peer_stats(&self, iface: &str) -> Result<Stats> {
		let device = self.device(iface).await?;
		Ok(parse_device_peer_stats(&device)?)
	}

	#[instrument(skip(self, peer), fields(peer = %peer.public_key))]
	async fn add_peer(&self, iface: &str, peer: &Peer) -> Result<()> {
		let key = peer.public_key.to_base64();
		let mut parts = args(["set", iface, "peer", key.as_str()]);
		if let Some(endpoint) = peer.endpoint {
			parts.extend(args(["endpoint", &endpoint.to_string()]));
		}
		parts.extend(args([
			"persistent-keepalive",
			&peer.keep_alive_period_seconds.to_string(),
		]));
		if !peer.allowed_ips.is_empty() {
			let ips: Vec<String> = peer.allowed_ips.iter().map(ToString::to_string).collect();
			parts.extend(args(["allowed-ips", &ips.join(",")]));
		}
		self.wg(parts).await?;
		Ok(())
	}

	async fn remove_peer(&self, iface: &str, public_key: &WgPublicKey) -> Result<()> {
		let key = public_key.to_base64();
		self.wg(args(["set", iface, "peer", key.as_str(), "remove"]))
			.await?;
		Ok(())
	}

	async fn configure_routes(&self, iface: &str, peer_ip: IpAddr) -> Result<()> {
		command::configure_routes(self.runner.as_ref(), iface, peer_ip).await
	}

	async fn close(&self) -> Result<()> {
		Ok(())
	}
}

/// Creates and deletes a throwaway kernel link to see whether the running
/// kernel has the WireGuard module.
pub async fn kernel_supported(runner: &dyn CommandRunner) -> bool {
	let created = runner
		.run(
			"ip",
			&args(["link", "add", "dev", PROBE_INTERFACE, "type", "wireguard"]),
		)
		.await;
	if let Err(e) = created {
		debug!(error = %e, "kernel WireGuard unavailable");
		return false;
	}
	if let Err(e) = command::delete_link(runner, PROBE_INTERFACE).await {
		warn!(error = %e, iface = PROBE_INTERFACE, "failed to delete probe interface");
	}
	true
}

/// Parses `wg show <iface> dump`.
///
/// The first line describes the device, each following line one peer.
fn parse_dump(output: &str) -> Option<UserspaceDevice> {
	let mut lines = output.lines().filter(|l| !l.trim().is_empty());
	let header: Vec<&str> = lines.next()?.split('\t').collect();
	if header.len() != 4 {
		return None;
	}

	let mut device = UserspaceDevice {
		listen_port: header[2].parse().ok()?,
		firewall_mark: parse_off(header[3])?,
		peers: Vec::new(),
	};

	for line in lines {
		let fields: Vec<&str> = line.split('\t').collect();
		if fields.len() != 8 {
			return None;
		}
		let handshake_sec: i64 = fields[4].parse().ok()?;
		device.peers.push(UserspaceDevicePeer {
			public_key: WgPublicKey::from_base64(fields[0]).ok()?,
			endpoint: parse_none(fields[2]).map(str::parse).transpose().ok()?,
			allowed_ips: parse_none(fields[3])
				.map(|ips| ips.split(',').map(str::parse).collect::<std::result::Result<Vec<_>, _>>())
				.transpose()
				.ok()?
				.unwrap_or_default(),
			last_handshake_time: if handshake_sec == 0 {
				None
			} else {
				chrono::DateTime::from_timestamp(handshake_sec, 0)
			},
			receive_bytes: fields[5].parse().ok()?,
			transmit_bytes: fields[6].parse().ok()?,
			persistent_keepalive_interval: Duration::from_secs(parse_off(fields[7])?.into()),
			protocol_version: 0,
		});
	}

	Some(device)
}

fn parse_none(field: &str) -> Option<&str> {
	(field != "(none)").then_some(field)
}

fn parse_off(field: &str) -> Option<u32> {
	if field == "off" {
		return Some(0);
	}
	field.parse().ok()
}
