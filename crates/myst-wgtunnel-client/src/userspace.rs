// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Userspace WireGuard driven over its UAPI control socket.

use crate::client::{BackendKind, WgClient};
use crate::command::{self, args, CommandRunner};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use myst_wgtunnel_common::{
	encode_peer_removal, parse_device_peer_stats, parse_userspace_device, DeviceConfig, Peer,
	Stats, UserspaceDevice, WgPublicKey,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";
pub const DEFAULT_BINARY: &str = "wireguard-go";
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(5);

const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct UserspaceClient {
	runner: Arc<dyn CommandRunner>,
	socket_dir: PathBuf,
	binary: String,
	start_timeout: Duration,
}

impl UserspaceClient {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self {
			runner,
			socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
			binary: DEFAULT_BINARY.to_string(),
			start_timeout: DEFAULT_START_TIMEOUT,
		}
	}

	pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.socket_dir = dir.into();
		self
	}

	pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
		self.binary = binary.into();
		self
	}

	pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
		self.start_timeout = timeout;
		self
	}

	pub fn socket_path(&self, iface: &str) -> PathBuf {
		self.socket_dir.join(format!("{iface}.sock"))
	}

	async fn start_device(&self, iface: &str) -> Result<()> {
		let socket = self.socket_path(iface);
		if socket.exists() {
			debug!(socket = %socket.display(), "userspace device already running");
			return Ok(());
		}

		self.runner.run(&self.binary, &args([iface])).await?;

		let deadline = tokio::time::Instant::now() + self.start_timeout;
		while !socket.exists() {
			if tokio::time::Instant::now() >= deadline {
				return Err(ClientError::DeviceStartTimeout(iface.to_string()));
			}
			tokio::time::sleep(SOCKET_POLL_INTERVAL).await;
		}
		info!(socket = %socket.display(), "userspace device started");
		Ok(())
	}

	async fn set(&self, iface: &str, body: &str) -> Result<()> {
		let response = uapi_exchange(&self.socket_path(iface), &format!("set=1\n{body}\n")).await?;
		parse_userspace_device(&response)?;
		Ok(())
	}

	async fn get(&self, iface: &str) -> Result<UserspaceDevice> {
		let response = uapi_exchange(&self.socket_path(iface), "get=1\n\n").await?;
		Ok(parse_userspace_device(&response)?)
	}
}

/// Sends one request and reads the reply up to its terminating blank line.
async fn uapi_exchange(path: &Path, request: &str) -> Result<String> {
	let socket_err = |source| ClientError::Socket {
		path: path.to_path_buf(),
		source,
	};

	let mut stream = UnixStream::connect(path).await.map_err(socket_err)?;
	stream
		.write_all(request.as_bytes())
		.await
		.map_err(socket_err)?;

	let mut reader = BufReader::new(stream);
	let mut response = String::new();
	loop {
		let mut line = String::new();
		let read = reader.read_line(&mut line).await.map_err(socket_err)?;
		if read == 0 || line == "\n" {
			break;
		}
		response.push_str(&line);
	}
	Ok(response)
}

#[async_trait]
impl WgClient for UserspaceClient {
	fn backend(&self) -> BackendKind {
		BackendKind::Userspace
	}

	#[instrument(skip(self, config), fields(iface = %config.iface_name))]
	async fn configure_device(&self, config: &DeviceConfig) -> Result<()> {
		let iface = config.iface_name.as_str();
		self.start_device(iface).await?;
		command::assign_address(self.runner.as_ref(), iface, &config.subnet.to_string()).await?;
		self.set(iface, &config.encode()).await?;
		command::link_up(self.runner.as_ref(), iface).await?;
		info!("userspace device configured");
		Ok(())
	}

	#[instrument(skip(self, config), fields(iface = %config.iface_name))]
	async fn reconfigure_device(&self, config: &DeviceConfig) -> Result<()> {
		self.set(&config.iface_name, &config.encode()).await
	}

	#[instrument(skip(self))]
	async fn destroy_device(&self, iface: &str) -> Result<()> {
		command::delete_link(self.runner.as_ref(), iface).await?;
		match tokio::fs::remove_file(self.socket_path(iface)).await {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => warn!(error = %e, "failed to remove UAPI socket"),
		}
		debug!("userspace device destroyed");
		Ok(())
	}

	async fn peer_stats(&self, iface: &str) -> Result<Stats> {
		let device = self.get(iface).await?;
		Ok(parse_device_peer_stats(&device)?)
	}

	async fn add_peer(&self, iface: &str, peer: &Peer) -> Result<()> {
		self.set(iface, &peer.encode()).await
	}

	async fn remove_peer(&self, iface: &str, public_key: &WgPublicKey) -> Result<()> {
		self.set(iface, &encode_peer_removal(public_key)).await
	}

	async fn configure_routes(&self, iface: &str, peer_ip: IpAddr) -> Result<()> {
		command::configure_routes(self.runner.as_ref(), iface, peer_ip).await
	}

	async fn close(&self) -> Result<()> {
		Ok(())
	}
}
