// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One side of a WireGuard tunnel and the resources it holds.

use crate::error::{EndpointError, Result};
use ipnet::{IpNet, Ipv4Net};
use myst_wgtunnel_client::WgClient;
use myst_wgtunnel_common::{
	ConsumerNetConfig, DeviceConfig, Peer, ProviderConfig, ServiceConfig, Stats, WgPrivateKey,
	WgPublicKey,
};
use myst_wgtunnel_resources::{Allocator, ResourceError};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
	Idle,
	Starting,
	Running,
	Stopping,
	Stopped,
}

impl fmt::Display for EndpointState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EndpointState::Idle => "idle",
			EndpointState::Starting => "starting",
			EndpointState::Running => "running",
			EndpointState::Stopping => "stopping",
			EndpointState::Stopped => "stopped",
		};
		f.write_str(s)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointMode {
	Consumer,
	Provider,
}

#[derive(Debug, Clone)]
pub struct ConsumerModeConfig {
	pub private_key: WgPrivateKey,
	/// Tunnel address of this consumer, host part included.
	pub ip_address: IpNet,
	/// Zero lets the device pick an ephemeral port.
	pub listen_port: u16,
	pub peer: Option<Peer>,
}

impl ConsumerModeConfig {
	pub fn new(private_key: WgPrivateKey, ip_address: IpNet) -> Self {
		Self {
			private_key,
			ip_address,
			listen_port: 0,
			peer: None,
		}
	}

	pub fn with_listen_port(mut self, port: u16) -> Self {
		self.listen_port = port;
		self
	}

	pub fn with_peer(mut self, peer: Peer) -> Self {
		self.peer = Some(peer);
		self
	}
}

/// Inputs decided by the service and NAT layer, not by the allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderModeConfig {
	pub public_ip: Option<IpAddr>,
	/// A port leased from the shared allocator. The endpoint releases it on stop.
	pub listen_port: Option<u16>,
}

/// Resources acquired so far, in acquisition order.
#[derive(Debug, Default)]
struct Leases {
	iface: Option<String>,
	ipnet: Option<Ipv4Net>,
	port: Option<u16>,
	device: bool,
}

/// Owns the interface, subnet and port leased for one tunnel.
///
/// Operations are expected from a single owner in lifecycle order. [`stop`]
/// unwinds whatever was acquired and can be called any number of times.
///
/// [`stop`]: ConnectionEndpoint::stop
pub struct ConnectionEndpoint {
	allocator: Arc<Allocator>,
	client: Arc<dyn WgClient>,
	state: EndpointState,
	mode: Option<EndpointMode>,
	leases: Leases,
	device: Option<DeviceConfig>,
	endpoint: Option<SocketAddr>,
}

impl ConnectionEndpoint {
	pub fn new(allocator: Arc<Allocator>, client: Arc<dyn WgClient>) -> Self {
		Self {
			allocator,
			client,
			state: EndpointState::Idle,
			mode: None,
			leases: Leases::default(),
			device: None,
			endpoint: None,
		}
	}

	pub fn state(&self) -> EndpointState {
		self.state
	}

	pub fn mode(&self) -> Option<EndpointMode> {
		self.mode
	}

	pub fn interface_name(&self) -> Option<&str> {
		self.device.as_ref().map(|d| d.iface_name.as_str())
	}

	#[instrument(skip(self, config), fields(ip = %config.ip_address))]
	pub async fn start_consumer_mode(&mut self, config: ConsumerModeConfig) -> Result<()> {
		self.begin_start("start consumer mode", EndpointMode::Consumer)?;
		let result = self.start_consumer(config).await;
		self.finish_start(result).await
	}

	async fn start_consumer(&mut self, config: ConsumerModeConfig) -> Result<()> {
		self.clean_abandoned_interfaces().await?;

		let iface = self.allocator.allocate_interface()?;
		debug!(%iface, "allocated interface");
		self.leases.iface = Some(iface.clone());

		let mut device = DeviceConfig::new(iface, config.ip_address, config.private_key)
			.with_listen_port(config.listen_port);
		device.peer = config.peer;

		self.configure(device).await
	}

	/// Re-applies the device on the interface this endpoint already holds,
	/// replacing whatever peers it had.
	#[instrument(skip(self, config))]
	pub async fn reconfigure_consumer_mode(&mut self, config: ConsumerModeConfig) -> Result<()> {
		self.require_running("reconfigure consumer mode")?;
		if self.mode != Some(EndpointMode::Consumer) {
			return Err(EndpointError::InvalidState {
				operation: "reconfigure a provider endpoint",
				state: self.state,
			});
		}
		let iface = self.interface_name().unwrap_or_default().to_string();

		let mut device = DeviceConfig::new(iface, config.ip_address, config.private_key)
			.with_listen_port(config.listen_port)
			.with_replace_peers(true);
		device.peer = config.peer;

		self.client.reconfigure_device(&device).await?;
		self.device = Some(device);
		info!("consumer endpoint reconfigured");
		Ok(())
	}

	#[instrument(skip(self, config), fields(public_ip = ?config.public_ip, port = ?config.listen_port))]
	pub async fn start_provider_mode(&mut self, config: ProviderModeConfig) -> Result<()> {
		let public_ip = config
			.public_ip
			.ok_or(EndpointError::MissingRequiredField("public_ip"))?;
		let listen_port = config
			.listen_port
			.filter(|port| *port != 0)
			.ok_or(EndpointError::MissingRequiredField("listen_port"))?;

		self.begin_start("start provider mode", EndpointMode::Provider)?;
		self.leases.port = Some(listen_port);
		let result = self.start_provider(public_ip, listen_port).await;
		self.finish_start(result).await
	}

	async fn start_provider(&mut self, public_ip: IpAddr, listen_port: u16) -> Result<()> {
		self.clean_abandoned_interfaces().await?;

		let iface = self.allocator.allocate_interface()?;
		debug!(%iface, "allocated interface");
		self.leases.iface = Some(iface.clone());

		let private_key = WgPrivateKey::generate();

		let subnet = self.allocator.allocate_ipnet()?;
		debug!(%subnet, "allocated subnet");
		self.leases.ipnet = Some(subnet);

		self.endpoint = Some(SocketAddr::new(public_ip, listen_port));
		let device = DeviceConfig::new(iface, host_address(subnet, 1).into(), private_key)
			.with_listen_port(listen_port);

		self.configure(device).await
	}

	async fn configure(&mut self, device: DeviceConfig) -> Result<()> {
		self.leases.device = true;
		self.client.configure_device(&device).await?;
		self.device = Some(device);
		Ok(())
	}

	fn begin_start(&mut self, operation: &'static str, mode: EndpointMode) -> Result<()> {
		if self.state != EndpointState::Idle {
			return Err(EndpointError::InvalidState {
				operation,
				state: self.state,
			});
		}
		self.state = EndpointState::Starting;
		self.mode = Some(mode);
		Ok(())
	}

	async fn finish_start(&mut self, result: Result<()>) -> Result<()> {
		match result {
			Ok(()) => {
				self.state = EndpointState::Running;
				info!(iface = self.interface_name().unwrap_or_default(), "endpoint started");
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "endpoint start failed, releasing acquired resources");
				if let Err(release_err) = self.release_all().await {
					warn!(error = %release_err, "cleanup after failed start was incomplete");
				}
				Err(e)
			}
		}
	}

	async fn clean_abandoned_interfaces(&self) -> Result<()> {
		for iface in self.allocator.abandoned_interfaces()? {
			match self.client.destroy_device(&iface).await {
				Ok(()) => info!(%iface, "abandoned interface destroyed"),
				Err(e) => warn!(%iface, error = %e, "failed to destroy abandoned interface"),
			}
		}
		Ok(())
	}

	fn require_running(&self, operation: &'static str) -> Result<&DeviceConfig> {
		match (&self.device, self.state) {
			(Some(device), EndpointState::Running) => Ok(device),
			_ => Err(EndpointError::InvalidState {
				operation,
				state: self.state,
			}),
		}
	}

	pub async fn add_peer(&self, peer: &Peer) -> Result<()> {
		let device = self.require_running("add peer")?;
		self.client.add_peer(&device.iface_name, peer).await?;
		Ok(())
	}

	pub async fn remove_peer(&self, public_key: &WgPublicKey) -> Result<()> {
		let device = self.require_running("remove peer")?;
		self.client
			.remove_peer(&device.iface_name, public_key)
			.await?;
		Ok(())
	}

	pub async fn peer_stats(&self) -> Result<Stats> {
		let device = self.require_running("read peer stats")?;
		Ok(self.client.peer_stats(&device.iface_name).await?)
	}

	/// Routes everything but the control path to `peer_ip` through the tunnel.
	pub async fn configure_routes(&self, peer_ip: IpAddr) -> Result<()> {
		let device = self.require_running("configure routes")?;
		self.client
			.configure_routes(&device.iface_name, peer_ip)
			.await?;
		Ok(())
	}

	/// What a consumer needs to reach this endpoint.
	pub fn config(&self) -> Result<ServiceConfig> {
		let device = self.require_running("build service config")?;
		let endpoint = self
			.endpoint
			.unwrap_or_else(|| SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), device.listen_port));
		let ip_address = match (self.mode, self.leases.ipnet) {
			(Some(EndpointMode::Provider), Some(subnet)) => host_address(subnet, 2).into(),
			_ => device.subnet,
		};

		Ok(ServiceConfig {
			local_port: 0,
			remote_port: 0,
			ports: Vec::new(),
			provider: ProviderConfig {
				public_key: device.private_key.public_key(),
				endpoint,
			},
			consumer: ConsumerNetConfig {
				ip_address,
				dns_ips: String::new(),
			},
		})
	}

	/// Destroys the device and returns every lease to the allocator.
	///
	/// All steps run even when an earlier one fails; the first error is
	/// returned. Calling it again is a no-op.
	#[instrument(skip(self), fields(iface = self.leases.iface.as_deref().unwrap_or_default()))]
	pub async fn stop(&mut self) -> Result<()> {
		match self.state {
			EndpointState::Stopping | EndpointState::Stopped => Ok(()),
			EndpointState::Idle => {
				self.state = EndpointState::Stopped;
				Ok(())
			}
			EndpointState::Starting | EndpointState::Running => {
				let result = self.release_all().await;
				info!("endpoint stopped");
				result
			}
		}
	}

	async fn release_all(&mut self) -> Result<()> {
		self.state = EndpointState::Stopping;
		let leases = std::mem::take(&mut self.leases);
		let mut first: Option<EndpointError> = None;

		if leases.device {
			if let Some(iface) = &leases.iface {
				if let Err(e) = self.client.destroy_device(iface).await {
					warn!(%iface, error = %e, "failed to destroy device");
					first = Some(e.into());
				}
			}
		}
		if let Some(subnet) = leases.ipnet {
			keep_first(&mut first, self.allocator.release_ipnet(subnet));
		}
		if let Some(iface) = &leases.iface {
			keep_first(&mut first, self.allocator.release_interface(iface));
		}
		if let Some(port) = leases.port {
			keep_first(&mut first, self.allocator.release_port(port));
		}

		self.state = EndpointState::Stopped;
		first.map_or(Ok(()), Err)
	}
}

fn keep_first(first: &mut Option<EndpointError>, result: std::result::Result<(), ResourceError>) {
	let Err(e) = result else {
		return;
	};
	match &e {
		ResourceError::NotLeased { .. } => error!(error = %e, "released a resource that was not leased"),
		_ => warn!(error = %e, "failed to release resource"),
	}
	if first.is_none() {
		*first = Some(e.into());
	}
}

/// Address `offset` hosts into `subnet`, keeping its prefix length.
pub fn host_address(subnet: Ipv4Net, offset: u32) -> Ipv4Net {
	let addr = Ipv4Addr::from(u32::from(subnet.network()).saturating_add(offset));
	Ipv4Net::new(addr, subnet.prefix_len()).unwrap_or(subnet)
}
