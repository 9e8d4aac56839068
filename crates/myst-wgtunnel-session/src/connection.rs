// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer side of a WireGuard session.

use crate::error::ConnectionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use myst_wgtunnel_client::WgClient;
use myst_wgtunnel_common::{ConsumerConfig, Peer, ServiceConfig, Stats, WgKeyPair};
use myst_wgtunnel_endpoint::{
	host_address, ConnectionEndpoint, ConsumerModeConfig, EndpointError, EndpointState,
	HandshakeWaiter, StatsSupplier,
};
use myst_wgtunnel_resources::Allocator;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const STATE_CHANNEL_CAPACITY: usize = 100;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_KEEPALIVE_SECS: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
	Connecting,
	Connected,
	Disconnecting,
	NotConnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
	pub at: DateTime<Utc>,
	pub bytes_sent: u64,
	pub bytes_received: u64,
}

#[derive(Debug, Clone)]
pub struct ConnectionOptions {
	pub handshake_timeout: Duration,
	pub keepalive_secs: u32,
}

impl Default for ConnectionOptions {
	fn default() -> Self {
		Self {
			handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
			keepalive_secs: DEFAULT_KEEPALIVE_SECS,
		}
	}
}

type EndpointSlot = Mutex<Option<ConnectionEndpoint>>;

/// Stats of whatever endpoint the connection currently holds.
struct SlotStats<'a>(&'a EndpointSlot);

#[async_trait]
impl<'a> StatsSupplier for SlotStats<'a> {
	async fn peer_stats(&self) -> myst_wgtunnel_endpoint::Result<Stats> {
		match self.0.lock().await.as_ref() {
			Some(endpoint) => endpoint.peer_stats().await,
			None => Err(EndpointError::InvalidState {
				operation: "read peer stats",
				state: EndpointState::Idle,
			}),
		}
	}
}

/// A consumer tunnel to one provider.
///
/// State changes are reported on the channel from [`state_receiver`], which
/// closes once the connection has stopped.
///
/// [`state_receiver`]: Connection::state_receiver
pub struct Connection {
	allocator: Arc<Allocator>,
	client: Arc<dyn WgClient>,
	waiter: Arc<dyn HandshakeWaiter>,
	options: ConnectionOptions,
	keys: WgKeyPair,
	ports: Vec<u16>,
	endpoint: EndpointSlot,
	state_tx: StdMutex<Option<mpsc::Sender<ConnectionState>>>,
	state_rx: StdMutex<Option<mpsc::Receiver<ConnectionState>>>,
	stopping: AtomicBool,
	cancel: CancellationToken,
	done: CancellationToken,
}

impl Connection {
	pub fn new(
		allocator: Arc<Allocator>,
		client: Arc<dyn WgClient>,
		waiter: Arc<dyn HandshakeWaiter>,
		options: ConnectionOptions,
	) -> Self {
		let (tx, rx) = mpsc::channel(STATE_CHANNEL_CAPACITY);
		Self {
			allocator,
			client,
			waiter,
			options,
			keys: WgKeyPair::generate(),
			ports: Vec::new(),
			endpoint: Mutex::new(None),
			state_tx: StdMutex::new(Some(tx)),
			state_rx: StdMutex::new(Some(rx)),
			stopping: AtomicBool::new(false),
			cancel: CancellationToken::new(),
			done: CancellationToken::new(),
		}
	}

	/// Ports offered to the provider for NAT traversal.
	pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
		self.ports = ports;
		self
	}

	/// Receiver of state changes. Only the first call gets it.
	pub fn state_receiver(&self) -> Option<mpsc::Receiver<ConnectionState>> {
		self.state_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
	}

	fn emit(&self, state: ConnectionState) {
		let guard = self.state_tx.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(tx) = guard.as_ref() {
			if tx.try_send(state).is_err() {
				warn!(?state, "state channel full, dropping state change");
			}
		}
	}

	/// What the provider needs to accept this consumer.
	pub fn get_config(&self) -> ConsumerConfig {
		ConsumerConfig {
			public_key: *self.keys.public_key(),
			ip: None,
			ports: self.ports.clone(),
		}
	}

	/// Connects using the provider's JSON service config.
	///
	/// On any failure the connection is stopped before the error is returned.
	#[instrument(skip_all)]
	pub async fn start(&self, service_config: &str) -> Result<(), ConnectionError> {
		if self.stopping.load(Ordering::SeqCst) {
			return Err(ConnectionError::Stopped);
		}
		let config: ServiceConfig = serde_json::from_str(service_config)?;

		self.emit(ConnectionState::Connecting);
		info!(provider = %config.provider.endpoint, "starting new connection");

		match self.establish(&config).await {
			Ok(()) => {
				self.emit(ConnectionState::Connected);
				info!("connection established");
				Ok(())
			}
			Err(e) => {
				warn!(error = %e, "connection failed");
				self.stop().await;
				Err(e)
			}
		}
	}

	async fn establish(&self, config: &ServiceConfig) -> Result<(), ConnectionError> {
		{
			let mut slot = self.endpoint.lock().await;
			// `stop` sets the flag before it takes the slot.
			if self.stopping.load(Ordering::SeqCst) {
				return Err(ConnectionError::Stopped);
			}
			let endpoint = slot.insert(ConnectionEndpoint::new(
				Arc::clone(&self.allocator),
				Arc::clone(&self.client),
			));

			endpoint
				.start_consumer_mode(
					ConsumerModeConfig::new(
						self.keys.private_key().clone(),
						config.consumer.ip_address,
					)
					.with_listen_port(config.local_port),
				)
				.await?;

			info!(peer = %config.provider.endpoint, "adding connection peer");
			endpoint.add_peer(&self.provider_peer(config)).await?;

			info!("configuring routes");
			endpoint.configure_routes(config.provider_ip()).await?;
		}

		info!("waiting for initial handshake");
		self.waiter
			.wait(
				&SlotStats(&self.endpoint),
				provider_tunnel_ip(config.consumer.ip_address),
				self.options.handshake_timeout,
				&self.cancel,
			)
			.await?;
		if self.stopping.load(Ordering::SeqCst) {
			return Err(ConnectionError::Stopped);
		}
		Ok(())
	}

	fn provider_peer(&self, config: &ServiceConfig) -> Peer {
		Peer::full_tunnel(config.provider.public_key)
			.with_endpoint(config.provider.endpoint)
			.with_keepalive(self.options.keepalive_secs)
	}

	/// Points the running tunnel at a new provider config.
	pub async fn reconfigure(&self, service_config: &str) -> Result<(), ConnectionError> {
		let config: ServiceConfig = serde_json::from_str(service_config)?;
		let mut slot = self.endpoint.lock().await;
		let endpoint = slot.as_mut().ok_or(ConnectionError::NotStarted)?;

		endpoint
			.reconfigure_consumer_mode(
				ConsumerModeConfig::new(self.keys.private_key().clone(), config.consumer.ip_address)
					.with_listen_port(config.local_port)
					.with_peer(self.provider_peer(&config)),
			)
			.await?;
		Ok(())
	}

	pub async fn statistics(&self) -> Result<Statistics, ConnectionError> {
		let slot = self.endpoint.lock().await;
		let endpoint = slot.as_ref().ok_or(ConnectionError::NotStarted)?;
		let stats = endpoint.peer_stats().await?;
		Ok(Statistics {
			at: Utc::now(),
			bytes_sent: stats.bytes_sent,
			bytes_received: stats.bytes_received,
		})
	}

	pub fn interface_name(&self) -> Option<String> {
		self.endpoint
			.try_lock()
			.ok()
			.and_then(|slot| slot.as_ref()?.interface_name().map(str::to_string))
	}

	/// Tears the tunnel down once. Later callers wait for the first to finish.
	pub async fn stop(&self) {
		if self.stopping.swap(true, Ordering::SeqCst) {
			self.done.cancelled().await;
			return;
		}

		info!("stopping WireGuard connection");
		self.emit(ConnectionState::Disconnecting);
		self.cancel.cancel();

		if let Some(endpoint) = self.endpoint.lock().await.as_mut() {
			if let Err(e) = endpoint.stop().await {
				error!(error = %e, "failed to close wireguard connection");
			}
		}

		self.emit(ConnectionState::NotConnected);
		self.state_tx
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.take();
		self.done.cancel();
	}

	/// Resolves once the connection has stopped.
	pub async fn wait(&self) {
		self.done.cancelled().await;
	}
}

/// The provider holds the first address of the consumer network.
fn provider_tunnel_ip(consumer: IpNet) -> Option<IpAddr> {
	match consumer {
		IpNet::V4(net) => Some(IpAddr::V4(host_address(net, 1).addr())),
		IpNet::V6(_) => None,
	}
}
