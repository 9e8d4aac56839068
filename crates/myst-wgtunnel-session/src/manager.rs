// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider side: one connection endpoint per consumer session.

use crate::error::ManagerError;
use crate::events::{EventPublisher, SessionEvent, SessionId};
use crate::nat::{NatOptions, NatRules, NatService};
use crate::resolver::IpResolver;
use crate::stats_publisher::{StatsPublisher, DEFAULT_STATS_INTERVAL};
use futures::future::join_all;
use ipnet::IpNet;
use myst_wgtunnel_client::WgClient;
use myst_wgtunnel_common::{ConsumerConfig, Peer, ServiceConfig};
use myst_wgtunnel_endpoint::{
	host_address, ConnectionEndpoint, EndpointError, ProviderModeConfig, StatsSupplier,
};
use myst_wgtunnel_resources::Allocator;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_DNS_PORT: u16 = 11253;

#[derive(Debug, Clone)]
pub struct ManagerOptions {
	/// Hand consumers the provider tunnel address as DNS server and redirect
	/// port 53 to `dns_port`.
	pub dns_enabled: bool,
	pub dns_port: u16,
	pub stats_interval: Duration,
}

impl Default for ManagerOptions {
	fn default() -> Self {
		Self {
			dns_enabled: false,
			dns_port: DEFAULT_DNS_PORT,
			stats_interval: DEFAULT_STATS_INTERVAL,
		}
	}
}

struct Session {
	endpoint: Arc<Mutex<ConnectionEndpoint>>,
	nat_rules: NatRules,
	stats: StatsPublisher,
}

pub struct Manager {
	allocator: Arc<Allocator>,
	client: Arc<dyn WgClient>,
	resolver: Arc<dyn IpResolver>,
	nat: Arc<dyn NatService>,
	publisher: Arc<dyn EventPublisher>,
	options: ManagerOptions,
	sessions: Mutex<HashMap<SessionId, Session>>,
	stopped: AtomicBool,
	done: CancellationToken,
}

impl Manager {
	pub fn new(
		allocator: Arc<Allocator>,
		client: Arc<dyn WgClient>,
		resolver: Arc<dyn IpResolver>,
		nat: Arc<dyn NatService>,
		publisher: Arc<dyn EventPublisher>,
		options: ManagerOptions,
	) -> Self {
		Self {
			allocator,
			client,
			resolver,
			nat,
			publisher,
			options,
			sessions: Mutex::new(HashMap::new()),
			stopped: AtomicBool::new(false),
			done: CancellationToken::new(),
		}
	}

	pub async fn session_ids(&self) -> Vec<SessionId> {
		self.sessions.lock().await.keys().copied().collect()
	}

	/// Accepts a consumer and returns the config it connects with.
	#[instrument(skip(self, consumer_config), fields(%session_id))]
	pub async fn provide_config(
		&self,
		session_id: SessionId,
		consumer_config: &str,
	) -> Result<ServiceConfig, ManagerError> {
		if self.stopped.load(Ordering::SeqCst) {
			return Err(ManagerError::Stopped);
		}
		info!("accepting new WireGuard connection");
		let consumer: ConsumerConfig = serde_json::from_str(consumer_config)?;
		if self.sessions.lock().await.contains_key(&session_id) {
			return Err(ManagerError::DuplicateSession(session_id));
		}

		let public_ip = self.resolver.public_ip().await?;
		let listen_port = self.allocator.allocate_port()?;

		let mut endpoint = ConnectionEndpoint::new(Arc::clone(&self.allocator), Arc::clone(&self.client));
		if let Err(e) = endpoint
			.start_provider_mode(ProviderModeConfig {
				public_ip: Some(public_ip),
				listen_port: Some(listen_port),
			})
			.await
		{
			// Ownership of the port only passes to the endpoint once it accepted the inputs.
			if matches!(e, EndpointError::MissingRequiredField(_)) {
				if let Err(release_err) = self.allocator.release_port(listen_port) {
					warn!(error = %release_err, "failed to release listen port");
				}
			}
			return Err(e.into());
		}

		let (config, nat_rules) = match self.configure_session(&endpoint, &consumer, public_ip).await {
			Ok(prepared) => prepared,
			Err(e) => {
				if let Err(stop_err) = endpoint.stop().await {
					error!(error = %stop_err, "failed to stop connection endpoint");
				}
				return Err(e);
			}
		};

		let iface = endpoint.interface_name().unwrap_or_default().to_string();
		let endpoint = Arc::new(Mutex::new(endpoint));
		let stats = StatsPublisher::new(Arc::clone(&self.publisher), self.options.stats_interval);
		let supplier: Arc<dyn StatsSupplier> = endpoint.clone();
		stats.start(session_id, supplier);

		let session = Session {
			endpoint,
			nat_rules,
			stats,
		};

		let mut sessions = self.sessions.lock().await;
		if sessions.contains_key(&session_id) || self.stopped.load(Ordering::SeqCst) {
			drop(sessions);
			let err = if self.stopped.load(Ordering::SeqCst) {
				ManagerError::Stopped
			} else {
				ManagerError::DuplicateSession(session_id)
			};
			self.cleanup(session_id, session).await;
			return Err(err);
		}
		sessions.insert(session_id, session);
		drop(sessions);

		self.publisher
			.publish(SessionEvent::SessionStarted { session_id, iface });
		Ok(config)
	}

	async fn configure_session(
		&self,
		endpoint: &ConnectionEndpoint,
		consumer: &ConsumerConfig,
		public_ip: IpAddr,
	) -> Result<(ServiceConfig, NatRules), ManagerError> {
		let mut config = endpoint.config()?;

		endpoint
			.add_peer(&Peer::full_tunnel(consumer.public_key))
			.await?;

		let dns_ip = match (self.options.dns_enabled, config.consumer.ip_address) {
			(true, IpNet::V4(net)) => Some(IpAddr::V4(host_address(net, 1).addr())),
			_ => None,
		};
		if let Some(ip) = dns_ip {
			config.consumer.dns_ips = ip.to_string();
		}

		let nat_rules = self
			.nat
			.setup(NatOptions {
				vpn_network: config.consumer.ip_address.trunc(),
				dns_ip,
				provider_ext_ip: Some(public_ip),
				enable_dns_redirect: dns_ip.is_some(),
				dns_port: self.options.dns_port,
			})
			.await?;

		Ok((config, nat_rules))
	}

	async fn cleanup(&self, session_id: SessionId, session: Session) {
		info!(%session_id, "cleaning up session");
		session.stats.stop();

		if let Err(e) = self.nat.del(session.nat_rules).await {
			error!(%session_id, error = %e, "failed to delete NAT rules");
		}
		if let Err(e) = session.endpoint.lock().await.stop().await {
			error!(%session_id, error = %e, "failed to stop connection endpoint");
		}
		self.publisher
			.publish(SessionEvent::SessionEnded { session_id });
	}

	/// Tears down one session.
	pub async fn destroy_session(&self, session_id: SessionId) -> Result<(), ManagerError> {
		let session = self
			.sessions
			.lock()
			.await
			.remove(&session_id)
			.ok_or(ManagerError::UnknownSession(session_id))?;
		self.cleanup(session_id, session).await;
		Ok(())
	}

	/// Blocks until [`stop`](Manager::stop) completes.
	pub async fn serve(&self) {
		info!("WireGuard service started");
		self.done.cancelled().await;
	}

	/// Cleans up every session concurrently, then releases [`serve`](Manager::serve).
	pub async fn stop(&self) {
		if self.stopped.swap(true, Ordering::SeqCst) {
			self.done.cancelled().await;
			return;
		}
		info!("WireGuard service stopping");

		let sessions: Vec<(SessionId, Session)> = self.sessions.lock().await.drain().collect();
		join_all(
			sessions
				.into_iter()
				.map(|(id, session)| self.cleanup(id, session)),
		)
		.await;

		self.done.cancel();
		info!("WireGuard service stopped");
	}
}
