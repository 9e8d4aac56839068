// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device and peer configuration in the `key=value` control protocol.
//!
//! Keys are written as hex on this boundary. The rest of the system passes
//! typed keys around and only this module decides on the encoding.

use crate::keys::{WgPrivateKey, WgPublicKey};
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
	pub iface_name: String,
	/// Device address. Keeps the host part, e.g. `10.182.3.1/24`.
	pub subnet: IpNet,
	pub private_key: WgPrivateKey,
	/// Zero leaves the port choice to the device.
	pub listen_port: u16,
	pub dns: Vec<String>,
	pub peer: Option<Peer>,
	pub replace_peers: bool,
}

impl DeviceConfig {
	pub fn new(iface_name: impl Into<String>, subnet: IpNet, private_key: WgPrivateKey) -> Self {
		Self {
			iface_name: iface_name.into(),
			subnet,
			private_key,
			listen_port: 0,
			dns: Vec::new(),
			peer: None,
			replace_peers: false,
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

	pub fn with_replace_peers(mut self, replace: bool) -> Self {
		self.replace_peers = replace;
		self
	}

	pub fn encode(&self) -> String {
		let mut out = String::new();
		out.push_str(&format!("private_key={}\n", self.private_key.to_hex()));
		out.push_str(&format!("listen_port={}\n", self.listen_port));
		if self.replace_peers {
			out.push_str("replace_peers=true\n");
		}
		if let Some(peer) = &self.peer {
			out.push_str(&peer.encode());
		}
		out
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
	pub public_key: WgPublicKey,
	#[serde(default)]
	pub endpoint: Option<SocketAddr>,
	#[serde(default)]
	pub allowed_ips: Vec<IpNet>,
	#[serde(default)]
	pub keep_alive_period_seconds: u32,
}

impl Peer {
	pub fn new(public_key: WgPublicKey) -> Self {
		Self {
			public_key,
			endpoint: None,
			allowed_ips: Vec::new(),
			keep_alive_period_seconds: 0,
		}
	}

	/// Peer that routes everything, IPv4 and IPv6.
	pub fn full_tunnel(public_key: WgPublicKey) -> Self {
		Self::new(public_key).with_allowed_ips(default_allowed_ips())
	}

	pub fn with_endpoint(mut self, endpoint: SocketAddr) -> Self {
		self.endpoint = Some(endpoint);
		self
	}

	pub fn with_allowed_ips(mut self, ips: Vec<IpNet>) -> Self {
		self.allowed_ips = ips;
		self
	}

	pub fn with_keepalive(mut self, seconds: u32) -> Self {
		self.keep_alive_period_seconds = seconds;
		self
	}

	pub fn encode(&self) -> String {
		let mut out = String::new();
		out.push_str(&format!("public_key={}\n", self.public_key.to_hex()));
		out.push_str(&format!(
			"persistent_keepalive_interval={}\n",
			self.keep_alive_period_seconds
		));
		if let Some(endpoint) = &self.endpoint {
			out.push_str(&format!("endpoint={endpoint}\n"));
		}
		for ip in &self.allowed_ips {
			out.push_str(&format!("allowed_ip={ip}\n"));
		}
		out
	}
}

pub fn encode_peer_removal(public_key: &WgPublicKey) -> String {
	format!("public_key={}\nremove=true\n", public_key.to_hex())
}

pub fn default_allowed_ips() -> Vec<IpNet> {
	vec![
		IpNet::V4(ipnet::Ipv4Net::default()),
		IpNet::V6(ipnet::Ipv6Net::default()),
	]
}

/// Transfer counters of a single peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
	pub bytes_sent: u64,
	pub bytes_received: u64,
	/// `None` until the first handshake completes.
	pub last_handshake: Option<DateTime<Utc>>,
}

impl Stats {
	pub fn has_handshake(&self) -> bool {
		self.last_handshake.is_some()
	}
}
