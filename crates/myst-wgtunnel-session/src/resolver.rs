// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::ResolveError;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;

#[async_trait]
pub trait IpResolver: Send + Sync {
	/// Address consumers use to reach this node.
	async fn public_ip(&self) -> Result<IpAddr, ResolveError>;
}

/// Always answers with a configured address.
#[derive(Debug, Clone, Copy)]
pub struct StaticIpResolver(pub IpAddr);

#[async_trait]
impl IpResolver for StaticIpResolver {
	async fn public_ip(&self) -> Result<IpAddr, ResolveError> {
		Ok(self.0)
	}
}

/// Source address the host would use for outbound traffic.
///
/// Connecting a UDP socket selects a route without sending anything. Correct
/// for hosts with a public address; behind NAT configure the address instead.
#[derive(Debug, Clone, Copy)]
pub struct OutboundIpResolver {
	target: SocketAddr,
}

impl Default for OutboundIpResolver {
	fn default() -> Self {
		Self {
			target: (Ipv4Addr::new(1, 1, 1, 1), 53).into(),
		}
	}
}

#[async_trait]
impl IpResolver for OutboundIpResolver {
	async fn public_ip(&self) -> Result<IpAddr, ResolveError> {
		let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
		socket.connect(self.target).await?;
		let ip = socket.local_addr()?.ip();
		if ip.is_unspecified() {
			return Err(ResolveError::Unusable(ip));
		}
		Ok(ip)
	}
}
