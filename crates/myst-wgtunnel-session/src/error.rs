// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::SessionId;
use myst_wgtunnel_client::ClientError;
use myst_wgtunnel_endpoint::{EndpointError, HandshakeError};
use myst_wgtunnel_resources::ResourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("failed to parse service config: {0}")]
	Config(#[from] serde_json::Error),

	#[error("could not start connection endpoint: {0}")]
	Endpoint(#[from] EndpointError),

	#[error("connection failed: {0}")]
	Handshake(#[from] HandshakeError),

	#[error("connection is not started")]
	NotStarted,

	#[error("connection is stopped")]
	Stopped,
}

impl ConnectionError {
	/// The provider never answered; try another one rather than this one again.
	pub fn is_handshake_timeout(&self) -> bool {
		matches!(self, ConnectionError::Handshake(HandshakeError::Timeout(_)))
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, ConnectionError::Handshake(HandshakeError::Cancelled))
	}
}

#[derive(Debug, Error)]
pub enum ManagerError {
	#[error("could not parse consumer config: {0}")]
	ConsumerConfig(#[from] serde_json::Error),

	#[error("could not resolve public IP: {0}")]
	Resolve(#[from] ResolveError),

	#[error("could not allocate provider listen port: {0}")]
	Port(#[from] ResourceError),

	#[error("failed to start service: {0}")]
	Endpoint(#[from] EndpointError),

	#[error("failed to setup NAT/firewall rules: {0}")]
	Nat(#[from] NatError),

	#[error("session {0} already exists")]
	DuplicateSession(SessionId),

	#[error("unknown session {0}")]
	UnknownSession(SessionId),

	#[error("service is stopped")]
	Stopped,
}

#[derive(Debug, Error)]
pub enum NatError {
	#[error(transparent)]
	Command(#[from] ClientError),

	#[error("NAT for {0} is not supported")]
	Unsupported(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("failed to determine outbound address: {0}")]
	Io(#[from] std::io::Error),

	#[error("outbound address {0} is not usable as a public IP")]
	Unusable(std::net::IpAddr),
}
