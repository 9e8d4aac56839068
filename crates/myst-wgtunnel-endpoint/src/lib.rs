// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Connection endpoint lifecycle for WireGuard tunnels.
//!
//! A [`ConnectionEndpoint`] leases an interface (plus a subnet and port in
//! provider mode) from a shared [`Allocator`], configures the device through
//! a [`WgClient`] and gives everything back on [`ConnectionEndpoint::stop`],
//! including after a start that failed halfway.
//!
//! ```ignore
//! let mut endpoint = ConnectionEndpoint::new(allocator.clone(), client.clone());
//! endpoint
//!     .start_provider_mode(ProviderModeConfig {
//!         public_ip: Some(public_ip),
//!         listen_port: Some(allocator.allocate_port()?),
//!     })
//!     .await?;
//! let service_config = endpoint.config()?;
//! ```
//!
//! [`Allocator`]: myst_wgtunnel_resources::Allocator
//! [`WgClient`]: myst_wgtunnel_client::WgClient

pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod stats;

pub use endpoint::{
	host_address, ConnectionEndpoint, ConsumerModeConfig, EndpointMode, EndpointState,
	ProviderModeConfig,
};
pub use error::{EndpointError, HandshakeError, Result};
pub use handshake::{HandshakeWaiter, PollingHandshakeWaiter, DEFAULT_POLL_INTERVAL};
pub use stats::StatsSupplier;
