// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard sessions on top of connection endpoints.
//!
//! - [`Connection`]: the consumer side. Starts an endpoint in consumer mode,
//!   adds the provider as peer and waits for the first handshake.
//! - [`Manager`]: the provider side. One endpoint per accepted consumer, with
//!   NAT rules and periodic transfer statistics for each session.

pub mod connection;
pub mod error;
pub mod events;
pub mod manager;
pub mod nat;
pub mod resolver;
pub mod stats_publisher;

pub use connection::{
	Connection, ConnectionOptions, ConnectionState, Statistics, DEFAULT_HANDSHAKE_TIMEOUT,
	DEFAULT_KEEPALIVE_SECS,
};
pub use error::{ConnectionError, ManagerError, NatError, ResolveError};
pub use events::{BroadcastPublisher, EventPublisher, SessionEvent, SessionId, TracingPublisher};
pub use manager::{Manager, ManagerOptions, DEFAULT_DNS_PORT};
pub use nat::{IptablesNat, NatOptions, NatRule, NatRules, NatService, NoopNat};
pub use resolver::{IpResolver, OutboundIpResolver, StaticIpResolver};
pub use stats_publisher::{StatsPublisher, DEFAULT_STATS_INTERVAL};
