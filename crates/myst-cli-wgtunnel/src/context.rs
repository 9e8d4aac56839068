// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring from resolved configuration to the runtime pieces.

use anyhow::Context;
use myst_wgtunnel_client::{
	new_client, BackendPreference, ClientOptions, CommandRunner, SystemCommandRunner, WgClient,
};
use myst_wgtunnel_config::{
	BackendSetting, ClientConfig, PortStrategyKind, ResourcesConfig, WgTunnelConfig,
};
use myst_wgtunnel_resources::{Allocator, AllocatorConfig, PortStrategy, SysfsInterfaceLister};
use std::sync::Arc;
use tracing::info;

pub fn allocator_config(resources: &ResourcesConfig) -> AllocatorConfig {
	AllocatorConfig {
		subnet: resources.subnet,
		subnet_prefix: resources.subnet_prefix,
		max_resources: resources.max_resources,
	}
}

pub fn port_strategy(resources: &ResourcesConfig) -> PortStrategy {
	match resources.port_strategy {
		PortStrategyKind::Pool => PortStrategy::Pool {
			min: resources.port_min,
			max: resources.port_max,
		},
		PortStrategyKind::Fixed => PortStrategy::Fixed {
			port: resources.fixed_port,
		},
	}
}

pub fn client_options(client: &ClientConfig) -> ClientOptions {
	ClientOptions {
		backend: match client.backend {
			BackendSetting::Auto => BackendPreference::Auto,
			BackendSetting::Kernel => BackendPreference::Kernel,
			BackendSetting::Userspace => BackendPreference::Userspace,
		},
		socket_dir: client.socket_dir.clone(),
		userspace_binary: client.userspace_binary.clone(),
		..ClientOptions::default()
	}
}

/// Shared state for commands that touch devices.
pub struct NodeContext {
	pub config: WgTunnelConfig,
	pub runner: Arc<dyn CommandRunner>,
	pub allocator: Arc<Allocator>,
	pub client: Arc<dyn WgClient>,
}

impl NodeContext {
	pub async fn build(config: WgTunnelConfig) -> anyhow::Result<Self> {
		let runner: Arc<dyn CommandRunner> =
			Arc::new(SystemCommandRunner::new().with_sudo(config.client.sudo));

		let allocator = Arc::new(Allocator::new(
			allocator_config(&config.resources),
			Arc::new(SysfsInterfaceLister::new()),
			port_strategy(&config.resources).into_supplier(),
		));

		let client = new_client(&client_options(&config.client), Arc::clone(&runner))
			.await
			.context("failed to create WireGuard client")?;
		info!(backend = ?client.backend(), "WireGuard client ready");

		Ok(Self {
			config,
			runner,
			allocator,
			client,
		})
	}
}
