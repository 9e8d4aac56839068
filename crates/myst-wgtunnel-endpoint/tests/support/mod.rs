// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use async_trait::async_trait;
use myst_wgtunnel_client::{BackendKind, ClientError, Result, WgClient};
use myst_wgtunnel_common::{DeviceConfig, Peer, Stats, WgPublicKey};
use myst_wgtunnel_resources::{
	Allocator, AllocatorConfig, PoolPortSupplier, StaticInterfaceLister,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory device control that records every call.
#[derive(Default)]
pub struct FakeWgClient {
	calls: Mutex<Vec<String>>,
	configured: Mutex<Vec<DeviceConfig>>,
	pub fail_configure: AtomicBool,
	pub fail_destroy: AtomicBool,
	pub stats: Mutex<Stats>,
}

impl FakeWgClient {
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap().clone()
	}

	pub fn configured(&self) -> Vec<DeviceConfig> {
		self.configured.lock().unwrap().clone()
	}

	fn record(&self, call: String) {
		self.calls.lock().unwrap().push(call);
	}

	fn failure(call: &str) -> ClientError {
		ClientError::Command {
			command: call.to_string(),
			status: "exit status: 1".to_string(),
			stderr: "injected failure".to_string(),
		}
	}
}

#[async_trait]
impl WgClient for FakeWgClient {
	fn backend(&self) -> BackendKind {
		BackendKind::Userspace
	}

	async fn configure_device(&self, config: &DeviceConfig) -> Result<()> {
		self.record(format!("configure {}", config.iface_name));
		if self.fail_configure.load(Ordering::SeqCst) {
			return Err(Self::failure("configure"));
		}
		self.configured.lock().unwrap().push(config.clone());
		Ok(())
	}

	async fn reconfigure_device(&self, config: &DeviceConfig) -> Result<()> {
		self.record(format!("reconfigure {}", config.iface_name));
		self.configured.lock().unwrap().push(config.clone());
		Ok(())
	}

	async fn destroy_device(&self, iface: &str) -> Result<()> {
		self.record(format!("destroy {iface}"));
		if self.fail_destroy.load(Ordering::SeqCst) {
			return Err(Self::failure("destroy"));
		}
		Ok(())
	}

	async fn peer_stats(&self, iface: &str) -> Result<Stats> {
		self.record(format!("stats {iface}"));
		Ok(*self.stats.lock().unwrap())
	}

	async fn add_peer(&self, iface: &str, peer: &Peer) -> Result<()> {
		self.record(format!("add_peer {iface} {}", peer.public_key));
		Ok(())
	}

	async fn remove_peer(&self, iface: &str, public_key: &WgPublicKey) -> Result<()> {
		self.record(format!("remove_peer {iface} {public_key}"));
		Ok(())
	}

	async fn configure_routes(&self, iface: &str, peer_ip: IpAddr) -> Result<()> {
		self.record(format!("routes {iface} {peer_ip}"));
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.record("close".to_string());
		Ok(())
	}
}

pub fn allocator(host: StaticInterfaceLister) -> Arc<Allocator> {
	Arc::new(Allocator::new(
		AllocatorConfig::default(),
		Arc::new(host),
		Arc::new(PoolPortSupplier::new(52820, 53075).without_bind_check()),
	))
}
