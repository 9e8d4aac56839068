// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource pools shared by every connection endpoint of a process.

use crate::error::{ResourceError, ResourceKind, Result};
use crate::interfaces::InterfaceLister;
use crate::ports::PortSupplier;
use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, instrument};

/// Upper bound of simultaneously leased resources of each kind.
pub const MAX_RESOURCES: usize = 256;

pub const INTERFACE_PREFIX: &str = "myst";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
	/// Base network; the third octet is replaced by the subnet index.
	pub subnet: Ipv4Net,
	/// Prefix length of each leased subnet, 24 or 25.
	pub subnet_prefix: u8,
	pub max_resources: usize,
}

impl Default for AllocatorConfig {
	fn default() -> Self {
		Self {
			subnet: Ipv4Net::new(Ipv4Addr::new(10, 182, 0, 0), 16)
				.unwrap_or_else(|_| Ipv4Net::default()),
			subnet_prefix: 24,
			max_resources: MAX_RESOURCES,
		}
	}
}

#[derive(Debug, Default)]
struct ResourcePool {
	interfaces: BTreeSet<usize>,
	subnets: BTreeSet<usize>,
	ports: BTreeSet<u16>,
}

pub struct Allocator {
	pool: Mutex<ResourcePool>,
	config: AllocatorConfig,
	interfaces: Arc<dyn InterfaceLister>,
	ports: Arc<dyn PortSupplier>,
}

impl Allocator {
	pub fn new(
		config: AllocatorConfig,
		interfaces: Arc<dyn InterfaceLister>,
		ports: Arc<dyn PortSupplier>,
	) -> Self {
		let max_resources = config.max_resources.clamp(1, MAX_RESOURCES);
		Self {
			pool: Mutex::new(ResourcePool::default()),
			config: AllocatorConfig {
				max_resources,
				..config
			},
			interfaces,
			ports,
		}
	}

	pub fn config(&self) -> &AllocatorConfig {
		&self.config
	}

	fn lock(&self) -> MutexGuard<'_, ResourcePool> {
		self.pool.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn host_interfaces(&self) -> Result<Vec<String>> {
		self.interfaces
			.interface_names()
			.map_err(ResourceError::InterfaceList)
	}

	/// Leases the lowest free interface index that is not present on the host.
	#[instrument(skip(self))]
	pub fn allocate_interface(&self) -> Result<String> {
		let mut pool = self.lock();
		let host = self.host_interfaces()?;

		for index in 0..self.config.max_resources {
			if pool.interfaces.contains(&index) {
				continue;
			}
			let name = interface_name(index);
			if host.iter().any(|h| *h == name) {
				continue;
			}
			pool.interfaces.insert(index);
			debug!(iface = %name, "allocated interface");
			return Ok(name);
		}

		Err(ResourceError::ExhaustedPool(ResourceKind::Interface))
	}

	#[instrument(skip(self))]
	pub fn allocate_ipnet(&self) -> Result<Ipv4Net> {
		let mut pool = self.lock();

		for index in 0..self.config.max_resources {
			if pool.subnets.insert(index) {
				let net = self.subnet_for(index)?;
				debug!(subnet = %net, "allocated subnet");
				return Ok(net);
			}
		}

		Err(ResourceError::ExhaustedPool(ResourceKind::Subnet))
	}

	#[instrument(skip(self))]
	pub fn allocate_port(&self) -> Result<u16> {
		let mut pool = self.lock();
		if pool.ports.len() >= self.config.max_resources {
			return Err(ResourceError::ExhaustedPool(ResourceKind::Port));
		}

		let port = self.ports.acquire()?;
		if !pool.ports.insert(port) {
			return Err(ResourceError::ExhaustedPool(ResourceKind::Port));
		}
		debug!(port, "allocated port");
		Ok(port)
	}

	pub fn release_interface(&self, iface: &str) -> Result<()> {
		let index = interface_index(iface)
			.ok_or_else(|| ResourceError::not_leased(ResourceKind::Interface, iface))?;

		if !self.lock().interfaces.remove(&index) {
			return Err(ResourceError::not_leased(ResourceKind::Interface, iface));
		}
		debug!(iface, "released interface");
		Ok(())
	}

	pub fn release_ipnet(&self, net: Ipv4Net) -> Result<()> {
		if !self.config.subnet.contains(&net.addr()) {
			return Err(ResourceError::not_leased(ResourceKind::Subnet, net));
		}
		let index = usize::from(net.addr().octets()[2]);

		if !self.lock().subnets.remove(&index) {
			return Err(ResourceError::not_leased(ResourceKind::Subnet, net));
		}
		debug!(subnet = %net, "released subnet");
		Ok(())
	}

	pub fn release_port(&self, port: u16) -> Result<()> {
		if !self.lock().ports.remove(&port) {
			return Err(ResourceError::not_leased(ResourceKind::Port, port));
		}
		self.ports.release(port);
		debug!(port, "released port");
		Ok(())
	}

	/// Host interfaces carrying our prefix that this allocator did not lease.
	///
	/// These are left over from a previous process that exited without
	/// cleaning up.
	pub fn abandoned_interfaces(&self) -> Result<Vec<String>> {
		let pool = self.lock();
		let host = self.host_interfaces()?;

		Ok(host
			.into_iter()
			.filter(|name| match interface_index(name) {
				Some(index) => !pool.interfaces.contains(&index),
				None => false,
			})
			.collect())
	}

	pub fn leased_counts(&self) -> LeaseCounts {
		let pool = self.lock();
		LeaseCounts {
			interfaces: pool.interfaces.len(),
			subnets: pool.subnets.len(),
			ports: pool.ports.len(),
		}
	}

	fn subnet_for(&self, index: usize) -> Result<Ipv4Net> {
		let octet = u8::try_from(index)
			.map_err(|_| ResourceError::ExhaustedPool(ResourceKind::Subnet))?;
		let mut octets = self.config.subnet.network().octets();
		octets[2] = octet;
		octets[3] = 0;
		Ipv4Net::new(Ipv4Addr::from(octets), self.config.subnet_prefix)
			.map_err(|_| ResourceError::ExhaustedPool(ResourceKind::Subnet))
	}
}

impl std::fmt::Debug for Allocator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Allocator")
			.field("config", &self.config)
			.field("leased", &self.leased_counts())
			.finish_non_exhaustive()
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseCounts {
	pub interfaces: usize,
	pub subnets: usize,
	pub ports: usize,
}

pub fn interface_name(index: usize) -> String {
	format!("{INTERFACE_PREFIX}{index}")
}

/// Inverse of [`interface_name`].
pub fn interface_index(name: &str) -> Option<usize> {
	let suffix = name.strip_prefix(INTERFACE_PREFIX)?;
	if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	suffix.parse().ok()
}
