// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! UDP listen port acquisition.
//!
//! Unix hosts hand out ports from a range, probing each candidate with a bind.
//! Hosts that can only expose a single forwarded port use [`FixedPortSupplier`].
//! The strategy is chosen at runtime through [`PortStrategy`].

use crate::error::{ResourceError, ResourceKind, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::{Arc, Mutex};
use tracing::trace;

pub trait PortSupplier: Send + Sync {
	fn acquire(&self) -> Result<u16>;

	fn release(&self, _port: u16) {}
}

/// Ports from `min..=max` that are currently bindable.
#[derive(Debug)]
pub struct PoolPortSupplier {
	min: u16,
	max: u16,
	check_bind: bool,
	held: Mutex<HashSet<u16>>,
}

impl PoolPortSupplier {
	pub fn new(min: u16, max: u16) -> Self {
		Self {
			min,
			max,
			check_bind: true,
			held: Mutex::new(HashSet::new()),
		}
	}

	/// Skips the bind probe; every port in range counts as free.
	pub fn without_bind_check(mut self) -> Self {
		self.check_bind = false;
		self
	}

	fn is_bindable(&self, port: u16) -> bool {
		if !self.check_bind {
			return true;
		}
		UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
	}
}

impl PortSupplier for PoolPortSupplier {
	fn acquire(&self) -> Result<u16> {
		if self.min > self.max {
			return Err(ResourceError::PortSupplier(format!(
				"empty port range {}-{}",
				self.min, self.max
			)));
		}

		let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
		let span = u32::from(self.max - self.min) + 1;
		let start = rand::thread_rng().gen_range(0..span);

		for offset in 0..span {
			let port = self.min + ((start + offset) % span) as u16;
			if held.contains(&port) {
				continue;
			}
			if self.is_bindable(port) {
				held.insert(port);
				trace!(port, "acquired port from pool");
				return Ok(port);
			}
		}

		Err(ResourceError::ExhaustedPool(ResourceKind::Port))
	}

	fn release(&self, port: u16) {
		self.held
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.remove(&port);
	}
}

/// Always returns the same port.
#[derive(Debug, Clone, Copy)]
pub struct FixedPortSupplier {
	port: u16,
}

impl FixedPortSupplier {
	pub fn new(port: u16) -> Self {
		Self { port }
	}
}

impl PortSupplier for FixedPortSupplier {
	fn acquire(&self) -> Result<u16> {
		Ok(self.port)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PortStrategy {
	Pool { min: u16, max: u16 },
	Fixed { port: u16 },
}

impl PortStrategy {
	pub fn into_supplier(self) -> Arc<dyn PortSupplier> {
		match self {
			PortStrategy::Pool { min, max } => Arc::new(PoolPortSupplier::new(min, max)),
			PortStrategy::Fixed { port } => Arc::new(FixedPortSupplier::new(port)),
		}
	}
}

impl Default for PortStrategy {
	fn default() -> Self {
		PortStrategy::Pool {
			min: 52820,
			max: 53075,
		}
	}
}
