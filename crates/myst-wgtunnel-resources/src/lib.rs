// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource pools for WireGuard connection endpoints.
//!
//! One [`Allocator`] is constructed per process and shared by reference with
//! every endpoint. It hands out:
//! - interface names (`myst<N>`), cross-checked against the host
//! - disjoint subnets carved from a base network
//! - UDP listen ports through a runtime-selected [`PortSupplier`]
//!
//! # Example
//!
//! ```ignore
//! use myst_wgtunnel_resources::{Allocator, AllocatorConfig, PortStrategy, SysfsInterfaceLister};
//! use std::sync::Arc;
//!
//! let allocator = Allocator::new(
//!     AllocatorConfig::default(),
//!     Arc::new(SysfsInterfaceLister::new()),
//!     PortStrategy::default().into_supplier(),
//! );
//! let iface = allocator.allocate_interface()?;
//! ```

pub mod allocator;
pub mod error;
pub mod interfaces;
pub mod ports;

pub use allocator::{
	interface_index, interface_name, Allocator, AllocatorConfig, LeaseCounts, INTERFACE_PREFIX,
	MAX_RESOURCES,
};
pub use error::{ResourceError, ResourceKind, Result};
pub use interfaces::{InterfaceLister, StaticInterfaceLister, SysfsInterfaceLister};
pub use ports::{FixedPortSupplier, PoolPortSupplier, PortStrategy, PortSupplier};
