// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
	Interface,
	Subnet,
	Port,
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ResourceKind::Interface => write!(f, "interface"),
			ResourceKind::Subnet => write!(f, "subnet"),
			ResourceKind::Port => write!(f, "port"),
		}
	}
}

#[derive(Debug, Error)]
pub enum ResourceError {
	#[error("no more unused {0}s")]
	ExhaustedPool(ResourceKind),

	#[error("allocated {kind} not found: {value}")]
	NotLeased { kind: ResourceKind, value: String },

	#[error("failed to list host interfaces: {0}")]
	InterfaceList(#[source] std::io::Error),

	#[error("port supplier failed: {0}")]
	PortSupplier(String),
}

impl ResourceError {
	pub fn not_leased(kind: ResourceKind, value: impl ToString) -> Self {
		Self::NotLeased {
			kind,
			value: value.to_string(),
		}
	}

	pub fn is_exhausted(&self) -> bool {
		matches!(self, Self::ExhaustedPool(_))
	}
}

pub type Result<T> = std::result::Result<T, ResourceError>;
