// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Host network interface listing.

use std::io;
use std::path::PathBuf;

/// Source of the interface names currently present on the host.
pub trait InterfaceLister: Send + Sync {
	fn interface_names(&self) -> io::Result<Vec<String>>;
}

/// Lists interfaces from `/sys/class/net`.
#[derive(Debug, Clone)]
pub struct SysfsInterfaceLister {
	root: PathBuf,
}

impl SysfsInterfaceLister {
	pub fn new() -> Self {
		Self::with_root("/sys/class/net")
	}

	pub fn with_root(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl Default for SysfsInterfaceLister {
	fn default() -> Self {
		Self::new()
	}
}

impl InterfaceLister for SysfsInterfaceLister {
	fn interface_names(&self) -> io::Result<Vec<String>> {
		let mut names = Vec::new();
		for entry in std::fs::read_dir(&self.root)? {
			let entry = entry?;
			if let Some(name) = entry.file_name().to_str() {
				names.push(name.to_string());
			}
		}
		names.sort();
		Ok(names)
	}
}

/// Fixed list, for hosts without sysfs and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaceLister {
	names: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl StaticInterfaceLister {
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			names: std::sync::Arc::new(std::sync::Mutex::new(
				names.into_iter().map(Into::into).collect(),
			)),
		}
	}

	pub fn add(&self, name: impl Into<String>) {
		self.lock().push(name.into());
	}

	pub fn remove(&self, name: &str) {
		self.lock().retain(|n| n != name);
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
		self.names.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl InterfaceLister for StaticInterfaceLister {
	fn interface_names(&self) -> io::Result<Vec<String>> {
		Ok(self.lock().clone())
	}
}
