// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard device control for connection endpoints.
//!
//! Two backends implement [`WgClient`]:
//!
//! - [`KernelClient`] drives the in-kernel module with `ip` and `wg`
//! - [`UserspaceClient`] spawns `wireguard-go` and talks UAPI over its socket
//!
//! [`new_client`] picks one at runtime from a [`BackendPreference`].
//!
//! ```ignore
//! let runner = Arc::new(SystemCommandRunner::new());
//! let client = new_client(&ClientOptions::default(), runner).await?;
//! client.configure_device(&device_config).await?;
//! ```

pub mod client;
pub mod command;
pub mod error;
pub mod kernel;
pub mod userspace;

pub use client::{BackendKind, WgClient};
pub use command::{CommandRunner, SystemCommandRunner};
pub use error::{ClientError, Result};
pub use kernel::{kernel_supported, KernelClient};
pub use userspace::UserspaceClient;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
	/// Kernel when the module is available, userspace otherwise.
	#[default]
	Auto,
	Kernel,
	Userspace,
}

impl FromStr for BackendPreference {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"auto" => Ok(Self::Auto),
			"kernel" => Ok(Self::Kernel),
			"userspace" => Ok(Self::Userspace),
			other => Err(format!("unknown backend: {other}")),
		}
	}
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
	pub backend: BackendPreference,
	pub socket_dir: PathBuf,
	pub userspace_binary: String,
	pub start_timeout: Duration,
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			backend: BackendPreference::Auto,
			socket_dir: PathBuf::from(userspace::DEFAULT_SOCKET_DIR),
			userspace_binary: userspace::DEFAULT_BINARY.to_string(),
			start_timeout: userspace::DEFAULT_START_TIMEOUT,
		}
	}
}

pub async fn new_client(
	options: &ClientOptions,
	runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn WgClient>> {
	let kind = match options.backend {
		BackendPreference::Kernel => BackendKind::Kernel,
		BackendPreference::Userspace => BackendKind::Userspace,
		BackendPreference::Auto => {
			if kernel_supported(runner.as_ref()).await {
				BackendKind::Kernel
			} else {
				BackendKind::Userspace
			}
		}
	};
	info!(backend = %kind, "WireGuard client selected");

	let client: Arc<dyn WgClient> = match kind {
		BackendKind::Kernel => Arc::new(KernelClient::new(runner)),
		BackendKind::Userspace => Arc::new(
			UserspaceClient::new(runner)
				.with_socket_dir(options.socket_dir.clone())
				.with_binary(options.userspace_binary.clone())
				.with_start_timeout(options.start_timeout),
		),
	};
	Ok(client)
}
