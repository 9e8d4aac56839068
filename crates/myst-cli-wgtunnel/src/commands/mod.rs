// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod config;
pub mod connect;
pub mod keygen;
pub mod maintenance;
pub mod provide;

pub use config::handle_config;
pub use connect::{handle_connect, ConnectArgs};
pub use keygen::{handle_keygen, KeygenArgs};
pub use maintenance::{handle_cleanup, handle_stats, StatsArgs};
pub use provide::{handle_provide, ProvideArgs};

use anyhow::Context;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Reads a JSON document from `path`, or from stdin when `path` is `None` or `-`.
pub async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
	let content = match path.filter(|p| p.as_os_str() != "-") {
		Some(path) => tokio::fs::read_to_string(path)
			.await
			.with_context(|| format!("failed to read {}", path.display()))?,
		None => {
			let mut buf = String::new();
			tokio::io::stdin()
				.read_to_string(&mut buf)
				.await
				.context("failed to read stdin")?;
			buf
		}
	};

	let trimmed = content.trim();
	if trimmed.is_empty() {
		anyhow::bail!("expected a JSON document, got empty input");
	}
	Ok(trimmed.to_string())
}
