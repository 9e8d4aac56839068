// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::Context;
use myst_wgtunnel_config::WgTunnelConfig;

/// Prints the effective configuration after all sources were merged.
pub fn handle_config(config: &WgTunnelConfig) -> anyhow::Result<()> {
	let rendered = config
		.to_toml()
		.context("failed to render configuration")?;
	print!("{rendered}");
	Ok(())
}
