// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution of `ip` and `wg` tooling, plus the routing helpers shared by
//! both backends.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::process::Command;
use tracing::{debug, instrument, trace};

#[async_trait]
pub trait CommandRunner: Send + Sync {
	/// Runs `program` with `args` and returns its stdout.
	async fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Runs commands on the host through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
	sudo: bool,
}

impl SystemCommandRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Prefixes every command with `sudo`.
	pub fn with_sudo(mut self, sudo: bool) -> Self {
		self.sudo = sudo;
		self
	}
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
	async fn run(&self, program: &str, args: &[String]) -> Result<String> {
		let command_line = format!("{program} {}", args.join(" "));
		trace!(command = %command_line, "executing command");

		let mut cmd = if self.sudo {
			let mut cmd = Command::new("sudo");
			cmd.arg(program);
			cmd
		} else {
			Command::new(program)
		};

		let output = cmd
			.args(args)
			.output()
			.await
			.map_err(|source| ClientError::Spawn {
				command: command_line.clone(),
				source,
			})?;

		if !output.status.success() {
			return Err(ClientError::Command {
				command: command_line,
				status: output.status.to_string(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}
}

pub(crate) fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
	parts.iter().map(|s| s.to_string()).collect()
}

pub(crate) async fn link_exists(runner: &dyn CommandRunner, iface: &str) -> bool {
	runner
		.run("ip", &args(["link", "show", "dev", iface]))
		.await
		.is_ok()
}

pub(crate) async fn assign_address(
	runner: &dyn CommandRunner,
	iface: &str,
	address: &str,
) -> Result<()> {
	runner
		.run("ip", &args(["address", "replace", "dev", iface, address]))
		.await?;
	Ok(())
}

pub(crate) async fn link_up(runner: &dyn CommandRunner, iface: &str) -> Result<()> {
	runner
		.run("ip", &args(["link", "set", "up", "dev", iface]))
		.await?;
	Ok(())
}

pub(crate) async fn delete_link(runner: &dyn CommandRunner, iface: &str) -> Result<()> {
	runner
		.run("ip", &args(["link", "del", "dev", iface]))
		.await?;
	Ok(())
}

/// Address of the current default gateway for the family of `target`.
pub(crate) async fn default_gateway(runner: &dyn CommandRunner, target: IpAddr) -> Result<IpAddr> {
	let family = if target.is_ipv4() { "-4" } else { "-6" };
	let output = runner
		.run("ip", &args([family, "route", "show", "default"]))
		.await?;
	parse_default_gateway(&output).ok_or(ClientError::NoDefaultGateway)
}

fn parse_default_gateway(output: &str) -> Option<IpAddr> {
	output.lines().find_map(|line| {
		let mut words = line.split_whitespace();
		if words.next()? != "default" {
			return None;
		}
		while let Some(word) = words.next() {
			if word == "via" {
				return words.next()?.parse().ok();
			}
		}
		None
	})
}

/// Pins `peer_ip` to the current gateway so the tunnel does not swallow its
/// own transport, then sends everything else through `iface`.
#[instrument(skip(runner))]
pub(crate) async fn configure_routes(
	runner: &dyn CommandRunner,
	iface: &str,
	peer_ip: IpAddr,
) -> Result<()> {
	let gateway = default_gateway(runner, peer_ip).await?;
	let peer = peer_ip.to_string();
	let via = gateway.to_string();
	runner
		.run("ip", &args(["route", "replace", peer.as_str(), "via", via.as_str()]))
		.await?;

	let halves: [&str; 2] = if peer_ip.is_ipv4() {
		["0.0.0.0/1", "128.0.0.0/1"]
	} else {
		["::/1", "8000::/1"]
	};
	for half in halves {
		runner
			.run("ip", &args(["route", "replace", half, "dev", iface]))
			.await?;
	}

	debug!(%gateway, "routes configured");
	Ok(())
}
