// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Forwarding of consumer traffic out of the provider host.

use crate::error::NatError;
use async_trait::async_trait;
use ipnet::IpNet;
use myst_wgtunnel_client::CommandRunner;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatOptions {
	/// Consumer network, e.g. `10.182.3.0/24`.
	pub vpn_network: IpNet,
	pub dns_ip: Option<IpAddr>,
	pub provider_ext_ip: Option<IpAddr>,
	pub enable_dns_redirect: bool,
	/// Where redirected DNS queries land on `dns_ip`.
	pub dns_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatRule {
	pub table: &'static str,
	pub chain: &'static str,
	pub spec: Vec<String>,
}

impl NatRule {
	fn args(&self, action: &str) -> Vec<String> {
		let mut args = vec![
			"-t".to_string(),
			self.table.to_string(),
			action.to_string(),
			self.chain.to_string(),
		];
		args.extend(self.spec.iter().cloned());
		args
	}
}

/// Rules installed for one session; hand back to [`NatService::del`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NatRules {
	pub rules: Vec<NatRule>,
}

impl NatRules {
	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

#[async_trait]
pub trait NatService: Send + Sync {
	async fn setup(&self, options: NatOptions) -> Result<NatRules, NatError>;
	async fn del(&self, rules: NatRules) -> Result<(), NatError>;
}

/// Installs nothing, for hosts where forwarding is managed elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNat;

#[async_trait]
impl NatService for NoopNat {
	async fn setup(&self, _options: NatOptions) -> Result<NatRules, NatError> {
		Ok(NatRules::default())
	}

	async fn del(&self, _rules: NatRules) -> Result<(), NatError> {
		Ok(())
	}
}

pub struct IptablesNat {
	runner: Arc<dyn CommandRunner>,
}

impl IptablesNat {
	pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
		Self { runner }
	}

	async fn enable_forwarding(&self) -> Result<(), NatError> {
		let current = self
			.runner
			.run("sysctl", &["-n".to_string(), "net.ipv4.ip_forward".to_string()])
			.await?;
		if current.trim() == "1" {
			return Ok(());
		}
		self.runner
			.run("sysctl", &["-w".to_string(), "net.ipv4.ip_forward=1".to_string()])
			.await?;
		info!("IP forwarding enabled");
		Ok(())
	}

	async fn delete_rules(&self, rules: &[NatRule]) -> Result<(), NatError> {
		let mut first = None;
		for rule in rules.iter().rev() {
			if let Err(e) = self.runner.run("iptables", &rule.args("-D")).await {
				warn!(error = %e, chain = rule.chain, "failed to delete NAT rule");
				if first.is_none() {
					first = Some(e);
				}
			}
		}
		first.map_or(Ok(()), |e| Err(e.into()))
	}
}

fn rules_for(options: &NatOptions) -> Result<Vec<NatRule>, NatError> {
	let IpNet::V4(network) = options.vpn_network.trunc() else {
		return Err(NatError::Unsupported(options.vpn_network.to_string()));
	};
	let network = network.to_string();

	// SNAT to a known IPv4 external address, otherwise whatever the egress interface has.
	let forward = match options.provider_ext_ip {
		Some(IpAddr::V4(ext_ip)) => strings([
			"-s",
			&network,
			"!",
			"-d",
			&network,
			"-j",
			"SNAT",
			"--to",
			&ext_ip.to_string(),
		]),
		_ => strings(["-s", &network, "!", "-d", &network, "-j", "MASQUERADE"]),
	};
	let mut rules = vec![NatRule {
		table: "nat",
		chain: "POSTROUTING",
		spec: forward,
	}];

	if let (true, Some(dns_ip)) = (options.enable_dns_redirect, options.dns_ip) {
		let dns_ip = dns_ip.to_string();
		let target = format!("{dns_ip}:{}", options.dns_port);
		for proto in ["udp", "tcp"] {
			rules.push(NatRule {
				table: "nat",
				chain: "PREROUTING",
				spec: strings([
					"-s",
					&network,
					"-d",
					&dns_ip,
					"-p",
					proto,
					"--dport",
					&DNS_PORT.to_string(),
					"-j",
					"DNAT",
					"--to-destination",
					&target,
				]),
			});
		}
	}

	Ok(rules)
}

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
	parts.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl NatService for IptablesNat {
	#[instrument(skip(self), fields(network = %options.vpn_network))]
	async fn setup(&self, options: NatOptions) -> Result<NatRules, NatError> {
		let rules = rules_for(&options)?;
		self.enable_forwarding().await?;

		let mut installed = Vec::with_capacity(rules.len());
		for rule in rules {
			if let Err(e) = self.runner.run("iptables", &rule.args("-A")).await {
				if let Err(rollback_err) = self.delete_rules(&installed).await {
					warn!(error = %rollback_err, "failed to roll back partially installed NAT rules");
				}
				return Err(e.into());
			}
			installed.push(rule);
		}

		info!(rules = installed.len(), "NAT rules installed");
		Ok(NatRules { rules: installed })
	}

	async fn del(&self, rules: NatRules) -> Result<(), NatError> {
		self.delete_rules(&rules.rules).await
	}
}
