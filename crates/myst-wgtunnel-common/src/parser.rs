// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parser for the device state returned by a userspace device on `get=1`.

use crate::device::Stats;
use crate::keys::{KeyError, WgPublicKey};
use chrono::{DateTime, Utc};
use ipnet::IpNet;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
	#[error("invalid key=value pair: {0:?}")]
	InvalidConfigLine(String),

	#[error("invalid key encoding: {0}")]
	InvalidKeyEncoding(#[from] KeyError),

	#[error("invalid value for {key}: {value:?}")]
	InvalidValue { key: String, value: String },

	#[error("device returned errno={0}")]
	Errno(i64),

	#[error("exactly 1 peer expected, got {0}")]
	UnexpectedPeerCount(usize),
}

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserspaceDevice {
	pub listen_port: u16,
	pub firewall_mark: u32,
	pub peers: Vec<UserspaceDevicePeer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserspaceDevicePeer {
	pub public_key: WgPublicKey,
	pub endpoint: Option<SocketAddr>,
	pub persistent_keepalive_interval: Duration,
	pub last_handshake_time: Option<DateTime<Utc>>,
	pub receive_bytes: u64,
	pub transmit_bytes: u64,
	pub allowed_ips: Vec<IpNet>,
	pub protocol_version: u32,
}

impl UserspaceDevicePeer {
	fn new(public_key: WgPublicKey) -> Self {
		Self {
			public_key,
			endpoint: None,
			persistent_keepalive_interval: Duration::ZERO,
			last_handshake_time: None,
			receive_bytes: 0,
			transmit_bytes: 0,
			allowed_ips: Vec::new(),
			protocol_version: 0,
		}
	}
}

/// Parses device state up to the first blank line.
pub fn parse_userspace_device(input: &str) -> Result<UserspaceDevice> {
	let mut parser = DeviceParser::default();
	for line in input.lines() {
		if line.is_empty() {
			break;
		}
		let mut parts = line.split('=');
		let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
			return Err(CodecError::InvalidConfigLine(line.to_string()));
		};
		parser.parse(key, value)?;
	}
	Ok(parser.device)
}

/// Stats of the only peer on a device.
pub fn parse_device_peer_stats(device: &UserspaceDevice) -> Result<Stats> {
	let [peer] = device.peers.as_slice() else {
		return Err(CodecError::UnexpectedPeerCount(device.peers.len()));
	};
	Ok(Stats {
		bytes_sent: peer.transmit_bytes,
		bytes_received: peer.receive_bytes,
		last_handshake: peer.last_handshake_time,
	})
}

#[derive(Default)]
struct DeviceParser {
	device: UserspaceDevice,
	handshake_sec: i64,
	handshake_nsec: u32,
}

impl DeviceParser {
	fn parse(&mut self, key: &str, value: &str) -> Result<()> {
		match key {
			"errno" => {
				let errno: i64 = parse_number(key, value)?;
				if errno != 0 {
					return Err(CodecError::Errno(errno));
				}
				return Ok(());
			}
			"public_key" => {
				let public_key = WgPublicKey::from_hex(value)?;
				self.handshake_sec = 0;
				self.handshake_nsec = 0;
				self.device.peers.push(UserspaceDevicePeer::new(public_key));
				return Ok(());
			}
			_ => {}
		}

		if !self.device.peers.is_empty() {
			return self.parse_peer(key, value);
		}

		match key {
			"listen_port" => self.device.listen_port = parse_number(key, value)?,
			"fwmark" => self.device.firewall_mark = parse_number(key, value)?,
			_ => {}
		}
		Ok(())
	}

	fn parse_peer(&mut self, key: &str, value: &str) -> Result<()> {
		let (sec, nsec) = (self.handshake_sec, self.handshake_nsec);
		let Some(peer) = self.device.peers.last_mut() else {
			return Ok(());
		};

		match key {
			"endpoint" => peer.endpoint = Some(parse_value(key, value)?),
			"last_handshake_time_sec" => {
				self.handshake_sec = parse_number(key, value)?;
				peer.last_handshake_time = handshake_time(self.handshake_sec, nsec);
			}
			"last_handshake_time_nsec" => {
				self.handshake_nsec = parse_number(key, value)?;
				peer.last_handshake_time = handshake_time(sec, self.handshake_nsec);
			}
			"tx_bytes" => peer.transmit_bytes = parse_number(key, value)?,
			"rx_bytes" => peer.receive_bytes = parse_number(key, value)?,
			"persistent_keepalive_interval" => {
				peer.persistent_keepalive_interval =
					Duration::from_secs(parse_number(key, value)?);
			}
			"allowed_ip" => peer.allowed_ips.push(parse_value(key, value)?),
			"protocol_version" => peer.protocol_version = parse_number(key, value)?,
			_ => {}
		}
		Ok(())
	}
}

/// Both parts zero means no handshake yet.
fn handshake_time(sec: i64, nsec: u32) -> Option<DateTime<Utc>> {
	if sec == 0 && nsec == 0 {
		return None;
	}
	DateTime::from_timestamp(sec, nsec)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
	parse_value(key, value)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
	value.parse().map_err(|_| CodecError::InvalidValue {
		key: key.to_string(),
		value: value.to_string(),
	})
}
