// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration exchanged between provider and consumer during session
//! negotiation.

use crate::keys::WgPublicKey;
use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;

/// What the provider hands to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
	#[serde(default)]
	pub local_port: u16,
	#[serde(default)]
	pub remote_port: u16,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub ports: Vec<u16>,
	pub provider: ProviderConfig,
	pub consumer: ConsumerNetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
	pub public_key: WgPublicKey,
	pub endpoint: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerNetConfig {
	/// Tunnel address of the consumer. The host part is significant.
	pub ip_address: IpNet,
	#[serde(default)]
	pub dns_ips: String,
}

impl ServiceConfig {
	pub fn provider_ip(&self) -> std::net::IpAddr {
		self.provider.endpoint.ip()
	}
}

/// What the consumer sends when asking for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
	#[serde(rename = "PublicKey")]
	pub public_key: WgPublicKey,
	/// Public IP of the consumer, only needed when the provider pings through NAT.
	#[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
	pub ip: Option<String>,
	#[serde(rename = "Ports", default, deserialize_with = "null_as_empty")]
	pub ports: Vec<u16>,
}

impl ConsumerConfig {
	pub fn new(public_key: WgPublicKey) -> Self {
		Self {
			public_key,
			ip: None,
			ports: Vec::new(),
		}
	}
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<u16>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Vec<u16>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keys::WgPrivateKey;

	fn public_key() -> WgPublicKey {
		WgPrivateKey::from_base64("DyxwLJ++jVO+azusu7rPEnzdgfm+0fiOBQ1GTbkk3QQ=")
			.unwrap()
			.public_key()
	}

	fn service_config() -> ServiceConfig {
		ServiceConfig {
			local_port: 51000,
			remote_port: 51001,
			ports: Vec::new(),
			provider: ProviderConfig {
				public_key: public_key(),
				endpoint: "127.0.0.1:51001".parse().unwrap(),
			},
			consumer: ConsumerNetConfig {
				ip_address: "127.0.0.1/25".parse().unwrap(),
				dns_ips: "128.0.0.1".to_string(),
			},
		}
	}

	#[test]
	fn serializes_human_readable_form() {
		let json = serde_json::to_string(&service_config()).unwrap();
		let expected = format!(
			r#"{{"local_port":51000,"remote_port":51001,"ports":[],"provider":{{"public_key":"{}","endpoint":"127.0.0.1:51001"}},"consumer":{{"ip_address":"127.0.0.1/25","dns_ips":"128.0.0.1"}}}}"#,
			public_key().to_base64()
		);
		assert_eq!(json, expected);
	}

	#[test]
	fn roundtrip_keeps_consumer_host_ip() {
		let config = service_config();
		let json = serde_json::to_vec(&config).unwrap();
		let parsed: ServiceConfig = serde_json::from_slice(&json).unwrap();

		assert_eq!(parsed.provider.endpoint, config.provider.endpoint);
		assert_eq!(parsed.provider.public_key, config.provider.public_key);
		assert_eq!(parsed.consumer.ip_address, config.consumer.ip_address);
		assert_eq!(
			parsed.consumer.ip_address.addr().to_string(),
			"127.0.0.1"
		);
		assert_eq!(parsed.consumer.ip_address.prefix_len(), 25);
	}

	#[test]
	fn accepts_null_ports() {
		let json = format!(
			r#"{{"local_port":51000,"remote_port":51001,"ports":null,"provider":{{"public_key":"{}","endpoint":"127.0.0.1:51001"}},"consumer":{{"ip_address":"127.0.0.1/25","dns_ips":"128.0.0.1"}}}}"#,
			public_key().to_base64()
		);
		let parsed: ServiceConfig = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, service_config());
	}

	#[test]
	fn rejects_invalid_provider_key() {
		let json = r#"{"provider":{"public_key":"wg1","endpoint":"127.0.0.1:51001"},"consumer":{"ip_address":"127.0.0.1/25"}}"#;
		assert!(serde_json::from_str::<ServiceConfig>(json).is_err());
	}

	#[test]
	fn consumer_config_omits_empty_ip() {
		let config = ConsumerConfig::new(public_key());
		let json = serde_json::to_string(&config).unwrap();
		assert_eq!(
			json,
			format!(r#"{{"PublicKey":"{}","Ports":[]}}"#, public_key().to_base64())
		);
	}

	#[test]
	fn consumer_config_parses_ip_and_null_ports() {
		let json = format!(
			r#"{{"PublicKey":"{}","IP":"1.2.3.4","Ports":null}}"#,
			public_key().to_base64()
		);
		let parsed: ConsumerConfig = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed.ip.as_deref(), Some("1.2.3.4"));
		assert!(parsed.ports.is_empty());
	}
}
