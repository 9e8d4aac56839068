// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared types for the WireGuard endpoint subsystem.
//!
//! This crate provides:
//! - Opaque 32-byte keys with explicit hex and base64 conversions
//! - The `key=value` device and peer codec used by kernel and userspace devices
//! - The device-state parser for userspace `get=1` replies
//! - The JSON wire formats exchanged between provider and consumer

pub mod device;
pub mod keys;
pub mod parser;
pub mod service_config;

pub use device::{default_allowed_ips, encode_peer_removal, DeviceConfig, Peer, Stats};
pub use keys::{KeyError, WgKeyPair, WgPrivateKey, WgPublicKey, KEY_LEN};
pub use parser::{
	parse_device_peer_stats, parse_userspace_device, CodecError, UserspaceDevice,
	UserspaceDevicePeer,
};
pub use service_config::{ConsumerConfig, ConsumerNetConfig, ProviderConfig, ServiceConfig};
