// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	ClientConfigLayer, ConnectionConfigLayer, LoggingConfigLayer, ProviderConfigLayer,
	ResourcesConfigLayer,
};

/// One source's view of the configuration; unset sections stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WgTunnelConfigLayer {
	#[serde(default)]
	pub resources: Option<ResourcesConfigLayer>,
	#[serde(default)]
	pub client: Option<ClientConfigLayer>,
	#[serde(default)]
	pub connection: Option<ConnectionConfigLayer>,
	#[serde(default)]
	pub provider: Option<ProviderConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl WgTunnelConfigLayer {
	/// Fields set in `other` win.
	pub fn merge(&mut self, other: WgTunnelConfigLayer) {
		merge_section(&mut self.resources, other.resources, ResourcesConfigLayer::merge);
		merge_section(&mut self.client, other.client, ClientConfigLayer::merge);
		merge_section(&mut self.connection, other.connection, ConnectionConfigLayer::merge);
		merge_section(&mut self.provider, other.provider, ProviderConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
