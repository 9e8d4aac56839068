// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::endpoint::ConnectionEndpoint;
use crate::error::Result;
use async_trait::async_trait;
use myst_wgtunnel_common::Stats;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Source of peer counters for pollers that do not own the endpoint.
#[async_trait]
pub trait StatsSupplier: Send + Sync {
	async fn peer_stats(&self) -> Result<Stats>;
}

#[async_trait]
impl StatsSupplier for Mutex<ConnectionEndpoint> {
	async fn peer_stats(&self) -> Result<Stats> {
		self.lock().await.peer_stats().await
	}
}

#[async_trait]
impl<T: StatsSupplier + ?Sized> StatsSupplier for Arc<T> {
	async fn peer_stats(&self) -> Result<Stats> {
		(**self).peer_stats().await
	}
}
