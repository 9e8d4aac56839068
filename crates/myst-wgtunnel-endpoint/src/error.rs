// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::endpoint::EndpointState;
use myst_wgtunnel_client::ClientError;
use myst_wgtunnel_resources::ResourceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
	#[error("missing required field: {0}")]
	MissingRequiredField(&'static str),

	#[error("cannot {operation} while endpoint is {state}")]
	InvalidState {
		operation: &'static str,
		state: EndpointState,
	},

	#[error(transparent)]
	Resource(#[from] ResourceError),

	#[error(transparent)]
	Client(#[from] ClientError),
}

impl EndpointError {
	pub fn is_exhausted(&self) -> bool {
		matches!(self, EndpointError::Resource(e) if e.is_exhausted())
	}
}

pub type Result<T> = std::result::Result<T, EndpointError>;

#[derive(Debug, Error)]
pub enum HandshakeError {
	#[error("no handshake within {0:?}")]
	Timeout(Duration),

	#[error("handshake wait cancelled")]
	Cancelled,

	#[error("failed to read peer stats: {0}")]
	Stats(#[source] EndpointError),
}
