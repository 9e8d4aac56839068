// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use myst_wgtunnel_common::{CodecError, KeyError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
	#[error("failed to execute {command}: {source}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{command}` exited with {status}: {stderr}")]
	Command {
		command: String,
		status: String,
		stderr: String,
	},

	#[error("unexpected output from {command}: {output:?}")]
	UnexpectedOutput { command: String, output: String },

	#[error("device protocol error: {0}")]
	Codec(#[from] CodecError),

	#[error("invalid key: {0}")]
	Key(#[from] KeyError),

	#[error("UAPI socket {}: {source}", path.display())]
	Socket {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("timed out waiting for userspace device {0}")]
	DeviceStartTimeout(String),

	#[error("no default gateway found")]
	NoDefaultGateway,

	#[error("key file: {0}")]
	KeyFile(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
