// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod commands;
pub mod context;
pub mod logging;

pub use commands::{
	handle_cleanup, handle_config, handle_connect, handle_keygen, handle_provide, handle_stats,
	read_input, ConnectArgs, KeygenArgs, ProvideArgs, StatsArgs,
};
pub use context::{allocator_config, client_options, port_strategy, NodeContext};
pub use logging::init_tracing;
