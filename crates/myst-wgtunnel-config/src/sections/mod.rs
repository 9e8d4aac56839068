// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a partial `*ConfigLayer` for merging and
//! a resolved `*Config`.

mod client;
mod connection;
mod logging;
mod provider;
mod resources;

pub use client::*;
pub use connection::*;
pub use logging::*;
pub use provider::*;
pub use resources::*;
