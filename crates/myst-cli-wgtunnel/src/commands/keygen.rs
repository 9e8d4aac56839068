// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use console::style;
use myst_wgtunnel_common::WgKeyPair;

#[derive(Debug, Clone, Args)]
pub struct KeygenArgs {
	/// Print keys hex encoded, as the UAPI protocol expects
	#[arg(long)]
	pub hex: bool,
}

pub fn handle_keygen(args: KeygenArgs) -> anyhow::Result<()> {
	let keys = WgKeyPair::generate();
	let (private, public) = if args.hex {
		(keys.private_key().to_hex(), keys.public_key().to_hex())
	} else {
		(keys.private_key().to_base64(), keys.public_key().to_base64())
	};

	println!("{} {}", style("PrivateKey:").dim(), private);
	println!("{} {}", style("PublicKey: ").dim(), public);
	Ok(())
}
