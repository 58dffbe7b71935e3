// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface to a bazaar node

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate log;
#[macro_use]
extern crate clap;

mod args;
mod client;
mod command;

use clap::Parser;
use loglevel::LogLevel;

pub use crate::args::{Args, Command};
use crate::command::ExecError;

fn main() -> Result<(), ExecError> {
    let args = Args::parse();
    LogLevel::from_verbosity_flag_count(args.verbose).apply();
    trace!("Command-line arguments: {:#?}", &args);

    args.command.exec(args.remote, &args.peer, args.yaml)
}
