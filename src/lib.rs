// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Node-side implementation of the marketplace RPC protocol: cryptography,
//! the contract and refund state machines, the listener registry, and the
//! RPC handler set itself. The transport (framing over the network,
//! request/response correlation, peer discovery) is an external
//! collaborator — see [`bazaarrpc::client::RpcTransport`] on the client side
//! and [`handlers::RpcHandlers`] / [`processor::Processor`] on this side.

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate serde;
#[cfg(feature = "server")]
#[macro_use]
extern crate clap;

pub mod codec;
#[cfg(feature = "server")]
pub mod config;
pub mod contract;
pub mod crypto;
pub mod dispute;
pub mod error;
pub mod external;
pub mod handlers;
pub mod listeners;
pub mod node;
pub mod processor;
pub mod refund;

#[cfg(feature = "server")]
pub use config::Config;
pub use error::NodeError;
pub use handlers::RpcHandlers;
pub use node::Node;
pub use processor::Processor;
