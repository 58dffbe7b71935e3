// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Wire-level RPC protocol: the 19 opcodes, their request/response shapes,
//! and the outgoing client stubs. The underlying transport (framing,
//! retransmission, request/response correlation over UDP) is an external
//! collaborator and not implemented here — see [`client::RpcTransport`].

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate serde;

pub mod client;
pub mod data;
pub mod error;
pub mod frame;
pub mod request;
pub mod response;

pub use client::{RoutingTable, RpcClient, RpcTransport};
pub use data::{Guid, GuidParseError, Opcode, PeerDescriptor, BROADCAST_MAX_LEN, POW_TARGET};
pub use error::CodecError;
pub use frame::Frame;
pub use request::RpcRequest;
pub use response::{RpcResponse, FALSE_MARKER, TRUE_MARKER};

/// Correlation id for in-flight requests, assigned by the transport.
pub type ReqId = u64;
