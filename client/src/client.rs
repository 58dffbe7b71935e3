// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! A concrete, blocking TCP transport for manual testing against a running
//! node: connect, send one framed request, read one framed response. No
//! async reactor or connection pooling — one request per TCP connection is
//! adequate for a reference CLI.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::net::TcpStream;

use bazaarrpc::{Frame, Guid, RoutingTable, RpcRequest, RpcResponse, RpcTransport};

pub struct TcpTransport {
    remote: String,
}

impl TcpTransport {
    pub fn new(remote: String) -> Self { Self { remote } }
}

impl RpcTransport for TcpTransport {
    type Error = io::Error;

    fn request(&self, _peer: &Guid, req: RpcRequest) -> Result<RpcResponse, Self::Error> {
        let mut stream = TcpStream::connect(&self.remote)?;
        req.marshall(&mut stream).map_err(io::Error::other)?;
        RpcResponse::unmarshall(&mut stream)
            .map_err(io::Error::other)?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before a reply arrived"))
    }
}

/// In-process contact set: the CLI has no persistent DHT, so routing
/// feedback is only visible for the lifetime of one invocation.
#[derive(Default)]
pub struct MemoryRouting {
    contacts: RefCell<HashSet<Guid>>,
}

impl MemoryRouting {
    pub fn new() -> Self { Self::default() }

    pub fn contacts(&self) -> Vec<Guid> { self.contacts.borrow().iter().copied().collect() }
}

impl RoutingTable for MemoryRouting {
    fn add_contact(&self, peer: &Guid) {
        self.contacts.borrow_mut().insert(*peer);
    }

    fn remove_contact(&self, peer: &Guid) {
        self.contacts.borrow_mut().remove(peer);
    }
}
