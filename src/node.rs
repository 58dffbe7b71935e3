// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Node runtime (§10.4, C12). Owns the signing key, the local node
//! descriptor, and the three external collaborators (datastore, blockchain,
//! moderation), plus the listener registry. Implements [`crate::handlers::RpcHandlers`]
//! and [`crate::processor::Processor`], the two traits the (external)
//! transport dispatches into.

use bazaarrpc::{Guid, RoutingTable};
use ed25519_dalek::SigningKey;

use crate::crypto::guid_from_pubkey;
use crate::external::{Blockchain, Datastore, ModerationSink};
use crate::listeners::ListenerRegistry;

pub struct Node {
    pub signing_key: SigningKey,
    pub guid: Guid,
    pub address: String,
    pub testnet: bool,
    pub datastore: Box<dyn Datastore + Send + Sync>,
    pub blockchain: Box<dyn Blockchain + Send + Sync>,
    pub moderation: Box<dyn ModerationSink + Send + Sync>,
    pub routing: Box<dyn RoutingTable + Send + Sync>,
    pub listeners: ListenerRegistry,
}

impl Node {
    pub fn new(
        signing_key: SigningKey,
        address: String,
        testnet: bool,
        datastore: Box<dyn Datastore + Send + Sync>,
        blockchain: Box<dyn Blockchain + Send + Sync>,
        moderation: Box<dyn ModerationSink + Send + Sync>,
        routing: Box<dyn RoutingTable + Send + Sync>,
    ) -> Self {
        let guid = guid_from_pubkey(&signing_key.verifying_key());
        log::info!(target: "bazaar-node", "node starting with guid {guid}");
        Self { signing_key, guid, address, testnet, datastore, blockchain, moderation, routing, listeners: ListenerRegistry::new() }
    }
}
