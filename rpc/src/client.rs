// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Outgoing RPC stubs (§4.5). Each `call_*` method asks the transport to
//! deliver a [`RpcRequest`] to a peer and correlate the reply; on return it
//! feeds the reply's truthiness into the routing table, mirroring the
//! original `handleCallResponse` feedback loop (a peer that answers is kept,
//! one that times out or answers falsy is dropped).

use crate::data::Guid;
use crate::request::RpcRequest;
use crate::response::RpcResponse;

/// What the client stubs need from the (external, out-of-scope) transport:
/// send a correlated request to a peer and block the caller's thread until
/// either a reply arrives or the transport's own timeout elapses.
pub trait RpcTransport {
    type Error: std::error::Error;

    fn request(&self, peer: &Guid, req: RpcRequest) -> Result<RpcResponse, Self::Error>;
}

/// Routing table feedback, supplied by the (external) DHT/contact-list
/// collaborator.
pub trait RoutingTable {
    fn add_contact(&self, peer: &Guid);
    fn remove_contact(&self, peer: &Guid);
}

/// Typed client stubs over an [`RpcTransport`] + [`RoutingTable`] pair.
pub struct RpcClient<'a, T, R> {
    transport: &'a T,
    routing: &'a R,
}

impl<'a, T: RpcTransport, R: RoutingTable> RpcClient<'a, T, R> {
    pub fn new(transport: &'a T, routing: &'a R) -> Self { Self { transport, routing } }

    fn call(&self, peer: &Guid, req: RpcRequest) -> Result<RpcResponse, T::Error> {
        let result = self.transport.request(peer, req);
        match &result {
            Ok(resp) if resp.is_truthy() => self.routing.add_contact(peer),
            Ok(_) => {
                log::debug!(target: "bazaar-rpc", "peer {peer} answered falsy, dropping contact");
                self.routing.remove_contact(peer);
            }
            Err(err) => {
                log::warn!(target: "bazaar-rpc", "request to {peer} failed: {err}");
                self.routing.remove_contact(peer);
            }
        }
        result
    }

    pub fn get_contract(&self, peer: &Guid, contract_hash: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetContract(contract_hash))
    }

    pub fn get_image(&self, peer: &Guid, image_hash: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetImage(image_hash))
    }

    pub fn get_profile(&self, peer: &Guid) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetProfile)
    }

    pub fn get_user_metadata(&self, peer: &Guid) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetUserMetadata)
    }

    pub fn get_listings(&self, peer: &Guid) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetListings)
    }

    pub fn get_contract_metadata(&self, peer: &Guid, contract_hash: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetContractMetadata(contract_hash))
    }

    pub fn follow(&self, peer: &Guid, follower: Vec<u8>, sig: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Follow(follower, sig))
    }

    pub fn unfollow(&self, peer: &Guid, sig: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Unfollow(sig))
    }

    pub fn get_followers(&self, peer: &Guid) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetFollowers)
    }

    pub fn get_following(&self, peer: &Guid) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetFollowing)
    }

    pub fn broadcast(&self, peer: &Guid, message: Vec<u8>, sig: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Broadcast(message, sig))
    }

    pub fn message(&self, peer: &Guid, ephem_pubkey: Vec<u8>, ciphertext: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Message(ephem_pubkey, ciphertext))
    }

    pub fn order(&self, peer: &Guid, ephem_pubkey: Vec<u8>, ciphertext: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Order(ephem_pubkey, ciphertext))
    }

    pub fn order_confirmation(
        &self,
        peer: &Guid,
        ephem_pubkey: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::OrderConfirmation(ephem_pubkey, ciphertext))
    }

    pub fn complete_order(
        &self,
        peer: &Guid,
        ephem_pubkey: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::CompleteOrder(ephem_pubkey, ciphertext))
    }

    pub fn dispute_open(&self, peer: &Guid, ephem_pubkey: Vec<u8>, ciphertext: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::DisputeOpen(ephem_pubkey, ciphertext))
    }

    pub fn dispute_close(&self, peer: &Guid, ephem_pubkey: Vec<u8>, ciphertext: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::DisputeClose(ephem_pubkey, ciphertext))
    }

    pub fn get_ratings(&self, peer: &Guid, listing_hash: Option<Vec<u8>>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::GetRatings(listing_hash))
    }

    pub fn refund(&self, peer: &Guid, ephem_pubkey: Vec<u8>, ciphertext: Vec<u8>) -> Result<RpcResponse, T::Error> {
        self.call(peer, RpcRequest::Refund(ephem_pubkey, ciphertext))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::convert::Infallible;

    use super::*;

    struct MockTransport(RefCell<RpcResponse>);
    impl RpcTransport for MockTransport {
        type Error = Infallible;
        fn request(&self, _peer: &Guid, _req: RpcRequest) -> Result<RpcResponse, Self::Error> {
            Ok(self.0.borrow().clone())
        }
    }

    #[derive(Default)]
    struct MockRouting {
        added: RefCell<HashSet<Guid>>,
        removed: RefCell<HashSet<Guid>>,
    }
    impl RoutingTable for MockRouting {
        fn add_contact(&self, peer: &Guid) { self.added.borrow_mut().insert(*peer); }
        fn remove_contact(&self, peer: &Guid) { self.removed.borrow_mut().insert(*peer); }
    }

    #[test]
    fn truthy_response_adds_contact() {
        let transport = MockTransport(RefCell::new(RpcResponse::accepted()));
        let routing = MockRouting::default();
        let client = RpcClient::new(&transport, &routing);
        let peer = Guid([7u8; 20]);
        client.get_profile(&peer).unwrap();
        assert!(routing.added.borrow().contains(&peer));
        assert!(!routing.removed.borrow().contains(&peer));
    }

    #[test]
    fn falsy_response_removes_contact() {
        let transport = MockTransport(RefCell::new(RpcResponse::rejected()));
        let routing = MockRouting::default();
        let client = RpcClient::new(&transport, &routing);
        let peer = Guid([8u8; 20]);
        client.follow(&peer, vec![], vec![]).unwrap();
        assert!(routing.removed.borrow().contains(&peer));
    }
}
