// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Opcode advertisement (§4.7, C9). The transport asks a node which opcodes
//! it handles before routing inbound messages; iterating a [`Processor`]
//! yields the same sequence `handled_commands()` returns, mirroring the
//! `Iterator for Dispatcher` pop-queue idiom used for outgoing actions.

use bazaarrpc::Opcode;

use crate::node::Node;

pub trait Processor {
    fn handled_commands(&self) -> &'static [Opcode];
}

impl Processor for Node {
    fn handled_commands(&self) -> &'static [Opcode] { &Opcode::ALL }
}

impl IntoIterator for &Node {
    type Item = Opcode;
    type IntoIter = std::iter::Copied<std::slice::Iter<'static, Opcode>>;

    fn into_iter(self) -> Self::IntoIter { self.handled_commands().iter().copied() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{Blockchain, Datastore, ModerationSink};
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;
    use serde_json::Value;
    use bazaarrpc::Guid;

    struct NullDatastore;
    impl Datastore for NullDatastore {
        fn get_file(&self, _: &str) -> Option<Vec<u8>> { None }
        fn get_profile(&self) -> Option<crate::codec::Profile> { None }
        fn set_follower(&self, _: &[u8]) {}
        fn delete_follower(&self, _: &Guid) {}
        fn is_following(&self, _: &Guid) -> bool { false }
        fn get_followers(&self) -> Vec<u8> { Vec::new() }
        fn get_following(&self) -> Vec<u8> { Vec::new() }
        fn get_listings_proto(&self) -> Vec<u8> { Vec::new() }
        fn get_listing_ratings(&self, _: &str) -> Vec<Value> { Vec::new() }
        fn get_all_ratings(&self) -> Vec<Value> { Vec::new() }
        fn load_order(&self, _: &str) -> Option<Value> { None }
        fn save_order_in_progress(&self, _: &str, _: &Value) {}
        fn move_order_to_receipts(&self, _: &str, _: &Value) {}
        fn get_outpoint_blob(&self, _: &str) -> Option<Vec<u8>> { None }
        fn update_sale_status(&self, _: &str, _: u8) {}
    }

    struct NullChain;
    impl Blockchain for NullChain {
        fn testnet(&self) -> bool { true }
        fn watch_address(&self, _: &str, _: u64, _: Box<dyn FnOnce() + Send>) {}
        fn broadcast(&self, _: &[u8]) -> Result<(), String> { Ok(()) }
    }

    struct NullModeration;
    impl ModerationSink for NullModeration {
        fn open(&self, _: &str, _: &[u8]) {}
        fn close(&self, _: &str, _: &[u8]) {}
    }

    struct NullRouting;
    impl bazaarrpc::RoutingTable for NullRouting {
        fn add_contact(&self, _: &Guid) {}
        fn remove_contact(&self, _: &Guid) {}
    }

    #[test]
    fn advertises_every_opcode_exactly_once() {
        let node = Node::new(
            SigningKey::generate(&mut OsRng),
            "127.0.0.1:9735".into(),
            true,
            Box::new(NullDatastore),
            Box::new(NullChain),
            Box::new(NullModeration),
            Box::new(NullRouting),
        );
        assert_eq!(node.handled_commands(), &Opcode::ALL[..]);
        let via_iter: Vec<Opcode> = (&node).into_iter().collect();
        assert_eq!(via_iter.len(), Opcode::ALL.len());
    }
}
