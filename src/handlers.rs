// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! RPC handler set (§4.3, C6). One method per opcode, each taking the
//! validated sender descriptor the transport hands in and the opcode's raw
//! arguments, and returning the wire-level [`RpcResponse`]. Handlers never
//! propagate an error past the handler boundary (§7): every internal
//! `Result::Err` is logged and folded into `RpcResponse::not_found()` or
//! `RpcResponse::rejected()` before returning.

use bazaarrpc::{PeerDescriptor, RoutingTable, RpcResponse, BROADCAST_MAX_LEN, TRUE_MARKER};
use ed25519_dalek::VerifyingKey;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use crate::codec::{Follower, ListingsIndex, Metadata, PlaintextMessage};
use crate::contract::Contract;
use crate::crypto::{self, pow_gate_passes};
use crate::node::Node;

pub trait RpcHandlers {
    fn rpc_get_contract(&self, sender: &PeerDescriptor, contract_hash: &[u8]) -> RpcResponse;
    fn rpc_get_image(&self, sender: &PeerDescriptor, image_hash: &[u8]) -> RpcResponse;
    fn rpc_get_profile(&self, sender: &PeerDescriptor) -> RpcResponse;
    fn rpc_get_user_metadata(&self, sender: &PeerDescriptor) -> RpcResponse;
    fn rpc_get_listings(&self, sender: &PeerDescriptor) -> RpcResponse;
    fn rpc_get_contract_metadata(&self, sender: &PeerDescriptor, contract_hash: &[u8]) -> RpcResponse;
    fn rpc_follow(&mut self, sender: &PeerDescriptor, record: &[u8], sig: &[u8]) -> RpcResponse;
    fn rpc_unfollow(&mut self, sender: &PeerDescriptor, sig: &[u8]) -> RpcResponse;
    fn rpc_get_followers(&self, sender: &PeerDescriptor) -> RpcResponse;
    fn rpc_get_following(&self, sender: &PeerDescriptor) -> RpcResponse;
    fn rpc_broadcast(&self, sender: &PeerDescriptor, message: &[u8], sig: &[u8]) -> RpcResponse;
    fn rpc_message(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_order(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_order_confirmation(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_complete_order(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_dispute_open(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_dispute_close(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
    fn rpc_get_ratings(&self, sender: &PeerDescriptor, listing_hash: Option<&[u8]>) -> RpcResponse;
    fn rpc_refund(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse;
}

/// Derives the local wallet's child scalar for a contract's chaincode field
/// (§4.1). Used by handlers that need to produce this node's own escrow
/// signatures — the node's signing key doubles as its wallet master seed,
/// the same convention [`crypto::signing_key_to_x25519`] already uses to
/// derive a different key from the same bytes for a different purpose.
fn local_child_scalar(node: &Node, chaincode: &[u8; 32]) -> curve25519_dalek::scalar::Scalar {
    let master = crypto::master_scalar_from_seed(node.signing_key.as_bytes());
    crypto::derive_child_private_scalar(&master, chaincode)
}

fn chaincode_from_order(order: &serde_json::Value) -> Option<[u8; 32]> {
    let hex = order.get("buyer_order")?.get("order")?.get("payment")?.get("chaincode")?.as_str()?;
    let bytes = hex_decode(hex)?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

fn open_ephemeral(node: &Node, ephem_pubkey: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
    let ephem: [u8; 32] = ephem_pubkey.try_into().ok()?;
    crypto::open(&node.signing_key, &ephem, ciphertext).ok()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok()).collect()
}

fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("in-memory writer cannot fail");
    encoder.finish().expect("in-memory writer cannot fail")
}

impl RpcHandlers for Node {
    fn rpc_get_contract(&self, sender: &PeerDescriptor, contract_hash: &[u8]) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let hex: String = contract_hash.iter().map(|b| format!("{b:02x}")).collect();
        match self.datastore.load_order(&hex) {
            Some(doc) => RpcResponse::ok(vec![serde_json::to_vec(&doc).unwrap_or_default()]),
            None => RpcResponse::not_found(),
        }
    }

    fn rpc_get_image(&self, sender: &PeerDescriptor, image_hash: &[u8]) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        if image_hash.len() != 20 {
            return RpcResponse::not_found();
        }
        let hex: String = image_hash.iter().map(|b| format!("{b:02x}")).collect();
        match self.datastore.get_file(&hex) {
            Some(bytes) => RpcResponse::ok(vec![bytes]),
            None => RpcResponse::not_found(),
        }
    }

    fn rpc_get_profile(&self, sender: &PeerDescriptor) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        // Profile content is an external, already-serialized datastore blob;
        // GET_PROFILE signs whatever the datastore currently holds.
        match self.datastore.get_file("profile") {
            Some(bytes) => {
                let sig = crypto::sign(&self.signing_key, &bytes);
                RpcResponse::ok(vec![bytes, sig.to_vec()])
            }
            None => RpcResponse::not_found(),
        }
    }

    fn rpc_get_user_metadata(&self, sender: &PeerDescriptor) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let profile = match self.datastore.get_profile() {
            Some(p) => p,
            None => return RpcResponse::not_found(),
        };
        let metadata = Metadata::from(&profile);
        let bytes = serde_json::to_vec(&metadata).unwrap_or_default();
        let sig = crypto::sign(&self.signing_key, &bytes);
        RpcResponse::ok(vec![bytes, sig.to_vec()])
    }

    fn rpc_get_listings(&self, sender: &PeerDescriptor) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let listings = self.datastore.get_listings_proto();
        let mut index: ListingsIndex = match serde_json::from_slice(&listings) {
            Ok(idx) => idx,
            Err(_) => return RpcResponse::not_found(),
        };
        // The node's current handle/avatar_hash are overlaid at serve
        // time and never persisted into the stored index (§3).
        if let Some(profile) = self.datastore.get_profile() {
            for entry in &mut index.entries {
                entry.handle = profile.handle.clone();
                entry.avatar_hash = profile.avatar_hash.clone();
            }
        }
        let bytes = serde_json::to_vec(&index).unwrap_or_default();
        let sig = crypto::sign(&self.signing_key, &bytes);
        RpcResponse::ok(vec![bytes, sig.to_vec()])
    }

    fn rpc_get_contract_metadata(&self, sender: &PeerDescriptor, contract_hash: &[u8]) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let hex: String = contract_hash.iter().map(|b| format!("{b:02x}")).collect();
        let listings = self.datastore.get_listings_proto();
        let index: ListingsIndex = match serde_json::from_slice(&listings) {
            Ok(idx) => idx,
            Err(_) => return RpcResponse::not_found(),
        };
        match index.entries.into_iter().find(|e| e.contract_hash == hex) {
            Some(mut entry) => {
                if let Some(profile) = self.datastore.get_profile() {
                    entry.handle = profile.handle;
                    entry.avatar_hash = profile.avatar_hash;
                }
                let bytes = serde_json::to_vec(&entry).unwrap_or_default();
                let sig = crypto::sign(&self.signing_key, &bytes);
                RpcResponse::ok(vec![bytes, sig.to_vec()])
            }
            None => RpcResponse::not_found(),
        }
    }

    fn rpc_follow(&mut self, sender: &PeerDescriptor, record: &[u8], sig: &[u8]) -> RpcResponse {
        let mut sig_arr = [0u8; 64];
        if sig.len() != 64 {
            return RpcResponse::rejected();
        }
        sig_arr.copy_from_slice(sig);
        let mut follower: Follower = match serde_json::from_slice(record) {
            Ok(f) => f,
            Err(_) => return RpcResponse::rejected(),
        };
        follower.signature = Some(sig_arr);
        if follower.verify(&sender.guid, &sender.pubkey, &self.guid).is_err() {
            log::warn!(target: "bazaar-node", "FOLLOW: invariant violated by {}", sender.guid);
            return RpcResponse::rejected();
        }
        self.routing.add_contact(&sender.guid);

        self.datastore.set_follower(record);
        if let Some(sink) = self.listeners.notification_sink() {
            sink.notify(
                sender.guid,
                follower.metadata.handle.clone(),
                "follow",
                String::new(),
                String::new(),
                follower.metadata.avatar_hash.clone(),
            );
        }
        let metadata_bytes = serde_json::to_vec(&follower.metadata).unwrap_or_default();
        let metadata_sig = crypto::sign(&self.signing_key, &metadata_bytes);
        RpcResponse(vec![TRUE_MARKER.to_vec(), metadata_bytes, metadata_sig.to_vec()])
    }

    fn rpc_unfollow(&mut self, sender: &PeerDescriptor, sig: &[u8]) -> RpcResponse {
        let mut sig_arr = [0u8; 64];
        if sig.len() != 64 {
            return RpcResponse::rejected();
        }
        sig_arr.copy_from_slice(sig);
        let message = format!("unfollow:{}", self.guid);
        if crypto::verify(&sender.pubkey, message.as_bytes(), &sig_arr).is_err() {
            return RpcResponse::rejected();
        }
        self.routing.add_contact(&sender.guid);
        self.datastore.delete_follower(&sender.guid);
        RpcResponse::accepted()
    }

    fn rpc_get_followers(&self, sender: &PeerDescriptor) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let bytes = self.datastore.get_followers();
        let sig = crypto::sign(&self.signing_key, &bytes);
        RpcResponse::ok(vec![bytes, sig.to_vec()])
    }

    fn rpc_get_following(&self, sender: &PeerDescriptor) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let bytes = self.datastore.get_following();
        let sig = crypto::sign(&self.signing_key, &bytes);
        RpcResponse::ok(vec![bytes, sig.to_vec()])
    }

    fn rpc_broadcast(&self, sender: &PeerDescriptor, message: &[u8], sig: &[u8]) -> RpcResponse {
        // Length check precedes the following-set check, which precedes
        // signature verification — the exact order of operations the
        // original implementation uses (§10.7).
        if message.len() > BROADCAST_MAX_LEN {
            return RpcResponse::rejected();
        }
        if !self.datastore.is_following(&sender.guid) {
            return RpcResponse::rejected();
        }
        let mut sig_arr = [0u8; 64];
        if sig.len() != 64 {
            return RpcResponse::rejected();
        }
        sig_arr.copy_from_slice(sig);
        if crypto::verify(&sender.pubkey, message, &sig_arr).is_err() {
            return RpcResponse::rejected();
        }
        self.routing.add_contact(&sender.guid);
        for sink in self.listeners.broadcast_sinks() {
            sink.broadcast(sender.guid, message);
        }
        RpcResponse::accepted()
    }

    fn rpc_message(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let message: PlaintextMessage = match serde_json::from_slice(&plaintext) {
            Ok(m) => m,
            Err(_) => return RpcResponse::rejected(),
        };
        let embedded_pubkey = match VerifyingKey::from_bytes(&message.sender_pubkey) {
            Ok(k) => k,
            Err(_) => return RpcResponse::rejected(),
        };
        if message.verify(&embedded_pubkey).is_err() {
            return RpcResponse::rejected();
        }
        if !pow_gate_passes(&embedded_pubkey, &sender.guid) {
            log::warn!(target: "bazaar-node", "MESSAGE: proof-of-work gate rejected {}", sender.guid);
            return RpcResponse::rejected();
        }
        self.routing.add_contact(&sender.guid);
        let sig = message.signature.unwrap_or([0u8; 64]);
        for sink in self.listeners.message_sinks() {
            sink.deliver(&plaintext, &sig);
        }
        RpcResponse::accepted()
    }

    fn rpc_order(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let contract = Contract::new(doc, self.testnet);
        if contract.verify(&sender.pubkey).is_err() {
            log::warn!(target: "bazaar-node", "ORDER: contract verification failed for {}", sender.guid);
            return RpcResponse::rejected();
        }

        // Read every payment field from the just-constructed contract,
        // never from stale node-global state.
        let address = contract.doc["buyer_order"]["order"]["payment"]["address"].as_str().unwrap_or_default();
        let amount = contract.doc["buyer_order"]["order"]["payment"]["amount"].as_u64().unwrap_or_default();
        let listing_hash = contract.doc["vendor_offer"]["listing"]["contract_id"].as_str().unwrap_or_default();
        let chaincode_hex = contract.doc["buyer_order"]["order"]["payment"].get("chaincode").and_then(|v| v.as_str()).unwrap_or_default();
        let Some(chaincode_bytes) = hex_decode(chaincode_hex) else {
            return RpcResponse::rejected();
        };
        let mut chaincode = [0u8; 32];
        if chaincode_bytes.len() != 32 {
            return RpcResponse::rejected();
        }
        chaincode.copy_from_slice(&chaincode_bytes);
        let child_scalar = crypto::derive_child_scalar(sender.pubkey.as_bytes(), &chaincode);
        let buyer_key_hex: String = child_scalar.as_bytes().iter().map(|b| format!("{b:02x}")).collect();

        let payload = format!("{address}{amount}{listing_hash}{buyer_key_hex}");
        let seller_sig = crypto::sign(&self.signing_key, payload.as_bytes());
        self.routing.add_contact(&sender.guid);

        if let Some(sink) = self.listeners.notification_sink() {
            let order_id = listing_hash.to_string();
            if let Err(err) = contract.await_funding(sink, self.blockchain.as_ref(), sender.guid, order_id, String::new(), String::new()) {
                log::warn!(target: "bazaar-node", "ORDER: failed to register funding watch: {err}");
            }
        }
        RpcResponse::ok(vec![seller_sig.to_vec()])
    }

    fn rpc_order_confirmation(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let contract = Contract::new(doc, self.testnet);
        let sink = match self.listeners.notification_sink() {
            Some(s) => s,
            None => return RpcResponse::rejected(),
        };
        match contract.accept_order_confirmation(&sender.pubkey, sink.as_ref(), sender.guid) {
            Some(_order_id) => {
                self.routing.add_contact(&sender.guid);
                RpcResponse::accepted()
            }
            None => RpcResponse::rejected(),
        }
    }

    fn rpc_complete_order(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let order_id = match doc.get("order_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return RpcResponse::rejected(),
        };
        let contract = Contract::new(doc, self.testnet);
        let sink = match self.listeners.notification_sink() {
            Some(s) => s,
            None => return RpcResponse::rejected(),
        };
        let order = match self.datastore.load_order(&order_id) {
            Some(o) => o,
            None => return RpcResponse::rejected(),
        };
        let chaincode = match chaincode_from_order(&order) {
            Some(c) => c,
            None => return RpcResponse::rejected(),
        };
        let vendor_child = local_child_scalar(self, &chaincode);
        let result = contract.accept_receipt(
            self.datastore.as_ref(),
            self.blockchain.as_ref(),
            sink.as_ref(),
            &order_id,
            sender.guid,
            &sender.pubkey,
            |_, _, sighash| crypto::sign_escrow_sighash(&vendor_child, sighash).expect("valid sighash signs"),
        );
        match result {
            Ok(_) => {
                self.routing.add_contact(&sender.guid);
                RpcResponse::accepted()
            }
            Err(err) => {
                log::warn!(target: "bazaar-node", "COMPLETE_ORDER failed: {err}");
                RpcResponse::rejected()
            }
        }
    }

    fn rpc_dispute_open(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let order_id = match doc.get("order_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return RpcResponse::rejected(),
        };
        let sink = match self.listeners.notification_sink() {
            Some(s) => s,
            None => return RpcResponse::rejected(),
        };
        match crate::dispute::open_dispute(self.datastore.as_ref(), self.moderation.as_ref(), sink.as_ref(), &order_id, &plaintext, sender.guid) {
            Ok(()) => {
                self.routing.add_contact(&sender.guid);
                RpcResponse::accepted()
            }
            Err(_) => RpcResponse::rejected(),
        }
    }

    fn rpc_dispute_close(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let order_id = match doc.get("order_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return RpcResponse::rejected(),
        };
        let sink = match self.listeners.notification_sink() {
            Some(s) => s,
            None => return RpcResponse::rejected(),
        };
        match crate::dispute::close_dispute(self.datastore.as_ref(), self.moderation.as_ref(), sink.as_ref(), &order_id, &plaintext, sender.guid) {
            Ok(()) => {
                self.routing.add_contact(&sender.guid);
                RpcResponse::accepted()
            }
            Err(_) => RpcResponse::rejected(),
        }
    }

    fn rpc_get_ratings(&self, sender: &PeerDescriptor, listing_hash: Option<&[u8]>) -> RpcResponse {
        self.routing.add_contact(&sender.guid);
        let rows = match listing_hash {
            Some(hash) => {
                let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
                self.datastore.get_listing_ratings(&hex)
            }
            None => self.datastore.get_all_ratings(),
        };
        let json = serde_json::to_vec(&rows).unwrap_or_default();
        let compressed = zlib_compress(&json);
        let sig = crypto::sign(&self.signing_key, &compressed);
        RpcResponse::ok(vec![compressed, sig.to_vec()])
    }

    fn rpc_refund(&self, sender: &PeerDescriptor, ephem_pubkey: &[u8], ciphertext: &[u8]) -> RpcResponse {
        let plaintext = match open_ephemeral(self, ephem_pubkey, ciphertext) {
            Some(p) => p,
            None => return RpcResponse::rejected(),
        };
        let doc: serde_json::Value = match serde_json::from_slice(&plaintext) {
            Ok(d) => d,
            Err(_) => return RpcResponse::rejected(),
        };
        let order_id = match doc.get("order_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return RpcResponse::rejected(),
        };
        let refund_block = match doc.get("refund") {
            Some(r) => r,
            None => return RpcResponse::rejected(),
        };
        let sink = match self.listeners.notification_sink() {
            Some(s) => s,
            None => return RpcResponse::rejected(),
        };
        let order = match self.datastore.load_order(&order_id) {
            Some(o) => o,
            None => return RpcResponse::rejected(),
        };
        let chaincode = match chaincode_from_order(&order) {
            Some(c) => c,
            None => return RpcResponse::rejected(),
        };
        let buyer_child = local_child_scalar(self, &chaincode);
        let result = crate::refund::process_refund(
            self.datastore.as_ref(),
            self.blockchain.as_ref(),
            sink.as_ref(),
            &order_id,
            refund_block,
            sender.guid,
            None,
            |_, _, sighash| crypto::sign_escrow_sighash(&buyer_child, sighash).expect("valid sighash signs"),
        );
        match result {
            Ok(()) => {
                self.routing.add_contact(&sender.guid);
                RpcResponse::accepted()
            }
            Err(err) => {
                log::warn!(target: "bazaar-node", "REFUND failed: {err}");
                RpcResponse::rejected()
            }
        }
    }
}
