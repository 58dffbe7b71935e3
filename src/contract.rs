// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Contract object (§4.2, §9). A purchase contract is an ordered JSON
//! document; field order is load-bearing because signatures are computed
//! over the canonical insertion-order serialization. `serde_json` is built
//! with the `preserve_order` feature so `serde_json::Map` round-trips
//! insertion order instead of sorting keys.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bazaarrpc::Guid;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Amount, Transaction, TxIn, TxOut};
use ed25519_dalek::VerifyingKey;
use serde_json::Value;

use crate::crypto::{self, CryptoError};
use crate::external::{Blockchain, Datastore, NotificationSink};
use crate::refund::Outpoint;

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ContractError {
    /// contract is missing required section: {0}
    MissingSection(&'static str),

    /// buyer signature failed to verify.
    ///
    /// {0}
    #[from]
    BadSignature(CryptoError),

    /// vendor confirmation signature failed to verify.
    VendorSignatureInvalid,

    /// order {0} not found in persistent storage.
    OrderNotFound(String),

    /// buyer receipt signature failed to verify.
    ReceiptSignatureInvalid,

    /// escrow-release broadcast failed: {0}
    Broadcast(String),
}

/// Wraps an ordered-JSON contract document plus the network flag needed to
/// interpret its Bitcoin addresses.
pub struct Contract {
    pub doc: Value,
    pub testnet: bool,
}

fn section<'a>(doc: &'a Value, path: &'static str) -> Result<&'a Value, ContractError> {
    let mut cur = doc;
    for part in path.split('.') {
        cur = cur.get(part).ok_or(ContractError::MissingSection(path))?;
    }
    Ok(cur)
}

impl Contract {
    pub fn new(doc: Value, testnet: bool) -> Self { Self { doc, testnet } }

    /// Canonical bytes of `buyer_order.order` with any `signature` field
    /// stripped — the exact payload the buyer signed.
    fn buyer_order_signing_bytes(&self) -> Result<Vec<u8>, ContractError> {
        let mut order = section(&self.doc, "buyer_order.order")?.clone();
        if let Some(obj) = order.as_object_mut() {
            obj.remove("signature");
        }
        Ok(serde_json::to_vec(&order).expect("Value serializes infallibly"))
    }

    /// Validates structural completeness and the buyer's signature over
    /// `buyer_order.order` (§4.2, §8).
    pub fn verify(&self, expected_buyer_pubkey: &VerifyingKey) -> Result<(), ContractError> {
        section(&self.doc, "vendor_offer.listing.contract_id")?;
        section(&self.doc, "buyer_order.order.payment.address")?;
        section(&self.doc, "buyer_order.order.payment.chaincode")?;
        section(&self.doc, "buyer_order.order.payment.amount")?;

        let sig_hex = section(&self.doc, "buyer_order.order.signature")?
            .as_str()
            .ok_or(ContractError::MissingSection("buyer_order.order.signature"))?;
        let sig_bytes = hex_decode(sig_hex).ok_or(ContractError::MissingSection("buyer_order.order.signature"))?;
        let mut sig = [0u8; 64];
        if sig_bytes.len() != 64 {
            return Err(ContractError::BadSignature(CryptoError::BadSignature));
        }
        sig.copy_from_slice(&sig_bytes);

        let payload = self.buyer_order_signing_bytes()?;
        crypto::verify(expected_buyer_pubkey, &payload, &sig)?;
        Ok(())
    }

    /// Registers an asynchronous funding watch on `payment.address`. The
    /// callback fires the notification exactly once even if the blockchain
    /// collaborator reports the funding event more than once (§8
    /// idempotence), guarded by a shared flag.
    pub fn await_funding(
        &self,
        sink: Arc<dyn NotificationSink + Send + Sync>,
        blockchain: &dyn Blockchain,
        buyer_guid: Guid,
        order_id: String,
        title: String,
        image_hash: String,
    ) -> Result<(), ContractError> {
        let address = section(&self.doc, "buyer_order.order.payment.address")?
            .as_str()
            .ok_or(ContractError::MissingSection("buyer_order.order.payment.address"))?
            .to_string();
        let amount_sat = section(&self.doc, "buyer_order.order.payment.amount")?
            .as_u64()
            .ok_or(ContractError::MissingSection("buyer_order.order.payment.amount"))?;

        let fired = Arc::new(AtomicBool::new(false));
        blockchain.watch_address(
            &address,
            amount_sat,
            Box::new(move || {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                sink.notify(buyer_guid, String::new(), "new order", order_id.clone(), title.clone(), image_hash.clone());
            }),
        );
        Ok(())
    }

    /// Validates the vendor's confirmation block and notifies "order
    /// confirmed" (§4.2). Returns `None` when the section is absent or the
    /// signature fails, matching the source's null-on-failure contract.
    pub fn accept_order_confirmation(
        &self,
        vendor_pubkey: &VerifyingKey,
        sink: &dyn NotificationSink,
        buyer_guid: Guid,
    ) -> Option<String> {
        let confirmation = self.doc.get("vendor_order_confirmation")?;
        let order_id = confirmation.get("order_id")?.as_str()?.to_string();
        let sig_hex = confirmation.get("signature")?.as_str()?;
        let sig_bytes = hex_decode(sig_hex)?;
        if sig_bytes.len() != 64 {
            return None;
        }
        let mut sig = [0u8; 64];
        sig.copy_from_slice(&sig_bytes);

        let mut unsigned = confirmation.clone();
        unsigned.as_object_mut()?.remove("signature");
        let payload = serde_json::to_vec(&unsigned).ok()?;
        crypto::verify(vendor_pubkey, &payload, &sig).ok()?;

        sink.notify(buyer_guid, String::new(), "order confirmed", order_id.clone(), String::new(), String::new());
        Some(order_id)
    }

    /// Validates the buyer's receipt, releases the seller-side escrow
    /// spend, transitions sale status, and notifies "order completed"
    /// (§4.2). Transaction construction/co-signing mirrors the refund
    /// flow's pattern (§4.4) but spends directly to the vendor;
    /// `vendor_sign_input` produces the vendor's signature over each
    /// input's sighash, derived by the caller from the local wallet master
    /// private key and the contract's chaincode (§4.1).
    pub fn accept_receipt(
        &self,
        datastore: &dyn Datastore,
        blockchain: &dyn Blockchain,
        sink: &dyn NotificationSink,
        order_id: &str,
        vendor_guid: Guid,
        buyer_pubkey: &VerifyingKey,
        vendor_sign_input: impl Fn(usize, &Outpoint, &bitcoin::sighash::LegacySighash) -> bitcoin::ecdsa::Signature,
    ) -> Result<String, ContractError> {
        let receipt = self.doc.get("buyer_receipt").ok_or(ContractError::MissingSection("buyer_receipt"))?;
        let sig_hex = receipt
            .get("signature")
            .and_then(Value::as_str)
            .ok_or(ContractError::MissingSection("buyer_receipt.signature"))?;
        let sig_bytes = hex_decode(sig_hex).ok_or(ContractError::MissingSection("buyer_receipt.signature"))?;
        if sig_bytes.len() != 64 {
            return Err(ContractError::ReceiptSignatureInvalid);
        }
        let mut sig = [0u8; 64];
        sig.copy_from_slice(&sig_bytes);

        let mut unsigned = receipt.clone();
        unsigned.as_object_mut().ok_or(ContractError::MissingSection("buyer_receipt"))?.remove("signature");
        let payload = serde_json::to_vec(&unsigned).expect("Value serializes infallibly");
        crypto::verify(buyer_pubkey, &payload, &sig).map_err(|_| ContractError::ReceiptSignatureInvalid)?;

        let buyer_sigs = receipt
            .get("signatures")
            .and_then(Value::as_array)
            .ok_or(ContractError::MissingSection("buyer_receipt.signatures"))?;
        let vendor_address = section(&self.doc, "vendor_offer.listing.payout_address")?
            .as_str()
            .ok_or(ContractError::MissingSection("vendor_offer.listing.payout_address"))?;
        release_escrow_to_vendor(datastore, blockchain, order_id, vendor_address, self.testnet, buyer_sigs, &vendor_sign_input)?;

        datastore.update_sale_status(order_id, 0);
        sink.notify(vendor_guid, String::new(), "order completed", order_id.to_string(), String::new(), String::new());
        Ok(order_id.to_string())
    }
}

/// Builds, co-signs, and broadcasts the escrow-release transaction spending
/// every order outpoint to the vendor's payout address. The buyer's
/// per-input signatures travel in `buyer_receipt.signatures` (parsed by the
/// caller); the vendor's are produced locally via `vendor_sign_input`,
/// mirroring [`crate::refund::process_refund`]'s by-index pairing.
fn release_escrow_to_vendor(
    datastore: &dyn Datastore,
    blockchain: &dyn Blockchain,
    order_id: &str,
    vendor_address_str: &str,
    testnet: bool,
    buyer_sigs: &[Value],
    vendor_sign_input: &impl Fn(usize, &Outpoint, &bitcoin::sighash::LegacySighash) -> bitcoin::ecdsa::Signature,
) -> Result<(), ContractError> {
    let outpoints = crate::refund::load_outpoints(datastore, order_id)
        .map_err(|_| ContractError::OrderNotFound(order_id.to_string()))?;
    if buyer_sigs.len() != outpoints.len() {
        return Err(ContractError::ReceiptSignatureInvalid);
    }

    let network = if testnet { bitcoin::Network::Testnet } else { bitcoin::Network::Bitcoin };
    let vendor_address = Address::from_str(vendor_address_str)
        .map_err(|_| ContractError::MissingSection("vendor_offer.listing.payout_address"))?
        .require_network(network)
        .map_err(|_| ContractError::MissingSection("vendor_offer.listing.payout_address"))?;

    let total_sat: u64 = outpoints.iter().map(|o| o.value_sat).sum();
    let tx_ins: Vec<TxIn> = outpoints.iter().map(|o| TxIn { previous_output: o.outpoint, ..Default::default() }).collect();
    let tx_outs = vec![TxOut { value: Amount::from_sat(total_sat), script_pubkey: vendor_address.script_pubkey() }];
    let mut tx = Transaction { version: bitcoin::transaction::Version::TWO, lock_time: bitcoin::absolute::LockTime::ZERO, input: tx_ins, output: tx_outs };

    let sighashes: Vec<bitcoin::sighash::LegacySighash> = {
        let mut cache = SighashCache::new(&tx);
        outpoints
            .iter()
            .enumerate()
            .map(|(index, outpoint)| {
                cache
                    .legacy_signature_hash(index, &outpoint.script_pubkey, EcdsaSighashType::All.to_u32())
                    .map_err(|_| ContractError::OrderNotFound(order_id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    for (index, outpoint) in outpoints.iter().enumerate() {
        let vendor_sig = vendor_sign_input(index, outpoint, &sighashes[index]);
        let buyer_sig_hex = buyer_sigs[index]
            .get("signature")
            .and_then(Value::as_str)
            .ok_or(ContractError::MissingSection("buyer_receipt.signatures[].signature"))?;
        let buyer_sig_bytes =
            hex_decode(buyer_sig_hex).ok_or(ContractError::MissingSection("buyer_receipt.signatures[].signature"))?;
        let buyer_sig = bitcoin::ecdsa::Signature::from_slice(&buyer_sig_bytes)
            .map_err(|_| ContractError::MissingSection("buyer_receipt.signatures[].signature"))?;

        let mut builder = bitcoin::blockdata::script::Builder::new();
        builder = builder.push_opcode(bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0.into());
        builder = builder.push_slice(buyer_sig.serialize());
        builder = builder.push_slice(vendor_sig.serialize());
        builder = builder.push_slice(outpoint.script_pubkey.as_bytes());
        tx.input[index].script_sig = builder.into_script();
    }

    let signed_bytes = bitcoin::consensus::encode::serialize(&tx);
    blockchain.broadcast(&signed_bytes).map_err(ContractError::Broadcast)
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};
    use rand_core::OsRng;
    use serde_json::json;

    use super::*;

    fn hex_encode(bytes: [u8; 64]) -> String { bytes.iter().map(|b| format!("{b:02x}")).collect() }

    fn sign_order(key: &SigningKey, order: &mut Value) {
        let payload = serde_json::to_vec(order).unwrap();
        let sig = key.sign(&payload).to_bytes();
        order.as_object_mut().unwrap().insert("signature".into(), json!(hex_encode(sig)));
    }

    #[test]
    fn verify_accepts_well_formed_contract() {
        let buyer = SigningKey::generate(&mut OsRng);
        let mut order = json!({
            "payment": {"address": "bcrt1qexample", "chaincode": "00", "amount": 100000},
        });
        sign_order(&buyer, &mut order);

        let doc = json!({
            "vendor_offer": {"listing": {"contract_id": "abc123"}},
            "buyer_order": {"order": order},
        });
        let contract = Contract::new(doc, true);
        assert!(contract.verify(&buyer.verifying_key()).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_amount() {
        let buyer = SigningKey::generate(&mut OsRng);
        let mut order = json!({
            "payment": {"address": "bcrt1qexample", "chaincode": "00", "amount": 100000},
        });
        sign_order(&buyer, &mut order);
        order["payment"]["amount"] = json!(999999999u64);

        let doc = json!({
            "vendor_offer": {"listing": {"contract_id": "abc123"}},
            "buyer_order": {"order": order},
        });
        let contract = Contract::new(doc, true);
        assert!(contract.verify(&buyer.verifying_key()).is_err());
    }

    #[test]
    fn verify_rejects_missing_section() {
        let buyer = SigningKey::generate(&mut OsRng);
        let doc = json!({"vendor_offer": {"listing": {}}});
        let contract = Contract::new(doc, true);
        assert!(matches!(contract.verify(&buyer.verifying_key()), Err(ContractError::MissingSection(_))));
    }

    struct NullSink;
    impl NotificationSink for NullSink {
        fn notify(&self, _: Guid, _: String, _: &'static str, _: String, _: String, _: String) {}
    }

    struct MemDatastore {
        outpoints: Vec<u8>,
        status: std::cell::Cell<u8>,
    }
    impl Datastore for MemDatastore {
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
        fn get_outpoint_blob(&self, _: &str) -> Option<Vec<u8>> { Some(self.outpoints.clone()) }
        fn update_sale_status(&self, _: &str, code: u8) { self.status.set(code); }
    }

    #[derive(Default)]
    struct MemChain {
        broadcast_called: std::cell::Cell<bool>,
    }
    impl Blockchain for MemChain {
        fn testnet(&self) -> bool { true }
        fn watch_address(&self, _: &str, _: u64, _: Box<dyn FnOnce() + Send>) {}
        fn broadcast(&self, _: &[u8]) -> Result<(), String> {
            self.broadcast_called.set(true);
            Ok(())
        }
    }

    fn signed_receipt(buyer: &SigningKey, vendor_sig_hex: &str) -> Value {
        let mut unsigned = json!({"order_id": "order-9", "signatures": [{"signature": vendor_sig_hex}]});
        let payload = serde_json::to_vec(&unsigned).unwrap();
        let sig = buyer.sign(&payload).to_bytes();
        unsigned.as_object_mut().unwrap().insert("signature".into(), json!(hex_encode(sig)));
        unsigned
    }

    fn escrow_sig(scalar: &curve25519_dalek::scalar::Scalar) -> String {
        use bitcoin::hashes::Hash;
        let sighash = bitcoin::sighash::LegacySighash::all_zeros();
        let sig = crypto::sign_escrow_sighash(scalar, &sighash).unwrap();
        sig.serialize().iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn accept_receipt_rejects_forged_signature() {
        let buyer = SigningKey::generate(&mut OsRng);
        let forger = SigningKey::generate(&mut OsRng);
        let vendor_scalar = crypto::derive_child_private_scalar(&crypto::master_scalar_from_seed(&[5u8; 32]), &[6u8; 32]);
        let receipt = signed_receipt(&forger, &escrow_sig(&vendor_scalar));

        let doc = json!({
            "vendor_offer": {"listing": {"payout_address": "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3"}},
            "buyer_receipt": receipt,
        });
        let contract = Contract::new(doc, true);
        let datastore = MemDatastore { outpoints: Vec::new(), status: std::cell::Cell::new(0) };
        let chain = MemChain::default();
        let sink = NullSink;

        let result = contract.accept_receipt(
            &datastore,
            &chain,
            &sink,
            "order-9",
            Guid([3u8; 20]),
            &buyer.verifying_key(),
            |_, _, sighash| crypto::sign_escrow_sighash(&vendor_scalar, sighash).unwrap(),
        );
        assert!(matches!(result, Err(ContractError::ReceiptSignatureInvalid)));
        assert!(!chain.broadcast_called.get());
    }

    #[test]
    fn accept_receipt_releases_escrow_on_valid_signature() {
        let buyer = SigningKey::generate(&mut OsRng);
        let vendor_scalar = crypto::derive_child_private_scalar(&crypto::master_scalar_from_seed(&[5u8; 32]), &[6u8; 32]);
        let receipt = signed_receipt(&buyer, &escrow_sig(&vendor_scalar));

        let txid = "00".repeat(32);
        let outpoints = json!([{"txid": txid, "vout": 0, "value": 100_000u64, "scriptPubKey": "76a914000000000000000000000000000000000000000088ac"}]);
        let doc = json!({
            "vendor_offer": {"listing": {"payout_address": "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3"}},
            "buyer_receipt": receipt,
        });
        let contract = Contract::new(doc, true);
        let datastore = MemDatastore { outpoints: serde_json::to_vec(&outpoints).unwrap(), status: std::cell::Cell::new(0) };
        let chain = MemChain::default();
        let sink = NullSink;

        let result = contract.accept_receipt(
            &datastore,
            &chain,
            &sink,
            "order-9",
            Guid([3u8; 20]),
            &buyer.verifying_key(),
            |_, _, sighash| crypto::sign_escrow_sighash(&vendor_scalar, sighash).unwrap(),
        );
        assert!(result.is_ok());
        assert_eq!(datastore.status.get(), 0);
        assert!(chain.broadcast_called.get());
    }
}
