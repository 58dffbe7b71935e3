// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Refund flow (§4.4). Builds, co-signs, and broadcasts the refund
//! multisig transaction, then moves the order record from "in progress" to
//! "trade receipts". Signature pairing by input index is grounded on the
//! coinswap protocol's `ContractSigsForRecvrAndSender { receivers_sigs,
//! senders_sigs }` shape: one vector per counterparty, matched positionally.

use std::str::FromStr;

use bazaarrpc::Guid;
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, Transaction, TxIn, TxOut};
use serde_json::Value;

use crate::external::{Blockchain, Datastore, NotificationSink};

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum RefundError {
    /// order {0} is not in the "in progress" bucket.
    OrderNotFound(String),

    /// refund block is missing required field: {0}
    MissingField(&'static str),

    /// persisted outpoint blob for order {0} could not be parsed.
    BadOutpoints(String),

    /// signature count mismatch: {0} inputs but {1} vendor signatures.
    SignatureCountMismatch(usize, usize),

    /// invalid refund address.
    BadAddress,

    /// blockchain broadcast failed: {0}
    Broadcast(String),
}

pub(crate) struct Outpoint {
    pub(crate) outpoint: OutPoint,
    pub(crate) value_sat: u64,
    pub(crate) script_pubkey: ScriptBuf,
}

pub(crate) fn load_outpoints(datastore: &dyn Datastore, order_id: &str) -> Result<Vec<Outpoint>, RefundError> {
    let blob = datastore
        .get_outpoint_blob(order_id)
        .ok_or_else(|| RefundError::BadOutpoints(order_id.to_string()))?;
    let rows: Vec<Value> =
        serde_json::from_slice(&blob).map_err(|_| RefundError::BadOutpoints(order_id.to_string()))?;
    rows.into_iter()
        .map(|row| {
            let txid = row.get("txid").and_then(Value::as_str).ok_or(RefundError::MissingField("txid"))?;
            let vout = row.get("vout").and_then(Value::as_u64).ok_or(RefundError::MissingField("vout"))? as u32;
            let value_sat = row.get("value").and_then(Value::as_u64).ok_or(RefundError::MissingField("value"))?;
            let script_hex =
                row.get("scriptPubKey").and_then(Value::as_str).ok_or(RefundError::MissingField("scriptPubKey"))?;
            let script_bytes =
                hex_decode(script_hex).ok_or_else(|| RefundError::BadOutpoints(order_id.to_string()))?;
            Ok(Outpoint {
                outpoint: OutPoint { txid: txid.parse().map_err(|_| RefundError::BadOutpoints(order_id.to_string()))?, vout },
                value_sat,
                script_pubkey: ScriptBuf::from_bytes(script_bytes),
            })
        })
        .collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len()).step_by(2).map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok()).collect()
}

/// Processes a REFUND opcode payload (§4.4). `refund_block` is the decrypted
/// `refund` JSON object; `buyer_sign_input` produces the buyer's signature
/// over input `index`'s legacy sighash for the redeem script, derived by the
/// caller from the local wallet master private key and the contract's
/// chaincode (§4.1 private child-key derivation) — this function only
/// supplies the sighash to sign, staying agnostic of how that key material
/// is derived.
pub fn process_refund(
    datastore: &dyn Datastore,
    blockchain: &dyn Blockchain,
    sink: &dyn NotificationSink,
    order_id: &str,
    refund_block: &Value,
    buyer_guid: Guid,
    buyer_handle: Option<String>,
    buyer_sign_input: impl Fn(usize, &Outpoint, &bitcoin::sighash::LegacySighash) -> bitcoin::ecdsa::Signature,
) -> Result<(), RefundError> {
    let mut order = datastore
        .load_order(order_id)
        .ok_or_else(|| RefundError::OrderNotFound(order_id.to_string()))?;
    order
        .as_object_mut()
        .ok_or_else(|| RefundError::OrderNotFound(order_id.to_string()))?
        .insert("refund".to_string(), refund_block.clone());

    let title = order
        .get("vendor_offer")
        .and_then(|v| v.get("listing"))
        .and_then(|v| v.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let image_hash = order
        .get("vendor_offer")
        .and_then(|v| v.get("listing"))
        .and_then(|v| v.get("image_hashes"))
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if refund_block.get("txid").is_none() {
        broadcast_refund_tx(datastore, blockchain, order_id, refund_block, &buyer_sign_input)?;
    }

    datastore.update_sale_status(order_id, 7);
    datastore.move_order_to_receipts(order_id, &order);

    sink.notify(buyer_guid, buyer_handle.unwrap_or_default(), "refund", order_id.to_string(), title, image_hash);
    Ok(())
}

fn broadcast_refund_tx(
    datastore: &dyn Datastore,
    blockchain: &dyn Blockchain,
    order_id: &str,
    refund_block: &Value,
    buyer_sign_input: &impl Fn(usize, &Outpoint, &bitcoin::sighash::LegacySighash) -> bitcoin::ecdsa::Signature,
) -> Result<(), RefundError> {
    let outpoints = load_outpoints(datastore, order_id)?;

    let refund_value_btc = refund_block.get("value").and_then(Value::as_f64).ok_or(RefundError::MissingField("value"))?;
    let refund_value_sat = (refund_value_btc * 100_000_000.0).round() as u64;
    let refund_address_str =
        refund_block.get("refund_address").and_then(Value::as_str).ok_or(RefundError::MissingField("refund_address"))?;
    let network = if blockchain.testnet() { bitcoin::Network::Testnet } else { bitcoin::Network::Bitcoin };
    let refund_address = Address::from_str(refund_address_str)
        .map_err(|_| RefundError::BadAddress)?
        .require_network(network)
        .map_err(|_| RefundError::BadAddress)?;

    let vendor_sigs = refund_block
        .get("signatures")
        .and_then(Value::as_array)
        .ok_or(RefundError::MissingField("signatures"))?;
    if vendor_sigs.len() != outpoints.len() {
        return Err(RefundError::SignatureCountMismatch(outpoints.len(), vendor_sigs.len()));
    }

    let tx_ins: Vec<TxIn> = outpoints
        .iter()
        .map(|o| TxIn { previous_output: o.outpoint, ..Default::default() })
        .collect();
    let tx_outs = vec![TxOut { value: Amount::from_sat(refund_value_sat), script_pubkey: refund_address.script_pubkey() }];
    let mut tx = Transaction { version: bitcoin::transaction::Version::TWO, lock_time: bitcoin::absolute::LockTime::ZERO, input: tx_ins, output: tx_outs };

    let sighashes: Vec<bitcoin::sighash::LegacySighash> = {
        let mut cache = SighashCache::new(&tx);
        outpoints
            .iter()
            .enumerate()
            .map(|(index, outpoint)| {
                cache
                    .legacy_signature_hash(index, &outpoint.script_pubkey, EcdsaSighashType::All.to_u32())
                    .map_err(|_| RefundError::BadOutpoints(order_id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    // Pair the buyer signature at each input index with the vendor
    // signature at the same index — the by-index matching contract (§4.4,
    // §8) rather than assuming any particular ordering in the wire payload.
    for (index, outpoint) in outpoints.iter().enumerate() {
        let buyer_sig = buyer_sign_input(index, outpoint, &sighashes[index]);
        let vendor_sig_hex = vendor_sigs[index]
            .get("signature")
            .and_then(Value::as_str)
            .ok_or(RefundError::MissingField("signatures[].signature"))?;
        let vendor_sig_bytes = hex_decode(vendor_sig_hex).ok_or(RefundError::MissingField("signatures[].signature"))?;
        let vendor_sig = bitcoin::ecdsa::Signature::from_slice(&vendor_sig_bytes)
            .map_err(|_| RefundError::MissingField("signatures[].signature"))?;

        let mut builder = bitcoin::blockdata::script::Builder::new();
        builder = builder.push_opcode(bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0.into());
        builder = builder.push_slice(buyer_sig.serialize());
        builder = builder.push_slice(vendor_sig.serialize());
        builder = builder.push_slice(outpoint.script_pubkey.as_bytes());
        tx.input[index].script_sig = builder.into_script();
    }

    let signed_bytes = bitcoin::consensus::encode::serialize(&tx);
    blockchain.broadcast(&signed_bytes).map_err(RefundError::Broadcast)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl NotificationSink for NullSink {
        fn notify(&self, _: Guid, _: String, _: &'static str, _: String, _: String, _: String) {}
    }

    struct MemDatastore {
        outpoints: Vec<u8>,
        status: std::cell::Cell<u8>,
        moved: std::cell::RefCell<Option<Value>>,
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
        fn load_order(&self, _: &str) -> Option<Value> { Some(serde_json::json!({"vendor_offer": {"listing": {}}})) }
        fn save_order_in_progress(&self, _: &str, _: &Value) {}
        fn move_order_to_receipts(&self, _: &str, doc: &Value) { *self.moved.borrow_mut() = Some(doc.clone()); }
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

    #[test]
    fn refund_sets_status_and_moves_order() {
        let datastore = MemDatastore {
            outpoints: Vec::new(),
            status: std::cell::Cell::new(0),
            moved: std::cell::RefCell::new(None),
        };
        let chain = MemChain::default();
        let sink = NullSink;
        let refund_block = serde_json::json!({"value": 0.001, "txid": "already-broadcast"});
        process_refund(
            &datastore,
            &chain,
            &sink,
            "order-1",
            &refund_block,
            Guid([1u8; 20]),
            None,
            |_, _, _| unreachable!("txid present, no broadcast needed"),
        )
        .unwrap();
        assert_eq!(datastore.status.get(), 7);
        assert!(datastore.moved.borrow().is_some());
        assert!(!chain.broadcast_called.get());
    }

    /// Refund with fresh broadcast: the block carries no `txid`, so the
    /// full build/co-sign/broadcast path must run and the buyer-side
    /// signing closure must actually be invoked instead of panicking.
    #[test]
    fn refund_without_txid_builds_and_broadcasts() {
        use bitcoin::hashes::Hash;

        let txid = "00".repeat(32);
        let script_hex = "76a914000000000000000000000000000000000000000088ac";
        let outpoints = serde_json::json!([
            {"txid": txid, "vout": 0, "value": 150_000u64, "scriptPubKey": script_hex},
        ]);
        let datastore = MemDatastore {
            outpoints: serde_json::to_vec(&outpoints).unwrap(),
            status: std::cell::Cell::new(0),
            moved: std::cell::RefCell::new(None),
        };
        let chain = MemChain::default();
        let sink = NullSink;

        let buyer_master = crate::crypto::master_scalar_from_seed(&[7u8; 32]);
        let buyer_child = crate::crypto::derive_child_private_scalar(&buyer_master, &[9u8; 32]);
        let vendor_master = crate::crypto::master_scalar_from_seed(&[8u8; 32]);
        let vendor_child = crate::crypto::derive_child_private_scalar(&vendor_master, &[9u8; 32]);
        // Stand in for the vendor signature already carried over the wire
        // in the refund block; any syntactically valid ECDSA signature
        // over some sighash parses, since the test only exercises the
        // broadcast path, not script validity.
        let placeholder_sighash = bitcoin::sighash::LegacySighash::all_zeros();
        let vendor_sig = crate::crypto::sign_escrow_sighash(&vendor_child, &placeholder_sighash).unwrap();
        let vendor_sig_hex: String = vendor_sig.serialize().iter().map(|b| format!("{b:02x}")).collect();

        let refund_block = serde_json::json!({
            "value": 0.0015,
            "refund_address": "tb1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3",
            "signatures": [
                {"signature": vendor_sig_hex},
            ],
        });

        process_refund(
            &datastore,
            &chain,
            &sink,
            "order-2",
            &refund_block,
            Guid([2u8; 20]),
            Some("buyer".into()),
            |_, _, sighash| crate::crypto::sign_escrow_sighash(&buyer_child, sighash).unwrap(),
        )
        .unwrap();

        assert_eq!(datastore.status.get(), 7);
        assert!(datastore.moved.borrow().is_some());
        assert!(chain.broadcast_called.get());
    }
}
