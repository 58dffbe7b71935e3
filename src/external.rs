// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! External collaborator contracts (§6). These traits describe the
//! boundary between this crate and the transport, datastore, and
//! blockchain subsystems, which are explicitly out of scope for this
//! crate's implementation.

use bazaarrpc::Guid;

/// Per-bucket datastore contract. A concrete implementation persists
/// beneath a storage-root handle the way the original persists beneath a
/// process-wide data folder (§9: modeled here as an injected handle rather
/// than module-global state).
pub trait Datastore {
    fn get_file(&self, hex_hash: &str) -> Option<Vec<u8>>;

    /// The node's own profile, structured (as opposed to [`Datastore::get_file`]'s
    /// opaque signed-blob view used by GET_PROFILE). Backs GET_USER_METADATA
    /// and the handle/avatar_hash overlay applied to listings responses.
    fn get_profile(&self) -> Option<crate::codec::Profile>;

    fn set_follower(&self, record: &[u8]);
    fn delete_follower(&self, guid: &Guid);
    fn is_following(&self, guid: &Guid) -> bool;
    fn get_followers(&self) -> Vec<u8>;
    fn get_following(&self) -> Vec<u8>;

    fn get_listings_proto(&self) -> Vec<u8>;

    fn get_listing_ratings(&self, hex_hash: &str) -> Vec<serde_json::Value>;
    fn get_all_ratings(&self) -> Vec<serde_json::Value>;

    fn load_order(&self, order_id: &str) -> Option<serde_json::Value>;
    fn save_order_in_progress(&self, order_id: &str, doc: &serde_json::Value);
    fn move_order_to_receipts(&self, order_id: &str, doc: &serde_json::Value);

    fn get_outpoint_blob(&self, order_id: &str) -> Option<Vec<u8>>;
    fn update_sale_status(&self, order_id: &str, code: u8);
}

/// Blockchain gateway contract: UTXO watching and transaction broadcast.
/// The watch callback fires at most once per registration; repeated
/// funding events for an already-notified contract must not re-fire it
/// (§8 idempotence).
pub trait Blockchain {
    fn testnet(&self) -> bool;

    fn watch_address(&self, address: &str, min_value_sat: u64, on_funded: Box<dyn FnOnce() + Send>);

    fn broadcast(&self, signed_tx: &[u8]) -> Result<(), String>;
}

/// Sink for "follow" / "order" / "order confirmed" / "order completed" /
/// "refund" notifications (§4.6).
pub trait NotificationSink {
    fn notify(&self, guid: Guid, handle: String, kind: &'static str, sub_id: String, title: String, image_hash: String);
}

/// Sink for decrypted private messages (§4.6).
pub trait MessageSink {
    fn deliver(&self, message: &[u8], signature: &[u8; 64]);
}

/// Sink for accepted BROADCAST payloads (§4.6).
pub trait BroadcastSink {
    fn broadcast(&self, guid: Guid, message: &[u8]);
}

/// Moderation subsystem collaborator for the dispute flow (C5). Moderator
/// selection is out of scope here (see DESIGN.md); callers hand in an
/// already-resolved sink.
pub trait ModerationSink {
    fn open(&self, order_id: &str, claim: &[u8]);
    fn close(&self, order_id: &str, resolution: &[u8]);
}
