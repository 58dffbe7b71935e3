// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Message codec (§4, §9): the structured message types exchanged over the
//! wire — profile, metadata, listings index, follower records, and
//! plaintext messages — plus the sign-then-clear-then-verify helper shared
//! by FOLLOW and MESSAGE.
//!
//! Follows the original's convention of signing the canonical serialization
//! with the signature field absent, then re-attaching it: callers build the
//! unsigned struct, call [`sign_detached`], and only then set `signature`.

use bazaarrpc::Guid;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, CryptoError};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub handle: String,
    pub about: String,
    pub short_description: String,
    pub avatar_hash: String,
    pub nsfw: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub handle: String,
    pub avatar_hash: String,
    pub short_description: String,
    pub nsfw: bool,
}

impl From<&Profile> for Metadata {
    fn from(p: &Profile) -> Self {
        Metadata {
            name: p.name.clone(),
            handle: p.handle.clone(),
            avatar_hash: p.avatar_hash.clone(),
            short_description: p.short_description.clone(),
            nsfw: p.nsfw,
        }
    }
}

/// A listing as carried in the index. `handle`/`avatar_hash` are the node's
/// current values overlaid at serve time (§3) and are never read back from
/// storage, so a stored entry predating these fields still deserializes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingEntry {
    pub contract_hash: String,
    pub title: String,
    pub image_hashes: Vec<String>,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub avatar_hash: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListingsIndex {
    pub entries: Vec<ListingEntry>,
}

/// A follow record (§3). `signature` covers the canonical serialization of
/// every other field; it is cleared before signing/verifying and restored
/// afterward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Follower {
    pub guid: Guid,
    pub following: Guid,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<[u8; 64]>,
}

impl Follower {
    fn unsigned_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned).expect("Follower serializes infallibly")
    }

    pub fn sign(&mut self, key: &SigningKey) { self.signature = Some(crypto::sign(key, &self.unsigned_bytes())); }

    /// Verifies the attached signature was produced by `guid`'s claimed
    /// pubkey, and that the record's own guid/following fields satisfy the
    /// FOLLOW invariants (§8): `guid == sender` and `following == local`.
    pub fn verify(&self, sender: &Guid, sender_pubkey: &VerifyingKey, local_guid: &Guid) -> Result<(), CryptoError> {
        if &self.guid != sender || &self.following != local_guid {
            return Err(CryptoError::BadSignature);
        }
        let sig = self.signature.ok_or(CryptoError::BadSignature)?;
        crypto::verify(sender_pubkey, &self.unsigned_bytes(), &sig)
    }
}

/// A decrypted plaintext message body, as recovered from a MESSAGE sealed
/// box. `sender_pubkey` is embedded so the recipient can run the
/// proof-of-work gate (§8) without a prior handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaintextMessage {
    pub sender_pubkey: [u8; 32],
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<[u8; 64]>,
}

impl PlaintextMessage {
    fn unsigned_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.clone();
        unsigned.signature = None;
        serde_json::to_vec(&unsigned).expect("PlaintextMessage serializes infallibly")
    }

    pub fn sign(&mut self, key: &SigningKey) { self.signature = Some(crypto::sign(key, &self.unsigned_bytes())); }

    pub fn verify(&self, sender_pubkey: &VerifyingKey) -> Result<(), CryptoError> {
        let sig = self.signature.ok_or(CryptoError::BadSignature)?;
        crypto::verify(sender_pubkey, &self.unsigned_bytes(), &sig)
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;

    use super::*;
    use crate::crypto::guid_from_pubkey;

    #[test]
    fn follower_round_trip_verifies() {
        let local = SigningKey::generate(&mut OsRng);
        let remote = SigningKey::generate(&mut OsRng);
        let local_guid = guid_from_pubkey(&local.verifying_key());
        let remote_guid = guid_from_pubkey(&remote.verifying_key());

        let mut follower = Follower {
            guid: remote_guid,
            following: local_guid,
            metadata: Metadata { name: "alice".into(), ..Default::default() },
            signature: None,
        };
        follower.sign(&remote);

        let bytes = serde_json::to_vec(&follower).unwrap();
        let parsed: Follower = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.verify(&remote_guid, &remote.verifying_key(), &local_guid).is_ok());
    }

    #[test]
    fn follower_rejects_wrong_target() {
        let local = SigningKey::generate(&mut OsRng);
        let remote = SigningKey::generate(&mut OsRng);
        let other_guid = guid_from_pubkey(&local.verifying_key());
        let remote_guid = guid_from_pubkey(&remote.verifying_key());

        let mut follower = Follower {
            guid: remote_guid,
            following: other_guid,
            metadata: Metadata::default(),
            signature: None,
        };
        follower.sign(&remote);

        let not_local = guid_from_pubkey(&remote.verifying_key());
        assert!(follower.verify(&remote_guid, &remote.verifying_key(), &not_local).is_err());
    }
}
