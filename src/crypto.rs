// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Crypto primitives (§4.1): Ed25519 sign/verify, guid derivation, the
//! Ed25519-to-X25519 conversion used to derive a node's sealed-box key from
//! its signing key (§9), authenticated sealed boxes, and HD child-key
//! derivation for the buyer/vendor Bitcoin keys embedded in a contract.

use bazaarrpc::Guid;
use bitcoin::secp256k1::{Message, Secp256k1, SecretKey};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::montgomery::MontgomeryPoint;
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256, Sha512};
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret as XStaticSecret};

#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum CryptoError {
    /// signature verification failed.
    BadSignature,

    /// sealed box authentication failed.
    AuthenticationFailed,

    /// invalid public key encoding.
    BadPublicKey,
}

/// Derives the 20-byte node guid from a verifying key: the first 20 bytes
/// of `SHA-512(pubkey)`.
pub fn guid_from_pubkey(pubkey: &VerifyingKey) -> Guid {
    let digest = Sha512::digest(pubkey.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Guid(bytes)
}

/// Proof-of-work gate (§9, §8): `int(hex(SHA-512(pubkey))[40:46], 16)` must
/// be strictly less than [`bazaarrpc::POW_TARGET`], and the guid prefix
/// embedded in the hash must match the sender's claimed guid.
pub fn pow_gate_passes(pubkey: &VerifyingKey, claimed_guid: &Guid) -> bool {
    let digest = Sha512::digest(pubkey.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    if hex[..40] != claimed_guid.to_hex() {
        return false;
    }
    match u32::from_str_radix(&hex[40..46], 16) {
        Ok(window) => window < bazaarrpc::POW_TARGET,
        Err(_) => false,
    }
}

pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; 64] { key.sign(message).to_bytes() }

pub fn verify(pubkey: &VerifyingKey, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
    let sig = Signature::from_bytes(signature);
    pubkey.verify(message, &sig).map_err(|_| CryptoError::BadSignature)
}

/// Converts an Ed25519 signing key to its corresponding X25519 static
/// secret, per the standard birational map between twisted Edwards and
/// Montgomery curve points (RFC 7748 / libsodium's `crypto_sign_ed25519_sk_to_curve25519`).
pub fn signing_key_to_x25519(key: &SigningKey) -> XStaticSecret {
    let hash = Sha512::digest(key.as_bytes());
    let mut clamped = [0u8; 32];
    clamped.copy_from_slice(&hash[..32]);
    clamped[0] &= 248;
    clamped[31] &= 127;
    clamped[31] |= 64;
    XStaticSecret::from(clamped)
}

/// Converts an Ed25519 verifying key to its corresponding X25519 public
/// key via Edwards-to-Montgomery point conversion.
pub fn verifying_key_to_x25519(key: &VerifyingKey) -> Result<XPublicKey, CryptoError> {
    let compressed = CompressedEdwardsY::from_slice(key.as_bytes()).map_err(|_| CryptoError::BadPublicKey)?;
    let point = compressed.decompress().ok_or(CryptoError::BadPublicKey)?;
    let montgomery: MontgomeryPoint = point.to_montgomery();
    Ok(XPublicKey::from(montgomery.to_bytes()))
}

const SEALED_BOX_INFO: &[u8] = b"bazaar-node/sealed-box/v1";

fn derive_symmetric_key(shared_secret: &[u8; 32]) -> Key {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(SEALED_BOX_INFO, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    Key::from(okm)
}

/// Authenticated-encrypts `plaintext` for `their_identity` using a fresh
/// ephemeral X25519 keypair, returning `(ephemeral_pubkey, ciphertext)` —
/// the `(ephem_pubkey, ciphertext)` pair carried by MESSAGE/ORDER/etc.
pub fn seal(
    rng: &mut (impl RngCore + CryptoRng),
    their_identity: &VerifyingKey,
    plaintext: &[u8],
) -> Result<([u8; 32], Vec<u8>), CryptoError> {
    let their_x25519 = verifying_key_to_x25519(their_identity)?;
    let ephemeral = XStaticSecret::random_from_rng(rng);
    let ephemeral_pub = XPublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&their_x25519);
    let key = derive_symmetric_key(shared.as_bytes());
    let cipher = XChaCha20Poly1305::new(&key);
    let mut nonce_bytes = [0u8; 24];
    rng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from(nonce_bytes);
    let mut ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad: &[] })
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    let mut out = nonce_bytes.to_vec();
    out.append(&mut ciphertext);
    Ok((ephemeral_pub.to_bytes(), out))
}

/// Opens a sealed box addressed to `my_identity` using the sender's
/// ephemeral public key, reversing [`seal`].
pub fn open(
    my_identity: &SigningKey,
    ephemeral_pub: &[u8; 32],
    nonce_and_ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if nonce_and_ciphertext.len() < 24 {
        return Err(CryptoError::AuthenticationFailed);
    }
    let (nonce_bytes, ciphertext) = nonce_and_ciphertext.split_at(24);
    let my_x25519 = signing_key_to_x25519(my_identity);
    let their_pub = XPublicKey::from(*ephemeral_pub);
    let shared = my_x25519.diffie_hellman(&their_pub);
    let key = derive_symmetric_key(shared.as_bytes());
    let cipher = XChaCha20Poly1305::new(&key);
    let nonce = XNonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Derives a child public key from a master extended public key and chain
/// code, following the same non-hardened HMAC-SHA512 construction as BIP32
/// public derivation (§4.1). `master_pubkey` is the compressed SEC1
/// encoding of the master point; the result is the compressed SEC1
/// encoding of the child point's x-only tweak scalar, applied by the
/// caller against the actual Bitcoin public key (this function only
/// derives the tweak).
pub fn derive_child_scalar(master_pubkey: &[u8], chaincode: &[u8; 32]) -> Scalar {
    let hk = Hkdf::<Sha512>::new(Some(chaincode), master_pubkey);
    let mut okm = [0u8; 64];
    hk.expand(b"bazaar-node/child-key/v1", &mut okm)
        .expect("64 bytes is a valid HKDF-SHA512 output length");
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&okm);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Derives a child private scalar from a master private scalar and chain
/// code, the private-key counterpart of [`derive_child_scalar`] (§4.1): the
/// tweak is derived the same way, but it is added to the master scalar
/// directly instead of being applied to a public point, yielding a usable
/// signing scalar rather than a tweak for the caller to apply externally.
pub fn derive_child_private_scalar(master_scalar: &Scalar, chaincode: &[u8; 32]) -> Scalar {
    let hk = Hkdf::<Sha512>::new(Some(chaincode), master_scalar.as_bytes());
    let mut okm = [0u8; 64];
    hk.expand(b"bazaar-node/child-key/v1", &mut okm)
        .expect("64 bytes is a valid HKDF-SHA512 output length");
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&okm);
    let tweak = Scalar::from_bytes_mod_order_wide(&wide);
    master_scalar + tweak
}

/// Recovers the master private scalar from a raw 32-byte wallet seed, the
/// same clamped-hash construction [`signing_key_to_x25519`] uses to derive
/// an X25519 secret from an Ed25519 signing key, so a buyer's private
/// child key can be derived from nothing more than their wallet master
/// private key bytes.
pub fn master_scalar_from_seed(seed: &[u8; 32]) -> Scalar {
    let hash = Sha512::digest(seed);
    let mut clamped = [0u8; 32];
    clamped.copy_from_slice(&hash[..32]);
    clamped[0] &= 248;
    clamped[31] &= 127;
    clamped[31] |= 64;
    Scalar::from_bytes_mod_order(clamped)
}

/// Signs a legacy sighash for an escrow-spend input with a derived child
/// scalar reinterpreted as a secp256k1 secret key — the same child-key
/// material [`derive_child_private_scalar`] produces, consumed by the
/// REFUND and COMPLETE_ORDER escrow-release flows (§4.2, §4.4).
pub fn sign_escrow_sighash(
    child_scalar: &Scalar,
    sighash: &bitcoin::sighash::LegacySighash,
) -> Result<bitcoin::ecdsa::Signature, CryptoError> {
    let secret = SecretKey::from_slice(child_scalar.as_bytes()).map_err(|_| CryptoError::BadPublicKey)?;
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(sighash.to_byte_array());
    let signature = secp.sign_ecdsa(&message, &secret);
    Ok(bitcoin::ecdsa::Signature { signature, sighash_type: bitcoin::sighash::EcdsaSighashType::All })
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn guid_matches_sha512_prefix() {
        let key = SigningKey::generate(&mut OsRng);
        let vk = key.verifying_key();
        let guid = guid_from_pubkey(&vk);
        let digest = Sha512::digest(vk.as_bytes());
        assert_eq!(&guid.0[..], &digest[..20]);
    }

    #[test]
    fn sign_then_verify_round_trip() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = sign(&key, b"hello bazaar");
        assert!(verify(&key.verifying_key(), b"hello bazaar", &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verify() {
        let key = SigningKey::generate(&mut OsRng);
        let sig = sign(&key, b"hello bazaar");
        assert!(verify(&key.verifying_key(), b"goodbye bazaar", &sig).is_err());
    }

    #[test]
    fn sealed_box_round_trip() {
        let mut rng = OsRng;
        let recipient = SigningKey::generate(&mut rng);
        let (ephemeral_pub, ciphertext) = seal(&mut rng, &recipient.verifying_key(), b"secret order").unwrap();
        let plaintext = open(&recipient, &ephemeral_pub, &ciphertext).unwrap();
        assert_eq!(plaintext, b"secret order");
    }

    #[test]
    fn private_child_derivation_is_deterministic() {
        let seed = [9u8; 32];
        let master = master_scalar_from_seed(&seed);
        let chaincode = [3u8; 32];
        let a = derive_child_private_scalar(&master, &chaincode);
        let b = derive_child_private_scalar(&master, &chaincode);
        assert_eq!(a, b);
    }

    #[test]
    fn private_child_derivation_differs_by_chaincode() {
        let seed = [9u8; 32];
        let master = master_scalar_from_seed(&seed);
        let a = derive_child_private_scalar(&master, &[1u8; 32]);
        let b = derive_child_private_scalar(&master, &[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn sealed_box_rejects_wrong_recipient() {
        let mut rng = OsRng;
        let recipient = SigningKey::generate(&mut rng);
        let impostor = SigningKey::generate(&mut rng);
        let (ephemeral_pub, ciphertext) = seal(&mut rng, &recipient.verifying_key(), b"secret order").unwrap();
        assert!(open(&impostor, &ephemeral_pub, &ciphertext).is_err());
    }
}
