// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use ed25519_dalek::VerifyingKey;

/// 20-byte node identifier, the first 20 bytes of `SHA-512(pubkey)`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[derive(Serialize, Deserialize)]
pub struct Guid(pub [u8; 20]);

impl Guid {
    pub fn from_hex(s: &str) -> Result<Self, GuidParseError> {
        if s.len() != 40 {
            return Err(GuidParseError::WrongLength(s.len()));
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| GuidParseError::NotHex)?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| GuidParseError::NotHex)?;
        }
        Ok(Guid(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Guid({})", self.to_hex()) }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_hex()) }
}

#[derive(Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum GuidParseError {
    /// guid hex string has wrong length {0}, expected 40.
    WrongLength(usize),
    /// guid is not valid hex.
    NotHex,
}

/// Descriptor of a remote peer as handed to a handler by the (external)
/// transport, after it has bound an inbound datagram to a known or
/// newly-discovered contact.
#[derive(Clone, Debug)]
pub struct PeerDescriptor {
    pub guid: Guid,
    pub pubkey: VerifyingKey,
    pub address: String,
}

/// The 19 opcodes of the marketplace RPC protocol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display)]
#[derive(Serialize, Deserialize)]
pub enum Opcode {
    #[display("GET_CONTRACT")]
    GetContract,
    #[display("GET_IMAGE")]
    GetImage,
    #[display("GET_PROFILE")]
    GetProfile,
    #[display("GET_USER_METADATA")]
    GetUserMetadata,
    #[display("GET_LISTINGS")]
    GetListings,
    #[display("GET_CONTRACT_METADATA")]
    GetContractMetadata,
    #[display("FOLLOW")]
    Follow,
    #[display("UNFOLLOW")]
    Unfollow,
    #[display("GET_FOLLOWERS")]
    GetFollowers,
    #[display("GET_FOLLOWING")]
    GetFollowing,
    #[display("BROADCAST")]
    Broadcast,
    #[display("MESSAGE")]
    Message,
    #[display("ORDER")]
    Order,
    #[display("ORDER_CONFIRMATION")]
    OrderConfirmation,
    #[display("COMPLETE_ORDER")]
    CompleteOrder,
    #[display("DISPUTE_OPEN")]
    DisputeOpen,
    #[display("DISPUTE_CLOSE")]
    DisputeClose,
    #[display("GET_RATINGS")]
    GetRatings,
    #[display("REFUND")]
    Refund,
}

impl Opcode {
    pub const ALL: [Opcode; 19] = [
        Opcode::GetContract,
        Opcode::GetImage,
        Opcode::GetProfile,
        Opcode::GetUserMetadata,
        Opcode::GetListings,
        Opcode::GetContractMetadata,
        Opcode::Follow,
        Opcode::Unfollow,
        Opcode::GetFollowers,
        Opcode::GetFollowing,
        Opcode::Broadcast,
        Opcode::Message,
        Opcode::Order,
        Opcode::OrderConfirmation,
        Opcode::CompleteOrder,
        Opcode::DisputeOpen,
        Opcode::DisputeClose,
        Opcode::GetRatings,
        Opcode::Refund,
    ];
}

/// Maximum length, in bytes, accepted for a BROADCAST payload.
pub const BROADCAST_MAX_LEN: usize = 140;

/// Proof-of-work gate: `int(SHA-512(pubkey)[40:46], 16)` must be strictly
/// below this bound for a sender pubkey to be accepted by MESSAGE/ORDER/etc.
pub const POW_TARGET: u32 = 50;
