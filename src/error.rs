// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use crate::contract::ContractError;
use crate::crypto::CryptoError;
use crate::refund::RefundError;

/// Top-level internal error, never surfaced to a peer directly (§7):
/// handlers fold every `Err` arm into a rejected `RpcResponse` after
/// logging the detail carried here.
#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum NodeError {
    /// cryptographic operation failed.
    ///
    /// {0}
    #[from]
    Crypto(CryptoError),

    /// contract validation failed.
    ///
    /// {0}
    #[from]
    Contract(ContractError),

    /// refund processing failed.
    ///
    /// {0}
    #[from]
    Refund(RefundError),

    /// malformed message payload: {0}
    Malformed(&'static str),

    /// datastore operation failed: {0}
    Datastore(String),

    /// blockchain collaborator failed: {0}
    Blockchain(String),
}
