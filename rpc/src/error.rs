// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors raised while marshalling or unmarshalling a wire frame.
#[derive(Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum CodecError {
    /// I/O error while framing a message.
    ///
    /// {0}
    #[from]
    Io(io::Error),

    /// malformed CBOR payload.
    ///
    /// {0}
    #[from]
    Cbor(serde_cbor_2::Error),
}
