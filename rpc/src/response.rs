// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::io::{Cursor, Read, Write};

use crate::error::CodecError;
use crate::frame::{CborFrame, Frame};

/// The literal truthy/falsy markers the protocol uses in place of a proper
/// boolean type, carried over from the original wire contract.
pub const TRUE_MARKER: &[u8] = b"True";
pub const FALSE_MARKER: &[u8] = b"False";

/// Wire-level response: an ordered sequence of byte strings.
///
/// Lookup handlers answer with `RpcResponse::not_found()` (the empty
/// sequence) when nothing matches; authenticated mutation handlers answer
/// with `RpcResponse::rejected()` (`["False"]`) on any authentication or
/// validation failure, and `RpcResponse::accepted()` / `RpcResponse::ok(..)`
/// on success. Content handlers carry `(payload, signature)` pairs.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[derive(Serialize, Deserialize)]
pub struct RpcResponse(pub Vec<Vec<u8>>);

impl RpcResponse {
    pub fn not_found() -> Self { RpcResponse(Vec::new()) }

    pub fn rejected() -> Self { RpcResponse(vec![FALSE_MARKER.to_vec()]) }

    pub fn accepted() -> Self { RpcResponse(vec![TRUE_MARKER.to_vec()]) }

    pub fn ok(parts: Vec<Vec<u8>>) -> Self { RpcResponse(parts) }

    /// True when the first element is present and is not the `"False"`
    /// marker — the truthiness test the client stubs use to decide whether
    /// a peer answered meaningfully (see `rpc_client`'s routing-table
    /// feedback).
    pub fn is_truthy(&self) -> bool {
        match self.0.first() {
            None => false,
            Some(first) => first.as_slice() != FALSE_MARKER,
        }
    }

    pub fn is_found(&self) -> bool { !self.0.is_empty() }
}

impl Frame for RpcResponse {
    type Error = CodecError;

    fn unmarshall(reader: impl Read) -> Result<Option<Self>, Self::Error> {
        let Some(frame) = CborFrame::unmarshall(reader)? else {
            return Ok(None);
        };
        let cursor = Cursor::new(frame.0);
        serde_cbor_2::from_reader(cursor)
            .map(Some)
            .map_err(CodecError::from)
    }

    fn marshall(&self, writer: impl Write) -> Result<(), Self::Error> {
        let mut buf = Vec::with_capacity(256);
        serde_cbor_2::to_writer(&mut buf, self)?;
        CborFrame(buf).marshall(writer).map_err(CodecError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_empty_is_false() {
        assert!(!RpcResponse::not_found().is_truthy());
        assert!(!RpcResponse::not_found().is_found());
    }

    #[test]
    fn truthy_rejected_is_false() {
        assert!(!RpcResponse::rejected().is_truthy());
        assert!(RpcResponse::rejected().is_found());
    }

    #[test]
    fn truthy_accepted_is_true() {
        assert!(RpcResponse::accepted().is_truthy());
    }

    #[test]
    fn round_trip() {
        let resp = RpcResponse::ok(vec![b"payload".to_vec(), vec![1, 2, 3, 4]]);
        let mut buf = Vec::new();
        resp.marshall(&mut buf).unwrap();
        let deser = RpcResponse::unmarshall(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(deser, resp);
    }
}
