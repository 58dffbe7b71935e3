// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::io::{Cursor, Read, Write};

use crate::error::CodecError;
use crate::frame::{CborFrame, Frame};

/// Typed request shape used by the client stubs (`RpcClient`) to marshal
/// call arguments before handing them to the transport. The handler set
/// consumes the same opcodes but operates directly on the raw byte-string
/// tuples described by the wire contract; this enum exists so outgoing
/// callers don't have to hand-assemble those tuples themselves.
#[derive(Clone, Debug, Display)]
#[derive(Serialize, Deserialize)]
pub enum RpcRequest {
    #[display("GET_CONTRACT({0:?})")]
    GetContract(Vec<u8>),

    #[display("GET_IMAGE({0:?})")]
    GetImage(Vec<u8>),

    #[display("GET_PROFILE")]
    GetProfile,

    #[display("GET_USER_METADATA")]
    GetUserMetadata,

    #[display("GET_LISTINGS")]
    GetListings,

    #[display("GET_CONTRACT_METADATA({0:?})")]
    GetContractMetadata(Vec<u8>),

    #[display("FOLLOW(...)")]
    Follow(Vec<u8>, Vec<u8>),

    #[display("UNFOLLOW(...)")]
    Unfollow(Vec<u8>),

    #[display("GET_FOLLOWERS")]
    GetFollowers,

    #[display("GET_FOLLOWING")]
    GetFollowing,

    #[display("BROADCAST(...)")]
    Broadcast(Vec<u8>, Vec<u8>),

    #[display("MESSAGE(...)")]
    Message(Vec<u8>, Vec<u8>),

    #[display("ORDER(...)")]
    Order(Vec<u8>, Vec<u8>),

    #[display("ORDER_CONFIRMATION(...)")]
    OrderConfirmation(Vec<u8>, Vec<u8>),

    #[display("COMPLETE_ORDER(...)")]
    CompleteOrder(Vec<u8>, Vec<u8>),

    #[display("DISPUTE_OPEN(...)")]
    DisputeOpen(Vec<u8>, Vec<u8>),

    #[display("DISPUTE_CLOSE(...)")]
    DisputeClose(Vec<u8>, Vec<u8>),

    #[display("GET_RATINGS({0:?})")]
    GetRatings(Option<Vec<u8>>),

    #[display("REFUND(...)")]
    Refund(Vec<u8>, Vec<u8>),
}

impl Frame for RpcRequest {
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
        let mut buf = Vec::with_capacity(4096);
        serde_cbor_2::to_writer(&mut buf, self)?;
        CborFrame(buf).marshall(writer).map_err(CodecError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn partial_serialization() {
        let cursor = Cursor::new(*b"\0\0\0\x08\x67Wallet");
        let deser = RpcRequest::unmarshall(cursor).unwrap();
        assert!(matches!(deser, None));
    }

    #[test]
    fn single_serialization() {
        let mut buf = Vec::new();
        RpcRequest::GetProfile.marshall(&mut buf).unwrap();
        let deser = RpcRequest::unmarshall(&mut buf.as_slice()).unwrap().unwrap();
        assert!(matches!(deser, RpcRequest::GetProfile));
    }

    #[test]
    fn stream_serialization() {
        let mut buf = Vec::new();
        RpcRequest::GetListings.marshall(&mut buf).unwrap();
        let mut cursor = Cursor::new(&mut buf);
        let deser = RpcRequest::unmarshall(&mut cursor).unwrap().unwrap();
        assert!(matches!(deser, RpcRequest::GetListings));
        let nothing = RpcRequest::unmarshall(&mut cursor).unwrap();
        assert!(matches!(nothing, None));
    }

    #[test]
    fn multi_serialization() {
        let mut buf = Vec::new();
        RpcRequest::GetFollowers.marshall(&mut buf).unwrap();
        RpcRequest::GetFollowing.marshall(&mut buf).unwrap();
        let mut cursor = Cursor::new(&mut buf);
        let first = RpcRequest::unmarshall(&mut cursor).unwrap().unwrap();
        assert!(matches!(first, RpcRequest::GetFollowers));
        let second = RpcRequest::unmarshall(&mut cursor).unwrap().unwrap();
        assert!(matches!(second, RpcRequest::GetFollowing));
    }
}
