// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::{Read, Write};

/// A message that can be written to and read back from a byte stream.
///
/// The underlying transport (UDP framing, retransmission, request/response
/// correlation) is an external collaborator and out of scope for this crate;
/// `Frame` only describes how a single message is serialized onto whatever
/// byte stream the transport hands us.
pub trait Frame: Sized {
    type Error: std::error::Error;

    /// Reads one frame from `reader`. Returns `Ok(None)` on a clean EOF
    /// between frames (no error, nothing more to read).
    fn unmarshall(reader: impl Read) -> Result<Option<Self>, Self::Error>;

    fn marshall(&self, writer: impl Write) -> Result<(), Self::Error>;
}

/// Length-prefixed CBOR-encodable byte blob: a 4-byte big-endian length
/// header followed by that many bytes of payload.
#[derive(Clone, Debug)]
#[derive(Serialize, Deserialize)]
pub(crate) struct CborFrame(pub Vec<u8>);

impl Frame for CborFrame {
    type Error = io::Error;

    fn unmarshall(mut reader: impl Read) -> Result<Option<Self>, Self::Error> {
        let mut len_buf = [0u8; 4];
        if reader
            .read_exact(&mut len_buf)
            .map(Some)
            .or_else(|e| if e.kind() == io::ErrorKind::UnexpectedEof { Ok(None) } else { Err(e) })?
            .is_none()
        {
            return Ok(None);
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        reader
            .read_exact(&mut buf)
            .map(|_| Some(CborFrame(buf)))
            .or_else(|e| if e.kind() == io::ErrorKind::UnexpectedEof { Ok(None) } else { Err(e) })
    }

    fn marshall(&self, mut writer: impl Write) -> Result<(), Self::Error> {
        let len = self.0.len() as u32;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&self.0)
    }
}
