//! ChunkDataAndUpdateLight (0x24), server to client.

use bytes::{Buf, BufMut, Bytes};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::ChunkPos;

/// Sends a full chunk column with its light data to the client.
#[derive(Debug, Clone)]
pub struct ChunkDataAndLight {
    pub pos: ChunkPos,
    /// Pre-serialized body: heightmaps + section data + block entities + light.
    pub body: Bytes,
}

impl ChunkDataAndLight {
    /// Packet id for protocol 763.
    pub const PACKET_ID: i32 = 0x24;
}

impl ProtoEncode for ChunkDataAndLight {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.pos.proto_encode(buf);
        // The body runs to the end of the packet; no length prefix.
        buf.put_slice(&self.body);
    }
}

impl ProtoDecode for ChunkDataAndLight {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let pos = ChunkPos::proto_decode(buf)?;
        let body = buf.copy_to_bytes(buf.remaining());
        Ok(Self { pos, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn encode_chunk_data() {
        let pkt = ChunkDataAndLight {
            pos: ChunkPos::new(2, -1),
            body: Bytes::from_static(&[0x0A, 0x00]),
        };
        let mut buf = BytesMut::new();
        pkt.proto_encode(&mut buf);
        assert_eq!(buf.len(), 10);
        assert_eq!(&buf[..4], &[0, 0, 0, 2]);
        assert_eq!(&buf[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&buf[8..], &[0x0A, 0x00]);
    }

    #[test]
    fn decode_takes_rest_as_body() {
        let data = Bytes::from_static(&[0, 0, 0, 1, 0, 0, 0, 3, 9, 8, 7]);
        let pkt = ChunkDataAndLight::proto_decode(&mut data.clone()).unwrap();
        assert_eq!(pkt.pos, ChunkPos::new(1, 3));
        assert_eq!(&pkt.body[..], &[9, 8, 7]);
    }

    #[test]
    fn decode_short_position_fails() {
        let data = Bytes::from_static(&[0, 0, 0]);
        assert!(ChunkDataAndLight::proto_decode(&mut data.clone()).is_err());
    }
}
