use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::constant::PACKET_HEADER_SIZE;
use crate::error::{Error, Result};

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        if data.len() < PACKET_HEADER_SIZE {
            return Err(Error::InvalidPacket);
        }
        Self::ref_from_bytes(&data[..PACKET_HEADER_SIZE]).map_err(|_| Error::InvalidPacket)
    }
}

/// Helper function to write packet header
#[inline]
pub fn write_packet_header(out: &mut Vec<u8>, sequence_id: u8, payload_length: usize) {
    out.extend_from_slice(PacketHeader::encode(payload_length, sequence_id).as_bytes());
}

/// Build a complete frame (header + payload) as the decoder expects it
pub fn frame(sequence_id: u8, payload: &[u8]) -> bytes::Bytes {
    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + payload.len());
    write_packet_header(&mut out, sequence_id, payload.len());
    out.extend_from_slice(payload);
    bytes::Bytes::from(out)
}

#[cfg(feature = "tokio")]
pub use codec::FrameDecoder;

#[cfg(feature = "tokio")]
mod codec {
    use bytes::{Bytes, BytesMut};
    use tokio_util::codec::Decoder;

    use super::PacketHeader;
    use crate::constant::PACKET_HEADER_SIZE;
    use crate::error::{Error, Result};

    /// Splits a backend byte stream into frames.
    ///
    /// Unlike a client-side decoder, each yielded frame keeps its 4-byte
    /// header so the response decoder can read the discriminant at a fixed
    /// offset. Packets of the maximum payload length are yielded one by one;
    /// joining continuation packets is left to the consumer. A sequence id
    /// that does not follow the previous one marks a new command and is only
    /// logged.
    #[derive(Debug, Default)]
    pub struct FrameDecoder {
        expected_sequence_id: Option<u8>,
    }

    impl FrameDecoder {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Decoder for FrameDecoder {
        type Item = Bytes;
        type Error = Error;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
            let Ok(header) = PacketHeader::from_bytes(src) else {
                return Ok(None);
            };
            let length = header.length();
            let sequence_id = header.sequence_id;

            if src.len() < PACKET_HEADER_SIZE + length {
                src.reserve(PACKET_HEADER_SIZE + length - src.len());
                return Ok(None);
            }

            if let Some(expected) = self.expected_sequence_id
                && expected != sequence_id
            {
                tracing::debug!(expected, sequence_id, "sequence id restarted");
            }
            self.expected_sequence_id = Some(sequence_id.wrapping_add(1));

            Ok(Some(src.split_to(PACKET_HEADER_SIZE + length).freeze()))
        }
    }
}
