use bytes::{BufMut, Bytes, BytesMut};

use crate::cobs;
use crate::crc::packet_crc;
use crate::error::{FrameError, Result};

/// Largest packet on the wire (header + body).
pub const MAX_PACKET_SIZE: usize = 256;

/// Packet header: packet id (2) + length (1) + crc (1) = 4 bytes.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Largest packet body.
pub const MAX_PACKET_BODY_SIZE: usize = MAX_PACKET_SIZE - PACKET_HEADER_SIZE;

/// Largest COBS-encoded packet, excluding the delimiter.
pub const MAX_ENCODED_PACKET_SIZE: usize = cobs::max_encoded_len(MAX_PACKET_SIZE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_id: u16,
    pub length: u8,
    pub crc: u8,
}

/// One link-layer packet.
///
/// Wire format (before COBS):
/// ```text
/// ┌──────────────┬──────────┬─────────┬──────────────────┐
/// │ Packet id    │ Length   │ CRC-8   │ Body              │
/// │ (2B LE)      │ (1B)     │ (1B)    │ (Length bytes)    │
/// └──────────────┴──────────┴─────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    body: Bytes,
}

impl Packet {
    /// Build a packet and compute its CRC.
    pub fn new(packet_id: u16, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();
        if body.len() > MAX_PACKET_BODY_SIZE {
            return Err(FrameError::PacketTooLarge {
                size: body.len(),
                max: MAX_PACKET_BODY_SIZE,
            });
        }
        Ok(Self::sealed(packet_id, body))
    }

    pub(crate) fn sealed(packet_id: u16, body: Bytes) -> Self {
        debug_assert!(body.len() <= MAX_PACKET_BODY_SIZE);
        let header = PacketHeader {
            packet_id,
            length: body.len() as u8,
            crc: packet_crc(packet_id, &body),
        };
        Self { header, body }
    }

    /// Parse a raw (already COBS-decoded) packet.
    ///
    /// Only the shape is checked here; CRC validation is left to the caller.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < PACKET_HEADER_SIZE || raw.len() > MAX_PACKET_SIZE {
            return None;
        }
        let header = PacketHeader {
            packet_id: u16::from_le_bytes([raw[0], raw[1]]),
            length: raw[2],
            crc: raw[3],
        };
        let body = &raw[PACKET_HEADER_SIZE..];
        if body.len() != header.length as usize {
            return None;
        }
        Some(Self {
            header,
            body: Bytes::copy_from_slice(body),
        })
    }

    pub fn header(&self) -> PacketHeader {
        self.header
    }

    pub fn packet_id(&self) -> u16 {
        self.header.packet_id
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Check the header CRC against the packet contents.
    pub fn verify_crc(&self) -> Result<()> {
        let actual = packet_crc(self.header.packet_id, &self.body);
        if actual != self.header.crc {
            return Err(FrameError::Crc {
                packet_id: self.header.packet_id,
                expected: self.header.crc,
                actual,
            });
        }
        Ok(())
    }

    /// Append the raw header and body to `dst`.
    pub fn encode_raw(&self, dst: &mut BytesMut) {
        dst.reserve(PACKET_HEADER_SIZE + self.body.len());
        dst.put_u16_le(self.header.packet_id);
        dst.put_u8(self.header.length);
        dst.put_u8(self.header.crc);
        dst.put_slice(&self.body);
    }

    /// Append the COBS-encoded packet and its delimiter to `dst`.
    pub fn encode_framed(&self, dst: &mut BytesMut) {
        let mut raw = BytesMut::with_capacity(PACKET_HEADER_SIZE + self.body.len());
        self.encode_raw(&mut raw);
        cobs::encode(&raw, dst);
    }
}
