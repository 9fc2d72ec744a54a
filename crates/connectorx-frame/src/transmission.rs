use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::packet::{Packet, MAX_PACKET_BODY_SIZE};

/// Transmission header: type (1) + data length (4) + packet count (2) = 7 bytes.
pub const TRANSMISSION_HEADER_SIZE: usize = 7;

/// Default largest transmission body accepted: 64 KiB.
pub const DEFAULT_MAX_TRANSMISSION_SIZE: usize = 64 * 1024;

/// Largest body the 16-bit packet count can describe.
pub const ABSOLUTE_MAX_TRANSMISSION_SIZE: usize =
    u16::MAX as usize * MAX_PACKET_BODY_SIZE - TRANSMISSION_HEADER_SIZE;

/// What a transmission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransmissionType {
    Request = 0,
    Response = 1,
    Event = 2,
    Command = 3,
    File = 4,
    ModuleData = 5,
}

impl TryFrom<u8> for TransmissionType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Request,
            1 => Self::Response,
            2 => Self::Event,
            3 => Self::Command,
            4 => Self::File,
            5 => Self::ModuleData,
            other => return Err(FrameError::UnknownType(other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionHeader {
    pub kind: TransmissionType,
    pub data_length: u32,
    pub packet_count: u16,
}

impl TransmissionHeader {
    /// Header describing a body of `len` bytes.
    pub fn for_body(kind: TransmissionType, len: usize) -> Result<Self> {
        if len > ABSOLUTE_MAX_TRANSMISSION_SIZE {
            return Err(FrameError::TransmissionTooLarge {
                size: len,
                max: ABSOLUTE_MAX_TRANSMISSION_SIZE,
            });
        }
        Ok(Self {
            kind,
            data_length: len as u32,
            packet_count: packet_count_for(len) as u16,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.kind as u8);
        dst.put_u32_le(self.data_length);
        dst.put_u16_le(self.packet_count);
    }

    /// Decode and validate a header from the start of a first packet.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < TRANSMISSION_HEADER_SIZE {
            return Err(FrameError::InvalidHeader(format!(
                "need {TRANSMISSION_HEADER_SIZE} bytes, got {}",
                src.len()
            )));
        }
        let kind = TransmissionType::try_from(src[0])?;
        let data_length = u32::from_le_bytes([src[1], src[2], src[3], src[4]]);
        let packet_count = u16::from_le_bytes([src[5], src[6]]);

        let expected = packet_count_for(data_length as usize);
        if packet_count as usize != expected {
            return Err(FrameError::InvalidHeader(format!(
                "packet count {packet_count} does not match length {data_length} (expected {expected})"
            )));
        }

        Ok(Self {
            kind,
            data_length,
            packet_count,
        })
    }
}

/// Number of packets needed for a body of `len` bytes.
pub fn packet_count_for(len: usize) -> usize {
    (TRANSMISSION_HEADER_SIZE + len).div_ceil(MAX_PACKET_BODY_SIZE)
}

/// A complete logical message.
///
/// The body is owned exclusively; handing a transmission to a queue or
/// adapter moves it, and dropping it releases the body.
#[derive(Debug, PartialEq, Eq)]
pub struct Transmission {
    header: TransmissionHeader,
    body: Box<[u8]>,
}

impl Transmission {
    pub fn new(kind: TransmissionType, body: impl Into<Box<[u8]>>) -> Result<Self> {
        let body = body.into();
        let header = TransmissionHeader::for_body(kind, body.len())?;
        Ok(Self { header, body })
    }

    pub(crate) fn from_parts(header: TransmissionHeader, body: Box<[u8]>) -> Self {
        debug_assert_eq!(header.data_length as usize, body.len());
        Self { header, body }
    }

    pub fn kind(&self) -> TransmissionType {
        self.header.kind
    }

    pub fn header(&self) -> TransmissionHeader {
        self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn into_body(self) -> Box<[u8]> {
        self.body
    }
}

/// Configuration for the transmission codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest transmission body accepted or sent. Default: 64 KiB.
    pub max_transmission_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_transmission_size: DEFAULT_MAX_TRANSMISSION_SIZE,
        }
    }
}

/// Splits transmissions into packets, numbering them from a per-connection counter.
#[derive(Debug, Default)]
pub struct TransmissionEncoder {
    next_packet_id: u16,
}

impl TransmissionEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(packet_id: u16) -> Self {
        Self {
            next_packet_id: packet_id,
        }
    }

    /// Id the next packet will carry.
    pub fn next_packet_id(&self) -> u16 {
        self.next_packet_id
    }

    /// Split a transmission into `header.packet_count` packets.
    pub fn encode(&mut self, transmission: &Transmission) -> Vec<Packet> {
        let mut stream = BytesMut::with_capacity(TRANSMISSION_HEADER_SIZE + transmission.len());
        transmission.header.encode(&mut stream);
        stream.put_slice(transmission.body());
        let stream: Bytes = stream.freeze();

        let mut packets = Vec::with_capacity(transmission.header.packet_count as usize);
        let mut offset = 0usize;
        while offset < stream.len() {
            let end = (offset + MAX_PACKET_BODY_SIZE).min(stream.len());
            packets.push(Packet::sealed(self.next_packet_id, stream.slice(offset..end)));
            self.next_packet_id = self.next_packet_id.wrapping_add(1);
            offset = end;
        }
        packets
    }

    /// Encode a transmission straight to COBS frames.
    pub fn encode_framed(&mut self, transmission: &Transmission, dst: &mut BytesMut) {
        for packet in self.encode(transmission) {
            packet.encode_framed(dst);
        }
    }
}
