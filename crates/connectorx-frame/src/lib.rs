//! Packet framing for ConnectorX links.
//!
//! Every logical message (a [`Transmission`]) is prefixed with a 7-byte
//! header, cut into packets of at most 252 body bytes, and each packet is
//! sent as:
//! - a 2-byte little-endian packet id, sequential per connection
//! - a 1-byte body length
//! - a CRC-8 over id, length and body
//!
//! Packets are COBS-encoded and terminated by `0x00`, so a receiver can
//! resynchronise on any delimiter.

pub mod cobs;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod packet;
pub mod reader;
pub mod reassembler;
pub mod transmission;
pub mod writer;

pub use decoder::PacketDecoder;
pub use error::{FrameError, Result};
pub use packet::{
    Packet, PacketHeader, MAX_ENCODED_PACKET_SIZE, MAX_PACKET_BODY_SIZE, MAX_PACKET_SIZE,
    PACKET_HEADER_SIZE,
};
pub use reader::TransmissionReader;
pub use reassembler::{Reassembler, Reassembly};
pub use transmission::{
    packet_count_for, FrameConfig, Transmission, TransmissionEncoder, TransmissionHeader,
    TransmissionType, DEFAULT_MAX_TRANSMISSION_SIZE, TRANSMISSION_HEADER_SIZE,
};
pub use writer::TransmissionWriter;
