use crate::cobs;
use crate::packet::{Packet, MAX_ENCODED_PACKET_SIZE};

/// Byte-at-a-time COBS packet decoder.
///
/// Malformed or over-length frames are dropped and counted; decoding
/// resynchronises at the next delimiter.
#[derive(Debug)]
pub struct PacketDecoder {
    buf: Vec<u8>,
    overflowed: bool,
    malformed: u64,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_ENCODED_PACKET_SIZE),
            overflowed: false,
            malformed: 0,
        }
    }

    /// Feed one byte. Returns a packet when a delimiter closes a valid frame.
    pub fn decode_byte(&mut self, byte: u8) -> Option<Packet> {
        if byte != cobs::DELIMITER {
            if self.buf.len() >= MAX_ENCODED_PACKET_SIZE {
                self.overflowed = true;
            } else {
                self.buf.push(byte);
            }
            return None;
        }

        if self.overflowed {
            self.overflowed = false;
            self.buf.clear();
            self.malformed += 1;
            tracing::warn!("dropping over-length frame");
            return None;
        }

        if self.buf.is_empty() {
            return None;
        }

        let packet = cobs::decode(&self.buf).and_then(|raw| Packet::parse(&raw));
        self.buf.clear();

        if packet.is_none() {
            self.malformed += 1;
            tracing::debug!(malformed = self.malformed, "dropping malformed frame");
        }
        packet
    }

    /// Frames dropped since creation.
    pub fn malformed_frames(&self) -> u64 {
        self.malformed
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn feed(decoder: &mut PacketDecoder, bytes: &[u8]) -> Vec<Packet> {
        bytes.iter().filter_map(|b| decoder.decode_byte(*b)).collect()
    }

    #[test]
    fn decodes_back_to_back_packets() {
        let mut wire = BytesMut::new();
        Packet::new(1, &b"one"[..]).unwrap().encode_framed(&mut wire);
        Packet::new(2, &b"two"[..]).unwrap().encode_framed(&mut wire);

        let mut decoder = PacketDecoder::new();
        let packets = feed(&mut decoder, &wire);

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].body(), b"one");
        assert_eq!(packets[1].packet_id(), 2);
        assert_eq!(decoder.malformed_frames(), 0);
    }

    #[test]
    fn resyncs_after_garbage() {
        let mut wire = BytesMut::from(&[0x07, 0x99, 0x00][..]);
        Packet::new(5, &b"ok"[..]).unwrap().encode_framed(&mut wire);

        let mut decoder = PacketDecoder::new();
        let packets = feed(&mut decoder, &wire);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_id(), 5);
        assert_eq!(decoder.malformed_frames(), 1);
    }

    #[test]
    fn drops_over_length_frame() {
        let mut wire = vec![0x01u8; MAX_ENCODED_PACKET_SIZE + 10];
        wire.push(0x00);
        let mut tail = BytesMut::new();
        Packet::new(6, &b"next"[..]).unwrap().encode_framed(&mut tail);
        wire.extend_from_slice(&tail);

        let mut decoder = PacketDecoder::new();
        let packets = feed(&mut decoder, &wire);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].body(), b"next");
        assert_eq!(decoder.malformed_frames(), 1);
    }

    #[test]
    fn idle_delimiters_are_ignored() {
        let mut decoder = PacketDecoder::new();
        assert!(feed(&mut decoder, &[0, 0, 0]).is_empty());
        assert_eq!(decoder.malformed_frames(), 0);
    }
}
