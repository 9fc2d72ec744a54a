use crate::error::{FrameError, Result};
use crate::packet::Packet;
use crate::transmission::{
    Transmission, TransmissionHeader, DEFAULT_MAX_TRANSMISSION_SIZE, TRANSMISSION_HEADER_SIZE,
};

/// Result of feeding one packet to the [`Reassembler`].
///
/// A single packet can both end a broken transmission (`dropped`) and start
/// and finish a new one (`completed`).
#[derive(Debug, Default)]
pub struct Reassembly {
    pub completed: Option<Transmission>,
    pub dropped: Option<FrameError>,
}

impl Reassembly {
    fn completed(transmission: Option<Transmission>) -> Self {
        Self {
            completed: transmission,
            dropped: None,
        }
    }

    fn dropped(err: FrameError) -> Self {
        Self {
            completed: None,
            dropped: Some(err),
        }
    }
}

#[derive(Debug)]
struct InProgress {
    header: TransmissionHeader,
    last_packet_id: u16,
    packets: u16,
    body: Vec<u8>,
}

impl InProgress {
    fn expected_id(&self) -> u16 {
        self.last_packet_id.wrapping_add(1)
    }

    /// Packets the header announced that have not arrived yet.
    fn missing(&self) -> u16 {
        self.header.packet_count.saturating_sub(self.packets)
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Receiving(InProgress),
    /// Swallowing the remaining packets of an abandoned transmission.
    Discarding { next_id: u16, remaining: u16 },
}

/// Rebuilds transmissions from a stream of packets.
///
/// After a gap, the rest of the broken transmission is dropped silently so
/// one lost packet yields one error.
#[derive(Debug)]
pub struct Reassembler {
    max_transmission_size: usize,
    state: State,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TRANSMISSION_SIZE)
    }
}

impl Reassembler {
    pub fn new(max_transmission_size: usize) -> Self {
        Self {
            max_transmission_size,
            state: State::Idle,
        }
    }

    /// Whether a transmission is partially received.
    pub fn in_progress(&self) -> bool {
        matches!(self.state, State::Receiving(_))
    }

    /// Feed the next packet.
    pub fn push(&mut self, packet: Packet) -> Reassembly {
        if let Err(err) = packet.verify_crc() {
            match std::mem::replace(&mut self.state, State::Idle) {
                State::Receiving(progress) => tracing::warn!(
                    packet_id = packet.packet_id(),
                    received = progress.body.len(),
                    "discarding transmission after CRC failure"
                ),
                other => self.state = other,
            }
            return Reassembly::dropped(err);
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Receiving(progress) if packet.packet_id() == progress.expected_id() => {
                match self.continue_with(progress, &packet) {
                    Ok(done) => Reassembly::completed(done),
                    Err(err) => Reassembly::dropped(err),
                }
            }
            State::Receiving(progress) => {
                let gap = FrameError::SequenceGap {
                    expected: progress.expected_id(),
                    actual: packet.packet_id(),
                };
                tracing::warn!(error = %gap, "discarding partial transmission");
                let offset = packet.packet_id().wrapping_sub(progress.expected_id());
                let missing = progress.missing();
                if offset < missing {
                    self.discard_after(packet.packet_id(), missing - offset - 1);
                    return Reassembly::dropped(gap);
                }
                // Outside the broken transmission: may open a new one.
                let completed = match self.start(&packet) {
                    Ok(done) => done,
                    Err(err) => {
                        tracing::debug!(error = %err, "packet after gap is not a transmission start");
                        None
                    }
                };
                Reassembly {
                    completed,
                    dropped: Some(gap),
                }
            }
            State::Discarding { next_id, remaining } if packet.packet_id() == next_id => {
                tracing::trace!(packet_id = next_id, remaining, "dropping orphaned packet");
                self.discard_after(next_id, remaining.saturating_sub(1));
                Reassembly::default()
            }
            State::Discarding { .. } | State::Idle => match self.start(&packet) {
                Ok(done) => Reassembly::completed(done),
                Err(err) => Reassembly::dropped(err),
            },
        }
    }

    /// Drop any partial transmission.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    fn discard_after(&mut self, packet_id: u16, remaining: u16) {
        self.state = if remaining == 0 {
            State::Idle
        } else {
            State::Discarding {
                next_id: packet_id.wrapping_add(1),
                remaining,
            }
        };
    }

    fn start(&mut self, packet: &Packet) -> Result<Option<Transmission>> {
        let body = packet.body();
        let header = TransmissionHeader::decode(body)?;

        let declared = header.data_length as usize;
        if declared > self.max_transmission_size {
            return Err(FrameError::TransmissionTooLarge {
                size: declared,
                max: self.max_transmission_size,
            });
        }

        let progress = InProgress {
            header,
            last_packet_id: packet.packet_id(),
            packets: 1,
            body: Vec::with_capacity(declared),
        };
        self.extend(progress, &body[TRANSMISSION_HEADER_SIZE..])
    }

    fn continue_with(
        &mut self,
        mut progress: InProgress,
        packet: &Packet,
    ) -> Result<Option<Transmission>> {
        progress.last_packet_id = packet.packet_id();
        progress.packets += 1;
        self.extend(progress, packet.body())
    }

    fn extend(&mut self, mut progress: InProgress, chunk: &[u8]) -> Result<Option<Transmission>> {
        let declared = progress.header.data_length as usize;
        let received = progress.body.len() + chunk.len();
        if received > declared {
            return Err(FrameError::LengthOverflow { received, declared });
        }
        progress.body.extend_from_slice(chunk);

        if progress.packets < progress.header.packet_count {
            self.state = State::Receiving(progress);
            return Ok(None);
        }

        if received != declared {
            return Err(FrameError::LengthMismatch { received, declared });
        }

        tracing::debug!(
            kind = ?progress.header.kind,
            len = declared,
            packets = progress.packets,
            "transmission reassembled"
        );
        Ok(Some(Transmission::from_parts(
            progress.header,
            progress.body.into_boxed_slice(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::transmission::{TransmissionEncoder, TransmissionType};

    fn packets_for(kind: TransmissionType, body: Vec<u8>, first_id: u16) -> Vec<Packet> {
        let tx = Transmission::new(kind, body).unwrap();
        TransmissionEncoder::starting_at(first_id).encode(&tx)
    }

    fn corrupt(packet: &Packet) -> Packet {
        let mut raw = BytesMut::new();
        packet.encode_raw(&mut raw);
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        Packet::parse(&raw).unwrap()
    }

    #[test]
    fn reassembles_multi_packet_transmission() {
        let body: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
        let mut reassembler = Reassembler::default();
        let mut completed = Vec::new();

        for packet in packets_for(TransmissionType::File, body.clone(), 40) {
            let out = reassembler.push(packet);
            assert!(out.dropped.is_none());
            completed.extend(out.completed);
        }

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].kind(), TransmissionType::File);
        assert_eq!(completed[0].body(), body.as_slice());
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn gap_drops_partial_and_restarts_on_new_start() {
        let mut reassembler = Reassembler::default();
        let first = packets_for(TransmissionType::File, vec![1u8; 600], 0);
        let second = packets_for(TransmissionType::Command, b"go".to_vec(), 10);

        assert!(reassembler.push(first[0].clone()).completed.is_none());
        // first[1] is lost; the next packet starts a new transmission.
        let out = reassembler.push(second[0].clone());

        assert!(matches!(
            out.dropped,
            Some(FrameError::SequenceGap { expected: 1, actual: 10 })
        ));
        let tx = out.completed.unwrap();
        assert_eq!(tx.kind(), TransmissionType::Command);
        assert_eq!(tx.body(), b"go");
    }

    #[test]
    fn lost_middle_packet_reports_once() {
        let mut reassembler = Reassembler::default();
        let packets = packets_for(TransmissionType::File, vec![2u8; 1100], 0);
        assert!(packets.len() >= 4);

        let mut errors = Vec::new();
        let mut completed = Vec::new();
        for (i, packet) in packets.iter().enumerate() {
            if i == 1 {
                continue;
            }
            let out = reassembler.push(packet.clone());
            errors.extend(out.dropped);
            completed.extend(out.completed);
        }

        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(errors[0], FrameError::SequenceGap { expected: 1, actual: 2 }));
        assert!(completed.is_empty());
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn next_transmission_follows_discarded_one() {
        let mut reassembler = Reassembler::default();
        let broken = packets_for(TransmissionType::File, vec![4u8; 1100], 0);
        let next_id = broken.len() as u16;
        let next = packets_for(TransmissionType::Command, b"after".to_vec(), next_id);

        reassembler.push(broken[0].clone());
        // broken[1] and the tail are lost.
        assert!(reassembler.push(broken[2].clone()).dropped.is_some());

        let out = reassembler.push(next[0].clone());
        assert!(out.dropped.is_none());
        assert_eq!(out.completed.unwrap().body(), b"after");
    }

    #[test]
    fn crc_failure_discards_in_progress() {
        let mut reassembler = Reassembler::default();
        let packets = packets_for(TransmissionType::File, vec![3u8; 400], 0);

        reassembler.push(packets[0].clone());
        let out = reassembler.push(corrupt(&packets[1]));

        assert!(matches!(out.dropped, Some(FrameError::Crc { packet_id: 1, .. })));
        assert!(out.completed.is_none());
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn oversize_declared_length_rejected() {
        let mut reassembler = Reassembler::new(16);
        let packets = packets_for(TransmissionType::File, vec![0u8; 32], 0);
        let out = reassembler.push(packets[0].clone());
        assert!(matches!(
            out.dropped,
            Some(FrameError::TransmissionTooLarge { size: 32, max: 16 })
        ));
    }

    #[test]
    fn overflow_detected() {
        let mut stream = BytesMut::new();
        TransmissionHeader::for_body(TransmissionType::Event, 2)
            .unwrap()
            .encode(&mut stream);
        stream.extend_from_slice(&[1, 2, 3, 4]);
        let packet = Packet::new(0, stream.freeze()).unwrap();

        let out = Reassembler::default().push(packet);
        assert!(matches!(
            out.dropped,
            Some(FrameError::LengthOverflow { received: 4, declared: 2 })
        ));
    }

    #[test]
    fn short_final_packet_detected() {
        let mut stream = BytesMut::new();
        TransmissionHeader::for_body(TransmissionType::Event, 4)
            .unwrap()
            .encode(&mut stream);
        stream.extend_from_slice(&[1, 2]);
        let packet = Packet::new(0, stream.freeze()).unwrap();

        let out = Reassembler::default().push(packet);
        assert!(matches!(
            out.dropped,
            Some(FrameError::LengthMismatch { received: 2, declared: 4 })
        ));
    }
}
