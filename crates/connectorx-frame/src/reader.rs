use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::decoder::PacketDecoder;
use crate::error::{FrameError, Result};
use crate::reassembler::Reassembler;
use crate::transmission::{FrameConfig, Transmission};

const READ_CHUNK_SIZE: usize = 512;

/// Reads complete transmissions from any `Read` byte stream.
///
/// Dropped transmissions surface as recoverable errors (see
/// [`FrameError::is_recoverable`]); keep calling `read_transmission` after them.
pub struct TransmissionReader<T> {
    inner: T,
    decoder: PacketDecoder,
    reassembler: Reassembler,
    pending: VecDeque<Result<Transmission>>,
    config: FrameConfig,
}

impl<T: Read> TransmissionReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: PacketDecoder::new(),
            reassembler: Reassembler::new(config.max_transmission_size),
            pending: VecDeque::new(),
            config,
        }
    }

    /// Read the next transmission or drop report (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_transmission(&mut self) -> Result<Transmission> {
        loop {
            if let Some(next) = self.pending.pop_front() {
                return next;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.feed(&chunk[..read]);
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let Some(packet) = self.decoder.decode_byte(byte) else {
                continue;
            };
            let out = self.reassembler.push(packet);
            if let Some(err) = out.dropped {
                self.pending.push_back(Err(err));
            }
            if let Some(transmission) = out.completed {
                self.pending.push_back(Ok(transmission));
            }
        }
    }

    /// Frames the byte decoder discarded as malformed.
    pub fn malformed_frames(&self) -> u64 {
        self.decoder.malformed_frames()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
