use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{FrameError, Result};
use crate::transmission::{FrameConfig, Transmission, TransmissionEncoder};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes transmissions as COBS-framed packets to any `Write` stream.
pub struct TransmissionWriter<T> {
    inner: T,
    encoder: TransmissionEncoder,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> TransmissionWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            encoder: TransmissionEncoder::new(),
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a complete transmission (blocking).
    pub fn write_transmission(&mut self, transmission: &Transmission) -> Result<()> {
        if transmission.len() > self.config.max_transmission_size {
            return Err(FrameError::TransmissionTooLarge {
                size: transmission.len(),
                max: self.config.max_transmission_size,
            });
        }

        self.buf.clear();
        self.encoder.encode_framed(transmission, &mut self.buf);
        write_all(&mut self.inner, &self.buf)?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Id the next packet will carry.
    pub fn next_packet_id(&self) -> u16 {
        self.encoder.next_packet_id()
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

/// Write pre-encoded frame bytes, retrying on interruption.
pub fn write_all<T: Write>(inner: &mut T, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match inner.write(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}
