/// Errors that can occur while framing or reassembling transmissions.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A packet's CRC did not match its contents.
    #[error("packet {packet_id} failed CRC check (expected {expected:#04x}, got {actual:#04x})")]
    Crc {
        packet_id: u16,
        expected: u8,
        actual: u8,
    },

    /// A packet arrived out of sequence inside a transmission.
    #[error("packet sequence gap (expected {expected}, got {actual})")]
    SequenceGap { expected: u16, actual: u16 },

    /// A transmission received more bytes than its header declared.
    #[error("transmission overflow ({received} bytes received, {declared} declared)")]
    LengthOverflow { received: usize, declared: usize },

    /// The final packet left a transmission short of its declared length.
    #[error("transmission short ({received} bytes received, {declared} declared)")]
    LengthMismatch { received: usize, declared: usize },

    /// The first packet of a transmission did not carry a usable header.
    #[error("invalid transmission header: {0}")]
    InvalidHeader(String),

    /// The transmission type byte is unknown.
    #[error("unknown transmission type {0}")]
    UnknownType(u8),

    /// A transmission exceeds the configured maximum size.
    #[error("transmission too large ({size} bytes, max {max})")]
    TransmissionTooLarge { size: usize, max: usize },

    /// A packet body exceeds the wire limit.
    #[error("packet body too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the stream is still usable after this error.
    ///
    /// Recoverable errors drop a single transmission; the reader keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::Crc { .. }
                | FrameError::SequenceGap { .. }
                | FrameError::LengthOverflow { .. }
                | FrameError::LengthMismatch { .. }
                | FrameError::InvalidHeader(_)
                | FrameError::UnknownType(_)
                | FrameError::TransmissionTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
