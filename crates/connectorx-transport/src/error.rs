use connectorx_frame::FrameError;

/// Errors that can occur in transport adapters.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device at the given path.
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Framing failed while writing.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The router queue stayed full for the whole send timeout.
    #[error("router queue full")]
    QueueFull,

    /// The adapter has been closed or its peer went away.
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
