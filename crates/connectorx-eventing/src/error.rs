use crate::bus::SubscriberId;

/// Errors from subscriber bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum EventingError {
    /// The id was never registered or has been removed.
    #[error("unknown subscriber {0}")]
    UnknownSubscriber(SubscriberId),
}

pub type Result<T> = std::result::Result<T, EventingError>;
