use crate::zone::ZoneKind;

/// Errors from applying a job to zones.
#[derive(Debug, thiserror::Error)]
pub enum LedError {
    #[error("zone {0:#06x} not found")]
    InvalidOrMissingZone(u16),

    #[error("animation {0:#06x} not found")]
    MissingAnimation(u16),

    #[error("group {0:#06x} not found")]
    MissingGroup(u16),

    #[error("sequence {0:#06x} not found")]
    MissingSequence(u16),

    #[error("bitmap {0:#06x} not found")]
    MissingBitmap(u16),

    /// A strip job was sent to a matrix zone or the other way round.
    #[error("zone {zone:#06x} is not a {expected:?} zone")]
    WrongZoneKind { zone: u16, expected: ZoneKind },

    /// A raw pixel buffer did not match the zone size.
    #[error("zone {zone:#06x} expects {expected} bytes, got {actual}")]
    BufferLength {
        zone: u16,
        expected: usize,
        actual: usize,
    },

    #[error("bitmap error: {0}")]
    Bitmap(#[from] BitmapError),

    #[error("driver error on channel {channel:#06x}: {source}")]
    Driver {
        channel: u16,
        #[source]
        source: LedDriverError,
    },
}

/// Errors from building the animation registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate {kind} id {id:#06x} for {name:?}")]
    DuplicateId {
        kind: &'static str,
        name: String,
        id: u16,
    },

    #[error("sequence {sequence:?} references unknown animation {animation:?}")]
    UnknownAnimation { sequence: String, animation: String },

    #[error("sequence {0:?} has no steps")]
    EmptySequence(String),
}

/// Errors from decoding or validating a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from reading bitmap frames.
#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("bitmap file not found: {0}")]
    NotFound(String),

    #[error("invalid bitmap {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by an LED output driver.
#[derive(Debug, thiserror::Error)]
pub enum LedDriverError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LedError>;
