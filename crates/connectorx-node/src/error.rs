use connectorx_frame::TransmissionType;

/// Errors from building or running a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The configuration could not be turned into a running device.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    #[error("config error: {0}")]
    Config(#[from] connectorx_led::ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] connectorx_led::RegistryError),

    #[error("transport error: {0}")]
    Transport(#[from] connectorx_transport::TransportError),

    #[error("wire error: {0}")]
    Wire(#[from] connectorx_proto::WireError),

    /// A service thread could not be started.
    #[error("failed to start {name}: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

/// Errors from moving work between tasks.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The consumer queue stayed full for the whole send timeout.
    #[error("{0} queue full")]
    QueueFull(&'static str),

    /// The consumer task has stopped.
    #[error("{0} queue closed")]
    Closed(&'static str),

    /// A transmission type the device never accepts from a host.
    #[error("unexpected inbound {0:?} transmission")]
    Unexpected(TransmissionType),
}

/// Errors raised by sensor modules.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("module {0:#06x} not found")]
    NotFound(u16),

    #[error("no module type {0:?} registered")]
    UnknownType(String),

    #[error("module init failed: {0}")]
    Init(String),

    #[error("module read failed: {0}")]
    Read(String),

    #[error("module rejected data: {0}")]
    Push(String),

    /// The module failed earlier and is not being polled.
    #[error("module {0:#06x} is in an error state")]
    Faulted(u16),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the file store.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
