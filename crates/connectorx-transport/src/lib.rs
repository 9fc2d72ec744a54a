//! Transport adapters for ConnectorX.
//!
//! Each adapter turns one host link into [`AdapterEvent`]s for the router
//! and writes framed transmissions back. [`StreamAdapter`] covers anything
//! that looks like a byte stream; [`MemoryAdapter`] is an in-process link.

pub mod adapter;
pub mod error;
pub mod memory;
#[cfg(feature = "serial")]
pub mod serial;
pub mod stream;

pub use adapter::{AdapterEvent, TransportAdapter, TransportId, DEFAULT_SEND_TIMEOUT};
pub use error::{Result, TransportError};
pub use memory::MemoryAdapter;
#[cfg(feature = "serial")]
pub use serial::{open_serial, SerialConfig};
pub use stream::{StreamAdapter, StreamConfig};
