//! Event fan-out for ConnectorX.
//!
//! [`EventBus`] delivers copies of each [`Event`](connectorx_proto::Event) to
//! every subscriber queue whose mask includes the event's type. Full queues
//! drop the event for that subscriber only. [`ErrorFlags`] is the shared
//! fault bitset reported to hosts.

pub mod bus;
pub mod error;
pub mod flags;

pub use bus::{BusConfig, DeliveryReport, EventBus, SubscriberId, DEFAULT_DELIVERY_TIMEOUT};
pub use error::{EventingError, Result};
pub use flags::ErrorFlags;
