//! ConnectorX LED and sensor controller core.
//!
//! A host talks to the device over framed transmissions carrying commands,
//! requests, file uploads and module data. The device answers, streams
//! events and sensor samples, and drives addressable LED strips and
//! matrices from a registry of animations.
//!
//! # Crate Structure
//!
//! - [`frame`]: packet framing, COBS, CRC-8 and transmission reassembly
//! - [`proto`]: bit-exact payload codecs
//! - [`eventing`]: event bus and error flags
//! - [`led`]: animation registry, zones, channels and the LED service
//! - [`transport`]: host link adapters (serial behind the `serial` feature)
//! - [`node`]: router, handlers, system service and the composition root

/// Re-export framing types.
pub mod frame {
    pub use connectorx_frame::*;
}

/// Re-export wire payload types.
pub mod proto {
    pub use connectorx_proto::*;
}

/// Re-export the event bus.
pub mod eventing {
    pub use connectorx_eventing::*;
}

/// Re-export the LED engine.
pub mod led {
    pub use connectorx_led::*;
}

/// Re-export transport adapters.
pub mod transport {
    pub use connectorx_transport::*;
}

/// Re-export the device node.
pub mod node {
    pub use connectorx_node::*;
}

pub use connectorx_node::{Node, NodeBuilder, NodeConfig};
