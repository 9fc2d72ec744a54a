use std::time::Duration;

use connectorx_frame::FrameConfig;
use connectorx_led::PowerBudget;
use connectorx_proto::{EventMask, EventType, Version};

/// Queue sizes and timing for a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Capacity of each handler queue. Default: 8.
    pub queue_capacity: usize,
    /// Capacity of the adapter-to-router queue. Default: 32.
    pub inbound_capacity: usize,
    /// How long a producer waits on a full queue before dropping. Default: 200ms.
    pub queue_timeout: Duration,
    /// LED tick period. Default: 5ms.
    pub led_tick: Duration,
    /// Heartbeat period. Default: 1000ms.
    pub heartbeat_period: Duration,
    /// Events forwarded to hosts. Default: all.
    pub forwarded_events: EventMask,
    /// How often idle service loops re-check for shutdown. Default: 50ms.
    pub poll_interval: Duration,
    pub frame: FrameConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            inbound_capacity: 32,
            queue_timeout: Duration::from_millis(200),
            led_tick: Duration::from_millis(5),
            heartbeat_period: Duration::from_millis(1000),
            forwarded_events: EventMask::ALL,
            poll_interval: Duration::from_millis(50),
            frame: FrameConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Forward everything except the given event types.
    pub fn without_forwarding(mut self, types: &[EventType]) -> Self {
        for t in types {
            self.forwarded_events = self.forwarded_events.without(*t);
        }
        self
    }
}

/// Fixed facts about the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardInfo {
    pub sku: u16,
    pub serial_number: u64,
    pub firmware: Version,
    pub power: PowerBudget,
}

impl Default for BoardInfo {
    fn default() -> Self {
        Self {
            sku: 0,
            serial_number: 0,
            firmware: firmware_version(),
            power: PowerBudget::default(),
        }
    }
}

/// This crate's version as a wire [`Version`].
pub fn firmware_version() -> Version {
    let part = |s: &str| s.parse().unwrap_or(0);
    Version {
        major: part(env!("CARGO_PKG_VERSION_MAJOR")),
        minor: part(env!("CARGO_PKG_VERSION_MINOR")),
        patch: part(env!("CARGO_PKG_VERSION_PATCH")),
    }
}
