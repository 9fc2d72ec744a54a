use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use connectorx_frame::{FrameError, Transmission};
use connectorx_proto::ConnectionType;
use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::warn;

use crate::error::{Result, TransportError};

/// How long an adapter waits on a full router queue. Default: 200ms.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(200);

/// Identifies one adapter within a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(pub u8);

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport#{}", self.0)
    }
}

/// What an adapter reports to the router.
#[derive(Debug)]
pub enum AdapterEvent {
    Connected {
        transport: TransportId,
        connection: ConnectionType,
    },
    Disconnected {
        transport: TransportId,
        connection: ConnectionType,
    },
    /// A complete inbound transmission; the receiver becomes its only owner.
    Received {
        transport: TransportId,
        transmission: Transmission,
    },
    /// An inbound transmission was discarded during reassembly.
    Dropped {
        transport: TransportId,
        error: FrameError,
    },
}

impl AdapterEvent {
    pub fn transport(&self) -> TransportId {
        match self {
            AdapterEvent::Connected { transport, .. }
            | AdapterEvent::Disconnected { transport, .. }
            | AdapterEvent::Received { transport, .. }
            | AdapterEvent::Dropped { transport, .. } => *transport,
        }
    }
}

/// One link to a host.
///
/// Inbound traffic is pushed to the router as [`AdapterEvent`]s; outbound
/// traffic goes through [`send`](TransportAdapter::send).
pub trait TransportAdapter: Send + Sync {
    fn id(&self) -> TransportId;

    fn connection(&self) -> ConnectionType;

    fn is_connected(&self) -> bool;

    /// Frame and write one transmission (blocking).
    fn send(&self, transmission: &Transmission) -> Result<()>;

    /// Stop receiving; later sends fail with `Closed`.
    fn close(&self);
}

/// Bounded hand-off of adapter events to the router queue.
///
/// An event that cannot be queued within the timeout is dropped and counted.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    events: Sender<AdapterEvent>,
    timeout: Duration,
    dropped: Arc<AtomicU64>,
}

impl EventSink {
    pub(crate) fn new(events: Sender<AdapterEvent>, timeout: Duration) -> Self {
        Self {
            events,
            timeout,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn deliver(&self, event: AdapterEvent) -> Result<()> {
        match self.events.send_timeout(event, self.timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    transport = %event.transport(),
                    dropped = total,
                    "router queue full, inbound event dropped"
                );
                Err(TransportError::QueueFull)
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(TransportError::Closed),
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
