use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use connectorx_frame::{FrameError, Transmission};
use connectorx_proto::ConnectionType;
use crossbeam_channel::Sender;

use crate::adapter::{AdapterEvent, EventSink, TransportAdapter, TransportId, DEFAULT_SEND_TIMEOUT};
use crate::error::{Result, TransportError};

/// In-process adapter: inbound transmissions are injected by hand and
/// outbound ones are captured.
///
/// Clones share state, so a test can keep one handle while the node owns
/// another.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    id: TransportId,
    connection: ConnectionType,
    events: EventSink,
    connected: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Transmission>>>,
}

impl MemoryAdapter {
    pub fn new(id: TransportId, connection: ConnectionType, events: Sender<AdapterEvent>) -> Self {
        Self {
            id,
            connection,
            events: EventSink::new(events, DEFAULT_SEND_TIMEOUT),
            connected: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change how long injections wait on a full router queue.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.events = self.events.with_timeout(timeout);
        self
    }

    /// Fails with `QueueFull` if the router does not accept the event in time.
    fn emit(&self, event: AdapterEvent) -> Result<()> {
        self.events.deliver(event)
    }

    /// Events dropped because the router queue stayed full.
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }

    pub fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        self.emit(AdapterEvent::Connected {
            transport: self.id,
            connection: self.connection,
        })
    }

    pub fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.emit(AdapterEvent::Disconnected {
            transport: self.id,
            connection: self.connection,
        })
    }

    /// Deliver a transmission as if it had arrived from the host.
    pub fn inject(&self, transmission: Transmission) -> Result<()> {
        self.emit(AdapterEvent::Received {
            transport: self.id,
            transmission,
        })
    }

    /// Report a reassembly drop as if the stream had been corrupted.
    pub fn inject_drop(&self, error: FrameError) -> Result<()> {
        self.emit(AdapterEvent::Dropped {
            transport: self.id,
            error,
        })
    }

    /// Take everything sent so far.
    pub fn take_sent(&self) -> Vec<Transmission> {
        std::mem::take(
            &mut *self
                .sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl TransportAdapter for MemoryAdapter {
    fn id(&self) -> TransportId {
        self.id
    }

    fn connection(&self) -> ConnectionType {
        self.connection
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, transmission: &Transmission) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        // Round-trip through the body so the stored copy is independent.
        let copy = Transmission::new(transmission.kind(), transmission.body().to_vec())?;
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(copy);
        Ok(())
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use connectorx_frame::TransmissionType;
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn inject_and_capture() {
        let (tx, rx) = bounded(8);
        let adapter = MemoryAdapter::new(TransportId(4), ConnectionType::WebUsb, tx);
        let observer = adapter.clone();

        let out = Transmission::new(TransmissionType::Event, vec![9]).unwrap();
        assert!(matches!(adapter.send(&out), Err(TransportError::Closed)));

        adapter.connect().unwrap();
        assert!(matches!(rx.try_recv().unwrap(), AdapterEvent::Connected { .. }));

        adapter
            .inject(Transmission::new(TransmissionType::Request, vec![1, 2]).unwrap())
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.transport(), TransportId(4));
        assert!(matches!(event, AdapterEvent::Received { .. }));

        adapter.send(&out).unwrap();
        assert_eq!(observer.sent_count(), 1);
        assert_eq!(observer.take_sent(), vec![out]);
        assert_eq!(observer.sent_count(), 0);
    }

    #[test]
    fn full_router_queue_times_out() {
        let (tx, rx) = bounded(1);
        let adapter = MemoryAdapter::new(TransportId(5), ConnectionType::Usb, tx)
            .with_send_timeout(Duration::from_millis(20));
        let body = || Transmission::new(TransmissionType::Command, vec![1]).unwrap();

        adapter.inject(body()).unwrap();
        let started = std::time::Instant::now();
        assert!(matches!(adapter.inject(body()), Err(TransportError::QueueFull)));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(adapter.dropped_events(), 1);

        drop(rx);
        assert!(matches!(adapter.inject(body()), Err(TransportError::Closed)));
    }
}
