use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use connectorx_frame::{FrameConfig, FrameError, Transmission, TransmissionReader, TransmissionWriter};
use connectorx_proto::ConnectionType;
use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::adapter::{AdapterEvent, EventSink, TransportAdapter, TransportId, DEFAULT_SEND_TIMEOUT};
use crate::error::{Result, TransportError};

type BoxWriter = Box<dyn Write + Send>;

/// Framing limits and router hand-off timing for a [`StreamAdapter`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub frame: FrameConfig,
    /// How long the receive thread waits on a full router queue before
    /// dropping the transmission. Default: 200ms.
    pub send_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Adapter over any blocking byte stream (serial port, socket, pipe).
///
/// A receive thread decodes the stream and forwards events. Reads that time
/// out are retried, so give the reader a read timeout if `close` must return
/// promptly.
pub struct StreamAdapter {
    id: TransportId,
    connection: ConnectionType,
    writer: Mutex<TransmissionWriter<BoxWriter>>,
    shared: Arc<Flags>,
    sink: EventSink,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct Flags {
    connected: AtomicBool,
    closing: AtomicBool,
}

impl StreamAdapter {
    /// Start the receive thread and announce the connection.
    pub fn spawn<R, W>(
        id: TransportId,
        connection: ConnectionType,
        reader: R,
        writer: W,
        events: Sender<AdapterEvent>,
        config: StreamConfig,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let shared = Arc::new(Flags::default());
        shared.connected.store(true, Ordering::Release);

        let sink = EventSink::new(events, config.send_timeout);
        match sink.deliver(AdapterEvent::Connected {
            transport: id,
            connection,
        }) {
            Ok(()) | Err(TransportError::QueueFull) => {}
            Err(err) => return Err(err),
        }

        let reader = TransmissionReader::with_config(reader, config.frame.clone());
        let flags = shared.clone();
        let rx_sink = sink.clone();
        let rx_thread = std::thread::Builder::new()
            .name(format!("connectorx-rx-{}", id.0))
            .spawn(move || receive_loop(id, connection, reader, rx_sink, flags))?;

        debug!(%id, ?connection, "stream adapter started");
        Ok(Self {
            id,
            connection,
            writer: Mutex::new(TransmissionWriter::with_config(Box::new(writer), config.frame)),
            shared,
            sink,
            rx_thread: Mutex::new(Some(rx_thread)),
        })
    }

    /// Inbound events dropped because the router queue stayed full.
    pub fn dropped_events(&self) -> u64 {
        self.sink.dropped()
    }

    /// Wait for the receive thread to finish.
    pub fn join(&self) {
        let handle = self
            .rx_thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(id = %self.id, "receive thread panicked");
            }
        }
    }
}

fn receive_loop<R: Read>(
    id: TransportId,
    connection: ConnectionType,
    mut reader: TransmissionReader<R>,
    sink: EventSink,
    flags: Arc<Flags>,
) {
    while !flags.closing.load(Ordering::Acquire) {
        let event = match reader.read_transmission() {
            Ok(transmission) => AdapterEvent::Received {
                transport: id,
                transmission,
            },
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
            {
                continue;
            }
            Err(error) if error.is_recoverable() => {
                debug!(%id, %error, "inbound transmission dropped");
                AdapterEvent::Dropped {
                    transport: id,
                    error,
                }
            }
            Err(error) => {
                if !matches!(error, FrameError::ConnectionClosed) {
                    warn!(%id, %error, "stream failed");
                }
                break;
            }
        };
        match sink.deliver(event) {
            Ok(()) | Err(TransportError::QueueFull) => {}
            Err(_) => {
                debug!(%id, "router gone, stopping receive thread");
                break;
            }
        }
    }

    flags.connected.store(false, Ordering::Release);
    if let Err(err) = sink.deliver(AdapterEvent::Disconnected {
        transport: id,
        connection,
    }) {
        debug!(%id, %err, "disconnect not delivered");
    }
    debug!(%id, "receive thread stopped");
}

impl TransportAdapter for StreamAdapter {
    fn id(&self) -> TransportId {
        self.id
    }

    fn connection(&self) -> ConnectionType {
        self.connection
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn send(&self, transmission: &Transmission) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writer.write_transmission(transmission)?;
        Ok(())
    }

    fn close(&self) {
        self.shared.closing.store(true, Ordering::Release);
        self.shared.connected.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for StreamAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    use connectorx_frame::TransmissionType;
    use crossbeam_channel::bounded;

    use super::*;

    fn pair() -> (StreamAdapter, UnixStream, crossbeam_channel::Receiver<AdapterEvent>) {
        let (local, remote) = UnixStream::pair().unwrap();
        let (tx, rx) = bounded(16);
        let adapter = StreamAdapter::spawn(
            TransportId(1),
            ConnectionType::Usb,
            local.try_clone().unwrap(),
            local,
            tx,
            StreamConfig::default(),
        )
        .unwrap();
        (adapter, remote, rx)
    }

    fn next(rx: &crossbeam_channel::Receiver<AdapterEvent>) -> AdapterEvent {
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn announces_connection_and_receives() {
        let (adapter, remote, rx) = pair();
        assert!(matches!(
            next(&rx),
            AdapterEvent::Connected {
                transport: TransportId(1),
                connection: ConnectionType::Usb
            }
        ));

        let mut host = TransmissionWriter::new(remote);
        let tx = Transmission::new(TransmissionType::Command, b"abc".to_vec()).unwrap();
        host.write_transmission(&tx).unwrap();

        match next(&rx) {
            AdapterEvent::Received { transmission, .. } => {
                assert_eq!(transmission.kind(), TransmissionType::Command);
                assert_eq!(transmission.body(), b"abc");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(adapter.is_connected());
    }

    #[test]
    fn send_reaches_peer() {
        let (adapter, remote, _rx) = pair();
        let tx = Transmission::new(TransmissionType::Event, vec![1, 2, 3]).unwrap();
        adapter.send(&tx).unwrap();

        let mut host = TransmissionReader::new(remote);
        let got = host.read_transmission().unwrap();
        assert_eq!(got, tx);
    }

    #[test]
    fn peer_hangup_disconnects() {
        let (adapter, remote, rx) = pair();
        let _ = next(&rx);
        drop(remote);

        assert!(matches!(next(&rx), AdapterEvent::Disconnected { .. }));
        adapter.join();
        assert!(!adapter.is_connected());
        let tx = Transmission::new(TransmissionType::Event, vec![]).unwrap();
        assert!(matches!(adapter.send(&tx), Err(TransportError::Closed)));
    }

    #[test]
    fn stalled_router_drops_instead_of_blocking() {
        let (local, remote) = UnixStream::pair().unwrap();
        let (tx, rx) = bounded(1);
        let adapter = StreamAdapter::spawn(
            TransportId(2),
            ConnectionType::Usb,
            local.try_clone().unwrap(),
            local,
            tx,
            StreamConfig {
                send_timeout: Duration::from_millis(10),
                ..StreamConfig::default()
            },
        )
        .unwrap();

        // The queue already holds `Connected`; nothing drains it.
        let mut host = TransmissionWriter::new(remote);
        for n in 0..3u8 {
            let tx = Transmission::new(TransmissionType::Command, vec![n]).unwrap();
            host.write_transmission(&tx).unwrap();
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while adapter.dropped_events() < 3 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(adapter.dropped_events(), 3);
        assert!(matches!(next(&rx), AdapterEvent::Connected { .. }));
        adapter.close();
    }
}
