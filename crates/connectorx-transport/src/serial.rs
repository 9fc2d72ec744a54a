use std::time::Duration;

use connectorx_frame::FrameConfig;
use connectorx_proto::ConnectionType;
use crossbeam_channel::Sender;

use crate::adapter::{AdapterEvent, TransportId};
use crate::error::{Result, TransportError};
use crate::adapter::DEFAULT_SEND_TIMEOUT;
use crate::stream::{StreamAdapter, StreamConfig};

/// Serial line settings.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Read timeout; bounds how long `close` waits for the receive thread.
    pub read_timeout: Duration,
    /// Wait on a full router queue before dropping inbound traffic.
    pub send_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(100),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Open a serial device and run a [`StreamAdapter`] over it.
pub fn open_serial(
    id: TransportId,
    path: &str,
    serial: &SerialConfig,
    events: Sender<AdapterEvent>,
    frame: FrameConfig,
) -> Result<StreamAdapter> {
    let port = serialport::new(path, serial.baud_rate)
        .timeout(serial.read_timeout)
        .open()
        .map_err(|err| TransportError::Open {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
    let writer = port.try_clone().map_err(|err| TransportError::Open {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    tracing::info!(path, baud = serial.baud_rate, "serial port opened");
    let config = StreamConfig {
        frame,
        send_timeout: serial.send_timeout,
    };
    StreamAdapter::spawn(id, ConnectionType::Usb, port, writer, events, config)
}
