use std::sync::Arc;

use connectorx_frame::Transmission;
use connectorx_led::Configuration;
use connectorx_proto::{ErrorType, FileKind, FileTransfer, WireMessage};
use tracing::{debug, info};

use crate::files::{FileService, CONFIG_PATH};
use crate::led_task::{LedHandle, LedRequest};
use crate::report::ErrorReporter;

/// Stores uploads and forwards pixel buffers to the LED task.
#[derive(Clone)]
pub struct FilesHandler {
    files: Arc<dyn FileService>,
    led: LedHandle,
    reporter: ErrorReporter,
}

impl std::fmt::Debug for FilesHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesHandler").finish_non_exhaustive()
    }
}

impl FilesHandler {
    pub fn new(files: Arc<dyn FileService>, led: LedHandle, reporter: ErrorReporter) -> Self {
        Self {
            files,
            led,
            reporter,
        }
    }

    pub fn handle(&self, transmission: Transmission) {
        let upload = match FileTransfer::from_transmission(&transmission) {
            Ok(upload) => upload,
            Err(err) => {
                self.reporter.report(ErrorType::InvalidFile, err);
                return;
            }
        };
        debug!(kind = ?upload.kind.file_type(), len = upload.bytes.len(), "file upload");

        match upload.kind {
            FileKind::Transfer { path } => {
                if let Err(err) = self.files.write_file(&path, &upload.bytes) {
                    self.reporter.file(&err);
                }
            }
            FileKind::SendConfig => self.store_config(&upload.bytes),
            FileKind::SetPixelBuffer {
                zone_id,
                zone_length,
            } => {
                let expected = usize::from(zone_length) * 3;
                if upload.bytes.len() != expected {
                    self.reporter.report(
                        ErrorType::InvalidFile,
                        format_args!(
                            "pixel buffer for {zone_id:#06x} has {} bytes, expected {expected}",
                            upload.bytes.len()
                        ),
                    );
                    return;
                }
                let request = LedRequest::ZoneBuffer {
                    zone_id,
                    rgb: upload.bytes,
                };
                if let Err(err) = self.led.send(request) {
                    self.reporter.route(&err);
                }
            }
        }
    }

    /// Validate and persist a configuration; it takes effect on restart.
    fn store_config(&self, bytes: &[u8]) {
        if let Err(err) = Configuration::parse(bytes) {
            self.reporter.report(ErrorType::InvalidConfigUpload, err);
            return;
        }
        match self.files.write_file(CONFIG_PATH, bytes) {
            Ok(()) => info!(len = bytes.len(), "configuration stored"),
            Err(err) => self.reporter.file(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use connectorx_eventing::{BusConfig, ErrorFlags, EventBus};
    use crossbeam_channel::{bounded, Receiver};

    use super::*;
    use crate::files::MemoryFileService;

    fn handler() -> (FilesHandler, MemoryFileService, Receiver<LedRequest>, Arc<ErrorFlags>) {
        let files = MemoryFileService::new();
        let flags = Arc::new(ErrorFlags::new());
        let (tx, rx) = bounded(2);
        let handler = FilesHandler::new(
            Arc::new(files.clone()),
            LedHandle::new(tx, Duration::from_millis(10)),
            ErrorReporter::new(EventBus::new(BusConfig::default()), flags.clone()),
        );
        (handler, files, rx, flags)
    }

    fn upload(kind: FileKind, bytes: &[u8]) -> Transmission {
        FileTransfer::new(kind, bytes).to_transmission().unwrap()
    }

    #[test]
    fn transfer_writes_file() {
        let (handler, files, _, flags) = handler();
        handler.handle(upload(
            FileKind::Transfer {
                path: "/bitmaps/a.bmp".into(),
            },
            b"BM",
        ));
        assert_eq!(files.read_file("/bitmaps/a.bmp").unwrap(), b"BM");
        assert!(flags.is_empty());
    }

    #[test]
    fn config_is_validated_before_storing() {
        let (handler, files, _, flags) = handler();
        handler.handle(upload(FileKind::SendConfig, b"{ nope"));
        assert!(flags.is_set(ErrorType::InvalidConfigUpload));
        assert!(!files.contains(CONFIG_PATH));

        handler.handle(upload(FileKind::SendConfig, br#"{"channels": []}"#));
        assert!(files.contains(CONFIG_PATH));
    }

    #[test]
    fn pixel_buffer_length_is_checked() {
        let (handler, _, rx, flags) = handler();
        let kind = FileKind::SetPixelBuffer {
            zone_id: 4,
            zone_length: 2,
        };
        handler.handle(upload(kind.clone(), &[1, 2, 3]));
        assert!(flags.is_set(ErrorType::InvalidFile));
        assert!(rx.try_recv().is_err());

        handler.handle(upload(kind, &[1, 2, 3, 4, 5, 6]));
        assert!(matches!(
            rx.try_recv().unwrap(),
            LedRequest::ZoneBuffer { zone_id: 4, rgb } if rgb.len() == 6
        ));
    }
}
