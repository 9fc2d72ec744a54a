use std::sync::Arc;

use connectorx_eventing::{ErrorFlags, EventBus};
use connectorx_led::LedError;
use connectorx_proto::{ErrorType, Event, FatalErrorType};
use tracing::{error, warn};

use crate::error::{FileError, ModuleError, RouteError};

/// Single path for surfacing failures to hosts: raise the flag and publish
/// the event.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    bus: EventBus,
    flags: Arc<ErrorFlags>,
}

impl ErrorReporter {
    pub fn new(bus: EventBus, flags: Arc<ErrorFlags>) -> Self {
        Self { bus, flags }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn flags(&self) -> &Arc<ErrorFlags> {
        &self.flags
    }

    pub fn report(&self, kind: ErrorType, message: impl std::fmt::Display) {
        let message = message.to_string();
        warn!(?kind, %message, "error reported");
        self.flags.raise(kind);
        self.bus.send_event(&Event::error(kind, message));
    }

    pub fn fatal(&self, kind: FatalErrorType, message: impl std::fmt::Display) {
        let message = message.to_string();
        error!(?kind, %message, "fatal error reported");
        self.flags.raise_fatal(kind);
        self.bus.send_event(&Event::fatal(kind, message));
    }

    pub fn led(&self, err: &LedError) {
        self.report(led_error_kind(err), err);
    }

    pub fn module(&self, err: &ModuleError) {
        let kind = match err {
            ModuleError::NotFound(_) => ErrorType::EntityNotFound,
            _ => ErrorType::DeviceMalfunction,
        };
        self.report(kind, err);
    }

    pub fn route(&self, err: &RouteError) {
        let kind = match err {
            RouteError::QueueFull(_) | RouteError::Closed(_) => ErrorType::QueueFull,
            RouteError::Unexpected(_) => ErrorType::InvalidFile,
        };
        self.report(kind, err);
    }

    pub fn file(&self, err: &FileError) {
        let kind = match err {
            FileError::NotFound(_) => ErrorType::FileNotFound,
            FileError::InvalidPath(_) | FileError::Io(_) => ErrorType::InvalidFile,
        };
        self.report(kind, err);
    }
}

/// Host-visible error kind for an LED engine failure.
pub fn led_error_kind(err: &LedError) -> ErrorType {
    match err {
        LedError::InvalidOrMissingZone(_)
        | LedError::MissingAnimation(_)
        | LedError::MissingGroup(_)
        | LedError::MissingSequence(_)
        | LedError::MissingBitmap(_) => ErrorType::EntityNotFound,
        LedError::WrongZoneKind { expected, .. } => match expected {
            connectorx_led::ZoneKind::Strip => ErrorType::LedStrip,
            connectorx_led::ZoneKind::Matrix => ErrorType::LedMatrix,
        },
        LedError::BufferLength { .. } => ErrorType::InvalidFile,
        LedError::Bitmap(_) => ErrorType::FileNotFound,
        LedError::Driver { .. } => ErrorType::LedStrip,
    }
}
