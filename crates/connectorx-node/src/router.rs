//! Inbound dispatch from adapters to handler queues.

use std::time::Duration;

use connectorx_frame::{Transmission, TransmissionType};
use connectorx_proto::Event;
use connectorx_transport::{AdapterEvent, TransportId};
use crossbeam_channel::{SendTimeoutError, Sender};
use tracing::debug;

use crate::error::RouteError;
use crate::report::ErrorReporter;

/// A request together with the adapter that must receive the answer.
#[derive(Debug)]
pub struct InboundRequest {
    pub origin: TransportId,
    pub transmission: Transmission,
}

/// Handler queues the router feeds.
#[derive(Debug, Clone)]
pub struct Routes {
    pub commands: Sender<Transmission>,
    pub requests: Sender<InboundRequest>,
    pub files: Sender<Transmission>,
    pub modules: Sender<Transmission>,
}

#[derive(Debug, Clone)]
pub struct Router {
    routes: Routes,
    reporter: ErrorReporter,
    timeout: Duration,
}

/// Send with a bounded wait; the item is dropped on failure.
pub(crate) fn send_bounded<T>(
    queue: &Sender<T>,
    item: T,
    timeout: Duration,
    name: &'static str,
) -> Result<(), RouteError> {
    queue.send_timeout(item, timeout).map_err(|err| match err {
        SendTimeoutError::Timeout(_) => RouteError::QueueFull(name),
        SendTimeoutError::Disconnected(_) => RouteError::Closed(name),
    })
}

impl Router {
    pub fn new(routes: Routes, reporter: ErrorReporter, timeout: Duration) -> Self {
        Self {
            routes,
            reporter,
            timeout,
        }
    }

    /// Handle one adapter event. Failures are reported, never returned.
    pub fn handle(&self, event: AdapterEvent) {
        match event {
            AdapterEvent::Connected {
                transport,
                connection,
            } => {
                debug!(%transport, ?connection, "host connected");
                self.reporter
                    .bus()
                    .send_event(&Event::Connected { connection });
            }
            AdapterEvent::Disconnected {
                transport,
                connection,
            } => {
                debug!(%transport, ?connection, "host disconnected");
                self.reporter
                    .bus()
                    .send_event(&Event::Disconnected { connection });
            }
            AdapterEvent::Dropped { transport, error } => {
                self.reporter.report(
                    connectorx_proto::ErrorType::InvalidFile,
                    format_args!("{transport}: {error}"),
                );
            }
            AdapterEvent::Received {
                transport,
                transmission,
            } => {
                if let Err(err) = self.route_inbound(transport, transmission) {
                    self.reporter.route(&err);
                }
            }
        }
    }

    /// Move a transmission to the queue for its type.
    pub fn route_inbound(
        &self,
        origin: TransportId,
        transmission: Transmission,
    ) -> Result<(), RouteError> {
        let kind = transmission.kind();
        debug!(%origin, ?kind, len = transmission.len(), "routing transmission");
        match kind {
            TransmissionType::Command => {
                send_bounded(&self.routes.commands, transmission, self.timeout, "command")
            }
            TransmissionType::Request => send_bounded(
                &self.routes.requests,
                InboundRequest {
                    origin,
                    transmission,
                },
                self.timeout,
                "request",
            ),
            TransmissionType::File => {
                send_bounded(&self.routes.files, transmission, self.timeout, "files")
            }
            TransmissionType::ModuleData => {
                send_bounded(&self.routes.modules, transmission, self.timeout, "module")
            }
            TransmissionType::Response | TransmissionType::Event => {
                Err(RouteError::Unexpected(kind))
            }
        }
    }
}
