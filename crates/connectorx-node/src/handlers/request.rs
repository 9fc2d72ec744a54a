use std::sync::Arc;

use connectorx_proto::{
    ErrorType, ModuleStatus, Request, RequestBody, Response, ResponseBody, WireMessage,
    MAX_DEVICE_DATA_LEN,
};
use tracing::debug;

use crate::led_task::LedTopology;
use crate::modules::ModuleManager;
use crate::outbound::Outbound;
use crate::report::ErrorReporter;
use crate::router::InboundRequest;
use crate::system::SystemContext;

/// Answers host queries; each response goes back to the adapter the request
/// came in on.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    context: Arc<SystemContext>,
    modules: Arc<ModuleManager>,
    topology: Arc<LedTopology>,
    outbound: Outbound,
    reporter: ErrorReporter,
}

impl RequestHandler {
    pub fn new(
        context: Arc<SystemContext>,
        modules: Arc<ModuleManager>,
        topology: Arc<LedTopology>,
        outbound: Outbound,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            context,
            modules,
            topology,
            outbound,
            reporter,
        }
    }

    pub fn handle(&self, inbound: InboundRequest) {
        let request = match Request::from_transmission(&inbound.transmission) {
            Ok(request) => request,
            Err(err) => {
                self.reporter.report(ErrorType::InvalidFile, err);
                return;
            }
        };
        let response = self.respond(&request);
        debug!(id = request.id, kind = ?request.body.request_type(), "request answered");

        match response.to_transmission() {
            Ok(transmission) => {
                self.outbound.respond(inbound.origin, &transmission);
            }
            Err(err) => self.reporter.report(ErrorType::InvalidFile, err),
        }
    }

    /// Build the response for one request.
    pub fn respond(&self, request: &Request) -> Response {
        let ctx = &self.context;
        let body = match request.body {
            RequestBody::Handshake { host } => {
                ctx.handshake_from(host);
                ResponseBody::Handshake(ctx.handshake())
            }
            RequestBody::Status => ResponseBody::Status(ctx.status()),
            RequestBody::ProductSku => ResponseBody::ProductSku(ctx.board().sku),
            RequestBody::ProductSerialNumber => {
                ResponseBody::ProductSerialNumber(ctx.board().serial_number)
            }
            RequestBody::ConfigHash => ResponseBody::ConfigHash(ctx.config_hash()),
            RequestBody::AssignedId => ResponseBody::AssignedId(ctx.assigned_id()),
            RequestBody::Faults => ResponseBody::Faults(ctx.flags().bits()),
            RequestBody::DeviceStatus { device_id } => ResponseBody::DeviceStatus {
                device_id,
                status: self
                    .modules
                    .status(device_id)
                    .unwrap_or(ModuleStatus::Missing),
            },
            RequestBody::DeviceData { device_id } => {
                let data = match self.modules.read(device_id) {
                    Ok(mut data) => {
                        data.truncate(MAX_DEVICE_DATA_LEN);
                        data
                    }
                    Err(err) => {
                        self.reporter.module(&err);
                        Vec::new()
                    }
                };
                ResponseBody::DeviceData { device_id, data }
            }
            RequestBody::LedChannelStatus { channel_id } => {
                if !self.topology.has_channel(channel_id) {
                    self.reporter.report(
                        ErrorType::EntityNotFound,
                        format_args!("channel {channel_id:#06x} not found"),
                    );
                }
                ResponseBody::LedChannelStatus { channel_id }
            }
            RequestBody::LedZoneStatus { zone_id } => {
                if !self.topology.has_zone(zone_id) {
                    self.reporter.report(
                        ErrorType::EntityNotFound,
                        format_args!("zone {zone_id:#06x} not found"),
                    );
                }
                ResponseBody::LedZoneStatus { zone_id }
            }
            RequestBody::LatestEvent => ResponseBody::LatestEvent(ctx.latest_event()),
            RequestBody::EventFlags => ResponseBody::EventFlags(ctx.event_flags()),
            RequestBody::ModuleList => ResponseBody::ModuleList(self.modules.list()),
        };
        Response::new(request.id, body)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use connectorx_eventing::{BusConfig, ErrorFlags, EventBus};
    use connectorx_proto::{ConnectionType, HostSource, Status};
    use connectorx_transport::{MemoryAdapter, TransportId};
    use crossbeam_channel::unbounded;

    use super::*;
    use crate::config::BoardInfo;

    fn handler() -> (RequestHandler, MemoryAdapter, Arc<SystemContext>) {
        let flags = Arc::new(ErrorFlags::new());
        let board = BoardInfo {
            sku: 2,
            serial_number: 0xDEAD_BEEF,
            ..BoardInfo::default()
        };
        let context = Arc::new(SystemContext::new(board, [3; 16], flags.clone()));
        let reporter = ErrorReporter::new(EventBus::new(BusConfig::default()), flags);
        let modules = Arc::new(ModuleManager::new(&[], &HashMap::new(), reporter.clone()));

        let (tx, _rx) = unbounded();
        let adapter = MemoryAdapter::new(TransportId(2), ConnectionType::Usb, tx);
        adapter.connect().unwrap();
        let outbound = Outbound::new();
        outbound.add(Arc::new(adapter.clone()));

        let handler = RequestHandler::new(
            context.clone(),
            modules,
            Arc::new(LedTopology::default()),
            outbound,
            reporter,
        );
        (handler, adapter, context)
    }

    #[test]
    fn handshake_goes_back_to_origin() {
        let (handler, adapter, context) = handler();
        let request = Request::new(
            42,
            RequestBody::Handshake {
                host: HostSource::Roborio,
            },
        );
        handler.handle(InboundRequest {
            origin: TransportId(2),
            transmission: request.to_transmission().unwrap(),
        });

        let sent = adapter.take_sent();
        let response = Response::from_transmission(&sent[0]).unwrap();
        assert_eq!(response.id, 42);
        let ResponseBody::Handshake(info) = response.body else {
            panic!("expected handshake");
        };
        assert_eq!(info.sku, 2);
        assert_eq!(info.serial, 0xDEAD_BEEF);
        assert_eq!(info.config_hash, [3; 16]);
        assert_eq!(info.status, Status::Booting);
        assert_eq!(context.host(), HostSource::Roborio);
    }

    #[test]
    fn identity_and_fault_queries() {
        let (handler, _, context) = handler();
        context.flags().raise(ErrorType::LedStrip);

        let answer = |body| handler.respond(&Request::new(1, body)).body;
        assert_eq!(answer(RequestBody::ProductSku), ResponseBody::ProductSku(2));
        assert_eq!(
            answer(RequestBody::Faults),
            ResponseBody::Faults(context.flags().bits())
        );
        assert_eq!(answer(RequestBody::AssignedId), ResponseBody::AssignedId(None));
        assert_eq!(
            answer(RequestBody::DeviceStatus { device_id: 9 }),
            ResponseBody::DeviceStatus {
                device_id: 9,
                status: ModuleStatus::Missing
            }
        );
        assert_eq!(answer(RequestBody::ModuleList), ResponseBody::ModuleList(vec![]));
    }

    #[test]
    fn unknown_zone_is_echoed_and_reported() {
        let (handler, _, context) = handler();
        let response = handler.respond(&Request::new(5, RequestBody::LedZoneStatus { zone_id: 77 }));
        assert_eq!(response.body, ResponseBody::LedZoneStatus { zone_id: 77 });
        assert!(context.flags().is_set(ErrorType::EntityNotFound));
    }
}
