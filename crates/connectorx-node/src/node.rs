//! Composition root: wires queues, services and threads into a running device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use connectorx_eventing::{BusConfig, ErrorFlags, EventBus};
use connectorx_led::{
    create_id, BitmapReader, ChannelConfig, Clock, Configuration, LedDriver, LedService,
    MemoryBitmaps, MonotonicClock, NullDriver, RegistryBuilder,
};
use connectorx_proto::{ErrorType, Event, EventMask, FatalErrorType, Status, WireMessage};
use connectorx_transport::{AdapterEvent, TransportAdapter, TransportError};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::config::{BoardInfo, NodeConfig};
use crate::error::{NodeError, Result};
use crate::files::{FileService, MemoryFileService};
use crate::handlers::{serve, CommandHandler, FilesHandler, ModuleHandler, RequestHandler};
use crate::led_task::{LedHandle, LedTask, LedTopology};
use crate::modules::{ModuleFactory, ModuleManager};
use crate::outbound::Outbound;
use crate::report::ErrorReporter;
use crate::router::{Router, Routes};
use crate::system::{SystemContext, SystemService};

type DriverFactory = Box<dyn FnMut(&ChannelConfig) -> Box<dyn LedDriver>>;

/// Collects everything a node needs before its threads start.
pub struct NodeBuilder {
    config: Configuration,
    node: NodeConfig,
    board: BoardInfo,
    bus: BusConfig,
    bitmaps: Box<dyn BitmapReader>,
    files: Arc<dyn FileService>,
    clock: Arc<dyn Clock>,
    driver_for: DriverFactory,
    module_types: HashMap<String, ModuleFactory>,
}

impl std::fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("node", &self.node)
            .field("board", &self.board)
            .field("module_types", &self.module_types.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl NodeBuilder {
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            node: NodeConfig::default(),
            board: BoardInfo::default(),
            bus: BusConfig::default(),
            bitmaps: Box::new(MemoryBitmaps::new()),
            files: Arc::new(MemoryFileService::new()),
            clock: Arc::new(MonotonicClock::new()),
            driver_for: Box::new(|_| -> Box<dyn LedDriver> { Box::new(NullDriver) }),
            module_types: HashMap::new(),
        }
    }

    /// Parse a JSON configuration document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(Configuration::from_json_slice(bytes)?))
    }

    pub fn with_node_config(mut self, node: NodeConfig) -> Self {
        self.node = node;
        self
    }

    pub fn with_board(mut self, board: BoardInfo) -> Self {
        self.board = board;
        self
    }

    pub fn with_bus_config(mut self, bus: BusConfig) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_bitmaps(mut self, bitmaps: Box<dyn BitmapReader>) -> Self {
        self.bitmaps = bitmaps;
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FileService>) -> Self {
        self.files = files;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Choose the LED driver for each configured channel.
    pub fn with_driver_factory<F>(mut self, driver_for: F) -> Self
    where
        F: FnMut(&ChannelConfig) -> Box<dyn LedDriver> + 'static,
    {
        self.driver_for = Box::new(driver_for);
        self
    }

    /// Register a module type; sensors whose `type` matches `name` use it.
    pub fn with_module_type(mut self, name: impl Into<String>, factory: ModuleFactory) -> Self {
        self.module_types.insert(name.into(), factory);
        self
    }

    /// Register the configuration, start every service thread and return
    /// the running node.
    pub fn build(mut self) -> Result<Node> {
        let flags = Arc::new(ErrorFlags::new());
        let bus = EventBus::new(self.bus.clone());
        let reporter = ErrorReporter::new(bus.clone(), flags.clone());
        let context = Arc::new(SystemContext::new(
            self.board.clone(),
            self.config.hash,
            flags.clone(),
        ));
        let (_, system_events) = bus.subscribe_queue(self.node.queue_capacity, EventMask::ALL);
        bus.send_event(&Event::BeginInitialization);

        let registry = match self.register() {
            Ok(registry) => registry,
            Err(err) => {
                error!(%err, "configuration rejected");
                reporter.fatal(FatalErrorType::BadConfig, &err);
                context.set_status(Status::Fatal);
                return Err(NodeError::BadConfig(err.to_string()));
            }
        };

        let service = LedService::from_configuration(
            &self.config,
            registry,
            std::mem::replace(&mut self.bitmaps, Box::new(MemoryBitmaps::new())),
            self.clock.clone(),
            self.board.power,
            &mut self.driver_for,
        );
        let topology = Arc::new(LedTopology::of(&service));
        let status_zone = self.config.status_zone.as_deref().map(create_id);
        let modules = Arc::new(ModuleManager::new(
            &self.config.sensors,
            &self.module_types,
            reporter.clone(),
        ));

        let cfg = &self.node;
        let (inbound_tx, inbound_rx) = bounded(cfg.inbound_capacity);
        let (command_tx, command_rx) = bounded(cfg.queue_capacity);
        let (request_tx, request_rx) = bounded(cfg.queue_capacity);
        let (files_tx, files_rx) = bounded(cfg.queue_capacity);
        let (module_tx, module_rx) = bounded(cfg.queue_capacity);
        let (led_tx, led_rx) = bounded(cfg.queue_capacity);
        let (_, forwarded) = bus.subscribe_queue(cfg.queue_capacity, cfg.forwarded_events);

        let led = LedHandle::new(led_tx, cfg.queue_timeout);
        let outbound = Outbound::new();
        let router = Router::new(
            Routes {
                commands: command_tx,
                requests: request_tx,
                files: files_tx,
                modules: module_tx,
            },
            reporter.clone(),
            cfg.queue_timeout,
        );

        let mut node = Node {
            context: context.clone(),
            bus: bus.clone(),
            outbound: outbound.clone(),
            topology: topology.clone(),
            led: led.clone(),
            inbound: inbound_tx,
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        };

        let started = node.start(Services {
            cfg: cfg.clone(),
            router,
            inbound: inbound_rx,
            forwarded,
            system_events,
            commands: (
                command_rx,
                CommandHandler::new(led.clone(), context.clone(), reporter.clone()),
            ),
            requests: (
                request_rx,
                RequestHandler::new(
                    context.clone(),
                    modules.clone(),
                    topology,
                    outbound.clone(),
                    reporter.clone(),
                ),
            ),
            files: (
                files_rx,
                FilesHandler::new(self.files.clone(), led.clone(), reporter.clone()),
            ),
            module: (module_rx, ModuleHandler::new(modules.clone(), reporter.clone())),
            modules,
            led_task: LedTask::new(service, led_rx, reporter.clone(), cfg.led_tick),
            system: SystemService::new(context, bus.clone(), led, status_zone),
        });
        if let Err(err) = started {
            reporter.fatal(FatalErrorType::StartTask, &err);
            node.shutdown();
            return Err(err);
        }

        bus.send_event(&Event::FinishInitialization);
        info!(
            channels = node.topology.channel_count(),
            threads = node.threads.len(),
            "node started"
        );
        Ok(node)
    }

    fn register(&self) -> std::result::Result<Arc<connectorx_led::AnimationRegistry>, NodeError> {
        self.config.validate()?;
        let mut builder = RegistryBuilder::with_builtins();
        let skipped = builder.register_configuration(&self.config, self.bitmaps.as_ref())?;
        for (id, err) in skipped {
            debug!(bitmap = %id, %err, "bitmap skipped");
        }
        Ok(builder.build())
    }
}

/// Everything the service threads take ownership of.
struct Services {
    cfg: NodeConfig,
    router: Router,
    inbound: Receiver<AdapterEvent>,
    forwarded: Receiver<Event>,
    system_events: Receiver<Event>,
    commands: (Receiver<connectorx_frame::Transmission>, CommandHandler),
    requests: (Receiver<crate::router::InboundRequest>, RequestHandler),
    files: (Receiver<connectorx_frame::Transmission>, FilesHandler),
    module: (Receiver<connectorx_frame::Transmission>, ModuleHandler),
    modules: Arc<ModuleManager>,
    led_task: LedTask,
    system: SystemService,
}

/// A running device. Dropping it stops every thread.
pub struct Node {
    context: Arc<SystemContext>,
    bus: EventBus,
    outbound: Outbound,
    topology: Arc<LedTopology>,
    led: LedHandle,
    inbound: Sender<AdapterEvent>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("status", &self.context.status())
            .field("outbound", &self.outbound)
            .field("threads", &self.threads.len())
            .finish_non_exhaustive()
    }
}

impl Node {
    fn spawn(&mut self, name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<()> {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(body)
            .map_err(|source| NodeError::Spawn { name, source })?;
        self.threads.push(handle);
        Ok(())
    }

    fn start(&mut self, services: Services) -> Result<()> {
        let Services {
            cfg,
            router,
            inbound,
            forwarded,
            system_events,
            commands,
            requests,
            files,
            module,
            modules,
            led_task,
            system,
        } = services;
        let poll = cfg.poll_interval;

        let stop = self.stop.clone();
        self.spawn("cx-router", move || {
            serve(&inbound, poll, &stop, |event| router.handle(event));
        })?;

        let stop = self.stop.clone();
        let outbound = self.outbound.clone();
        self.spawn("cx-net-tx", move || {
            serve(&forwarded, poll, &stop, |event| match event.to_transmission() {
                Ok(transmission) => {
                    outbound.broadcast(&transmission);
                }
                Err(err) => debug!(%err, "event not forwarded"),
            });
        })?;

        let stop = self.stop.clone();
        self.spawn("cx-command", move || {
            let (queue, handler) = commands;
            serve(&queue, poll, &stop, |t| handler.handle(t));
        })?;

        let stop = self.stop.clone();
        self.spawn("cx-request", move || {
            let (queue, handler) = requests;
            serve(&queue, poll, &stop, |r| handler.handle(r));
        })?;

        let stop = self.stop.clone();
        self.spawn("cx-files", move || {
            let (queue, handler) = files;
            serve(&queue, poll, &stop, |t| handler.handle(t));
        })?;

        let stop = self.stop.clone();
        self.spawn("cx-module", move || {
            let (queue, handler) = module;
            serve(&queue, poll, &stop, |t| handler.handle(t));
        })?;

        let stop = self.stop.clone();
        let outbound = self.outbound.clone();
        self.spawn("cx-module-poll", move || {
            modules.run_poller(outbound, poll, stop);
        })?;

        let stop = self.stop.clone();
        self.spawn("cx-led", move || led_task.run(stop))?;

        let stop = self.stop.clone();
        let heartbeat = cfg.heartbeat_period;
        self.spawn("cx-system", move || {
            system.run(system_events, heartbeat, poll, stop);
        })?;
        Ok(())
    }

    /// Create an adapter on this node's inbound queue and start sending to it.
    pub fn attach<A, F>(&self, connect: F) -> std::result::Result<Arc<A>, TransportError>
    where
        A: TransportAdapter + 'static,
        F: FnOnce(Sender<AdapterEvent>) -> std::result::Result<A, TransportError>,
    {
        let adapter = Arc::new(connect(self.inbound.clone())?);
        self.outbound.add(adapter.clone());
        debug!(id = %adapter.id(), "adapter attached");
        Ok(adapter)
    }

    pub fn context(&self) -> &Arc<SystemContext> {
        &self.context
    }

    pub fn status(&self) -> Status {
        self.context.status()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn flags(&self) -> &Arc<ErrorFlags> {
        self.context.flags()
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn topology(&self) -> &LedTopology {
        &self.topology
    }

    /// Queue LED work from outside the protocol path.
    pub fn led(&self) -> &LedHandle {
        &self.led
    }

    /// Set once a host sends `RestartDevice`.
    pub fn restart_requested(&self) -> bool {
        self.context.restart_requested()
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }

    /// Stop every thread and close every adapter. Idempotent.
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() && !self.is_running() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        self.outbound.close_all();
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("?").to_string();
            if handle.join().is_err() {
                self.bus.send_event(&Event::error(
                    ErrorType::DeviceMalfunction,
                    format!("{name} panicked"),
                ));
                error!(thread = %name, "service thread panicked");
            }
        }
        info!("node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use connectorx_frame::{Transmission, TransmissionType};
    use connectorx_led::{RecordingDriver, RGB8};
    use connectorx_proto::{
        Command, ConnectionType, HostSource, LedCommand, Request, RequestBody, Response,
        ResponseBody, SystemCommand, Target,
    };
    use connectorx_transport::{MemoryAdapter, TransportId};

    use super::*;

    const CONFIG: &[u8] = br#"{
        "channels": [{
            "key": "CH1", "id": "main", "length": 4,
            "zones": [{"id": "zone1", "type": "strip", "length": 4}]
        }]
    }"#;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn node(driver: RecordingDriver) -> (Node, Arc<MemoryAdapter>) {
        let node = NodeBuilder::from_json(CONFIG)
            .unwrap()
            .with_node_config(NodeConfig {
                poll_interval: Duration::from_millis(5),
                ..NodeConfig::default()
            })
            .with_driver_factory(move |_| -> Box<dyn LedDriver> { Box::new(driver.clone()) })
            .build()
            .unwrap();
        let adapter = node
            .attach(|events| Ok(MemoryAdapter::new(TransportId(0), ConnectionType::Usb, events)))
            .unwrap();
        adapter.connect().unwrap();
        (node, adapter)
    }

    fn responses(adapter: &MemoryAdapter, seen: &mut Vec<Transmission>) -> usize {
        seen.extend(
            adapter
                .take_sent()
                .into_iter()
                .filter(|t| t.kind() == TransmissionType::Response),
        );
        seen.len()
    }

    #[test]
    fn handshake_round_trip() {
        let (node, adapter) = node(RecordingDriver::new());
        assert!(wait_for(|| node.status() == Status::Active));

        let request = Request::new(
            7,
            RequestBody::Handshake {
                host: HostSource::Studio,
            },
        );
        adapter.inject(request.to_transmission().unwrap()).unwrap();

        let mut seen = Vec::new();
        assert!(wait_for(|| responses(&adapter, &mut seen) > 0));
        let response = Response::from_transmission(&seen[0]).unwrap();
        assert_eq!(response.id, 7);
        assert!(matches!(response.body, ResponseBody::Handshake(_)));
        assert_eq!(node.context().host(), HostSource::Studio);
        assert!(node.context().is_connected());
    }

    #[test]
    fn set_color_reaches_driver() {
        let driver = RecordingDriver::new();
        let (node, adapter) = node(driver.clone());

        let color = RGB8::new(10, 20, 30);
        let command = Command::Led(LedCommand::SetColor {
            target: Target::Zone(create_id("zone1")),
            color,
        });
        adapter.inject(command.to_transmission().unwrap()).unwrap();

        assert!(wait_for(|| driver.last_frame() == Some(vec![color; 4])));
        assert!(node.flags().is_empty());
    }

    #[test]
    fn restart_command_is_visible() {
        let (node, adapter) = node(RecordingDriver::new());
        let command = Command::System(SystemCommand::RestartDevice { delay_ms: 0 });
        adapter.inject(command.to_transmission().unwrap()).unwrap();
        assert!(wait_for(|| node.restart_requested()));
    }

    #[test]
    fn bad_configuration_is_fatal() {
        let config = br#"{"channels": [{"key": "CH1", "id": "main", "length": 2,
            "zones": [{"id": "z", "type": "strip", "length": 5}]}]}"#;
        let err = NodeBuilder::from_json(config).unwrap().build().unwrap_err();
        assert!(matches!(err, NodeError::BadConfig(_)));
    }

    #[test]
    fn shutdown_joins_threads() {
        let (mut node, _adapter) = node(RecordingDriver::new());
        assert!(node.is_running());
        node.shutdown();
        assert!(!node.is_running());
        node.shutdown();
    }
}
