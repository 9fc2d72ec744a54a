//! Device status, host-visible identity, heartbeat and the status LED.

use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use connectorx_eventing::{ErrorFlags, EventBus};
use connectorx_led::{create_id, RGB8};
use connectorx_proto::{
    Event, EventType, HandshakeInfo, HeartBeat, HostSource, LedCommand, Status, Target,
};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, info};

use crate::config::BoardInfo;
use crate::led_task::LedHandle;

/// State shared by the request handler, command handler and system service.
#[derive(Debug)]
pub struct SystemContext {
    board: BoardInfo,
    config_hash: [u8; 16],
    flags: Arc<ErrorFlags>,
    status: AtomicI8,
    host: AtomicU8,
    connected: AtomicBool,
    enabled: AtomicBool,
    assigned_id: Mutex<Option<String>>,
    latest_event: AtomicU32,
    event_flags: AtomicU32,
    restart: AtomicBool,
}

impl SystemContext {
    pub fn new(board: BoardInfo, config_hash: [u8; 16], flags: Arc<ErrorFlags>) -> Self {
        Self {
            board,
            config_hash,
            flags,
            status: AtomicI8::new(Status::Booting as i8),
            host: AtomicU8::new(HostSource::Unknown as u8),
            connected: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            assigned_id: Mutex::new(None),
            latest_event: AtomicU32::new(EventType::BeginInitialization.bit()),
            event_flags: AtomicU32::new(0),
            restart: AtomicBool::new(false),
        }
    }

    pub fn board(&self) -> &BoardInfo {
        &self.board
    }

    pub fn config_hash(&self) -> [u8; 16] {
        self.config_hash
    }

    pub fn flags(&self) -> &Arc<ErrorFlags> {
        &self.flags
    }

    pub fn status(&self) -> Status {
        Status::try_from(self.status.load(Ordering::Acquire)).unwrap_or(Status::Unknown)
    }

    /// Returns whether the status changed.
    pub fn set_status(&self, status: Status) -> bool {
        let previous = self.status.swap(status as i8, Ordering::AcqRel);
        previous != status as i8
    }

    pub fn host(&self) -> HostSource {
        HostSource::try_from(self.host.load(Ordering::Acquire)).unwrap_or(HostSource::Unknown)
    }

    /// Record a handshake from `host`.
    pub fn handshake_from(&self, host: HostSource) {
        self.host.store(host as u8, Ordering::Release);
        self.connected.store(true, Ordering::Release);
        info!(?host, "host handshake");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn assigned_id(&self) -> Option<String> {
        self.assigned_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_assigned_id(&self, id: impl Into<String>) {
        let id = id.into();
        info!(%id, "assigned id set");
        *self
            .assigned_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id);
    }

    /// Type of the most recent observed event.
    pub fn latest_event(&self) -> EventType {
        EventType::try_from(self.latest_event.load(Ordering::Acquire))
            .unwrap_or(EventType::BeginInitialization)
    }

    /// Union of every observed event type.
    pub fn event_flags(&self) -> u32 {
        self.event_flags.load(Ordering::Acquire)
    }

    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::Release);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart.load(Ordering::Acquire)
    }

    /// Clear error flags; an errored device with no flags left is active again.
    pub fn clear_flags(&self, mask: u32) -> Status {
        let remaining = self.flags.clear_mask(mask);
        if remaining == 0 && self.status() == Status::Error {
            self.set_status(Status::Active);
        }
        self.status()
    }

    /// Fold one event into the context; returns the new status if it changed.
    pub fn observe(&self, event: &Event) -> Option<Status> {
        let event_type = event.event_type();
        if event_type != EventType::HeartBeat {
            self.latest_event.store(event_type.bit(), Ordering::Release);
            self.event_flags.fetch_or(event_type.bit(), Ordering::AcqRel);
        }

        let current = self.status();
        let next = match event {
            Event::FinishInitialization if current != Status::Fatal => Some(Status::Active),
            Event::Error { .. } if current != Status::Fatal => Some(Status::Error),
            Event::FatalError { .. } => Some(Status::Fatal),
            Event::Connected { .. } => {
                self.connected.store(true, Ordering::Release);
                None
            }
            Event::Disconnected { .. } => {
                self.connected.store(false, Ordering::Release);
                None
            }
            Event::Enabled => {
                self.enabled.store(true, Ordering::Release);
                None
            }
            Event::Disabled { .. } => {
                self.enabled.store(false, Ordering::Release);
                None
            }
            _ => None,
        };
        next.filter(|status| self.set_status(*status))
    }

    pub fn handshake(&self) -> HandshakeInfo {
        HandshakeInfo {
            status: self.status(),
            sku: self.board.sku,
            serial: self.board.serial_number,
            config_hash: self.config_hash,
            assigned_id: self.assigned_id(),
            version: self.board.firmware,
        }
    }

    pub fn heartbeat(&self) -> HeartBeat {
        HeartBeat {
            status: self.status(),
            enabled: self.is_enabled(),
            connected_usb: self.is_connected(),
            can_ok: false,
        }
    }
}

/// Status-LED pattern: animation name, delay, colour.
pub fn status_pattern(status: Status) -> Option<(&'static str, u16, RGB8)> {
    match status {
        Status::Booting => Some(("Blink", 250, RGB8::new(0, 255, 50))),
        Status::Active => Some(("Breathe", 10, RGB8::new(0, 20, 200))),
        Status::Error => Some(("Blink", 500, RGB8::new(120, 30, 5))),
        Status::Fatal => Some(("Blink", 250, RGB8::new(255, 0, 0))),
        Status::Unknown => None,
    }
}

/// Tracks status from the event stream and emits heartbeats.
pub struct SystemService {
    context: Arc<SystemContext>,
    bus: EventBus,
    led: LedHandle,
    status_zone: Option<u16>,
}

impl SystemService {
    pub fn new(
        context: Arc<SystemContext>,
        bus: EventBus,
        led: LedHandle,
        status_zone: Option<u16>,
    ) -> Self {
        Self {
            context,
            bus,
            led,
            status_zone,
        }
    }

    /// Point the status zone at the pattern for `status`.
    pub fn show_status(&self, status: Status) {
        let (Some(zone), Some((animation, delay_ms, color))) =
            (self.status_zone, status_pattern(status))
        else {
            return;
        };
        let command = LedCommand::SetAnimation {
            target: Target::Zone(zone),
            animation_id: create_id(animation),
            delay_ms,
            color,
            reversed: false,
            one_shot: false,
        };
        if let Err(err) = self.led.command(command) {
            debug!(%err, "status led update dropped");
        }
    }

    pub fn handle(&self, event: &Event) {
        if let Some(status) = self.context.observe(event) {
            info!(?status, "status changed");
            self.show_status(status);
        }
    }

    pub fn run(
        self,
        events: Receiver<Event>,
        heartbeat: Duration,
        poll: Duration,
        stop: Arc<AtomicBool>,
    ) {
        self.show_status(self.context.status());
        let mut next_beat = Instant::now() + heartbeat;
        while !stop.load(Ordering::Acquire) {
            let wait = next_beat
                .saturating_duration_since(Instant::now())
                .min(poll);
            match events.recv_timeout(wait) {
                Ok(event) => self.handle(&event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if Instant::now() >= next_beat {
                self.bus
                    .send_event(&Event::HeartBeat(self.context.heartbeat()));
                next_beat += heartbeat;
            }
        }
        debug!("system service stopped");
    }
}

#[cfg(test)]
mod tests {
    use connectorx_eventing::BusConfig;
    use connectorx_proto::{ConnectionType, ErrorType, FatalErrorType};
    use crossbeam_channel::bounded;

    use super::*;
    use crate::led_task::LedRequest;

    fn context() -> SystemContext {
        SystemContext::new(BoardInfo::default(), [7; 16], Arc::new(ErrorFlags::new()))
    }

    #[test]
    fn status_follows_events() {
        let ctx = context();
        assert_eq!(ctx.status(), Status::Booting);
        assert_eq!(ctx.observe(&Event::FinishInitialization), Some(Status::Active));
        assert_eq!(ctx.observe(&Event::FinishInitialization), None);
        assert_eq!(
            ctx.observe(&Event::error(ErrorType::QueueFull, "x")),
            Some(Status::Error)
        );
        assert_eq!(
            ctx.observe(&Event::fatal(FatalErrorType::BadConfig, "x")),
            Some(Status::Fatal)
        );
        assert_eq!(ctx.observe(&Event::error(ErrorType::QueueFull, "x")), None);
        assert_eq!(ctx.observe(&Event::FinishInitialization), None);
        assert_eq!(ctx.status(), Status::Fatal);
    }

    #[test]
    fn records_latest_event_and_flags() {
        let ctx = context();
        ctx.observe(&Event::Connected {
            connection: ConnectionType::Usb,
        });
        ctx.observe(&Event::error(ErrorType::InvalidFile, "x"));
        ctx.observe(&Event::HeartBeat(ctx.heartbeat()));
        assert_eq!(ctx.latest_event(), EventType::Error);
        assert_eq!(
            ctx.event_flags(),
            EventType::Connected.bit() | EventType::Error.bit()
        );
        assert!(ctx.is_connected());
        assert!(ctx.heartbeat().connected_usb);
    }

    #[test]
    fn clearing_last_flag_restores_active() {
        let ctx = context();
        ctx.observe(&Event::FinishInitialization);
        ctx.flags().raise(ErrorType::QueueFull);
        ctx.observe(&Event::error(ErrorType::QueueFull, "x"));
        assert_eq!(ctx.status(), Status::Error);
        assert_eq!(ctx.clear_flags(u32::MAX), Status::Active);
        assert!(ctx.flags().is_empty());
    }

    #[test]
    fn handshake_snapshot() {
        let ctx = context();
        ctx.set_assigned_id("front-left");
        ctx.handshake_from(HostSource::Studio);
        let info = ctx.handshake();
        assert_eq!(info.config_hash, [7; 16]);
        assert_eq!(info.assigned_id.as_deref(), Some("front-left"));
        assert_eq!(ctx.host(), HostSource::Studio);
        assert!(ctx.is_connected());
    }

    #[test]
    fn status_change_drives_status_zone() {
        let (tx, rx) = bounded(4);
        let service = SystemService::new(
            Arc::new(context()),
            EventBus::new(BusConfig::default()),
            LedHandle::new(tx, Duration::from_millis(10)),
            Some(create_id("status")),
        );
        service.handle(&Event::FinishInitialization);
        let Ok(LedRequest::Command(LedCommand::SetAnimation {
            target,
            animation_id,
            delay_ms,
            ..
        })) = rx.try_recv()
        else {
            panic!("expected status animation");
        };
        assert_eq!(target, Target::Zone(create_id("status")));
        assert_eq!(animation_id, create_id("Breathe"));
        assert_eq!(delay_ms, 10);
        assert!(rx.try_recv().is_err());
    }
}
