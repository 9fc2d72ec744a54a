//! The thread that owns the LED engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use connectorx_led::LedService;
use connectorx_proto::LedCommand;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::error::RouteError;
use crate::report::ErrorReporter;
use crate::router::send_bounded;

/// Work for the LED task.
#[derive(Debug)]
pub enum LedRequest {
    Command(LedCommand),
    /// Raw `r, g, b` bytes for one zone.
    ZoneBuffer { zone_id: u16, rgb: Vec<u8> },
}

/// Channel and zone ids fixed at boot, readable from any task.
#[derive(Debug, Clone, Default)]
pub struct LedTopology {
    channels: HashSet<u16>,
    zones: HashSet<u16>,
}

impl LedTopology {
    pub fn of(service: &LedService) -> Self {
        let mut topology = Self::default();
        for channel in service.channels() {
            topology.channels.insert(channel.id());
            topology.zones.extend(channel.zones().iter().map(|zone| zone.id()));
        }
        topology
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn has_channel(&self, id: u16) -> bool {
        self.channels.contains(&id)
    }

    pub fn has_zone(&self, id: u16) -> bool {
        self.zones.contains(&id)
    }
}

/// Sending side of the LED task queue.
#[derive(Debug, Clone)]
pub struct LedHandle {
    queue: Sender<LedRequest>,
    timeout: Duration,
}

impl LedHandle {
    pub fn new(queue: Sender<LedRequest>, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    pub fn send(&self, request: LedRequest) -> Result<(), RouteError> {
        send_bounded(&self.queue, request, self.timeout, "led")
    }

    pub fn command(&self, command: LedCommand) -> Result<(), RouteError> {
        self.send(LedRequest::Command(command))
    }
}

/// Upper bound on requests applied between ticks on an unbounded queue.
const MAX_BATCH: usize = 64;

pub struct LedTask {
    service: LedService,
    requests: Receiver<LedRequest>,
    reporter: ErrorReporter,
    tick: Duration,
}

impl LedTask {
    pub fn new(
        service: LedService,
        requests: Receiver<LedRequest>,
        reporter: ErrorReporter,
        tick: Duration,
    ) -> Self {
        Self {
            service,
            requests,
            reporter,
            tick,
        }
    }

    pub fn service(&self) -> &LedService {
        &self.service
    }

    /// Apply one request; failures go to the reporter.
    pub fn handle(&mut self, request: LedRequest) {
        let result = match request {
            LedRequest::Command(command) => self.service.apply(&command),
            LedRequest::ZoneBuffer { zone_id, rgb } => self.service.set_zone_buffer(zone_id, &rgb),
        };
        if let Err(err) = result {
            self.reporter.led(&err);
        }
    }

    /// Advance every channel once.
    pub fn tick(&mut self) {
        if let Err(err) = self.service.tick() {
            self.reporter.led(&err);
        }
    }

    /// Tick on a fixed period, applying requests as they arrive, until `stop`.
    pub fn run(mut self, stop: Arc<AtomicBool>) {
        debug!(channels = self.service.channels().len(), "led task started");
        let mut next_tick = Instant::now();
        while !stop.load(Ordering::Acquire) {
            if !self.step(&mut next_tick) {
                break;
            }
        }
        debug!("led task stopped");
    }

    /// Wait until the next tick is due, apply at most one queue's worth of
    /// requests, then tick if the period has elapsed. Returns `false` once
    /// every producer is gone.
    fn step(&mut self, next_tick: &mut Instant) -> bool {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match self.requests.recv_timeout(wait) {
            Ok(request) => {
                self.handle(request);
                let limit = self.requests.capacity().unwrap_or(MAX_BATCH);
                let batch: Vec<LedRequest> = self.requests.try_iter().take(limit).collect();
                for request in batch {
                    self.handle(request);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }

        let now = Instant::now();
        if now >= *next_tick {
            self.tick();
            *next_tick += self.tick;
            if *next_tick < now {
                *next_tick = now;
            }
        }
        true
    }
}
