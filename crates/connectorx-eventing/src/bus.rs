use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use connectorx_proto::{Event, EventMask, EventType};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};

use crate::error::{EventingError, Result};

/// Default bounded wait when a subscriber queue is full.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_millis(200);

/// Bus tunables.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub delivery_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

/// Handle naming one registered subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Subscribers whose queue stayed full for the whole wait.
    pub dropped: usize,
    /// Subscribers whose receiver was gone; they are unregistered.
    pub disconnected: usize,
}

struct Subscriber {
    sender: Sender<Event>,
    mask: EventMask,
}

#[derive(Default)]
struct Registry {
    subscribers: HashMap<SubscriberId, Subscriber>,
}

struct Shared {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    config: BusConfig,
}

/// Fans events out to independently subscribed queues.
///
/// Cloning is cheap; all clones share one subscriber map. The map lock is
/// only held to read or modify masks, never across a queue send.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.shared.config)
            .finish()
    }
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.shared.config
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an existing queue with an initial mask.
    pub fn register(&self, sender: Sender<Event>, mask: EventMask) -> SubscriberId {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry()
            .subscribers
            .insert(id, Subscriber { sender, mask });
        tracing::debug!(subscriber = %id, mask = mask.bits(), "subscriber registered");
        id
    }

    /// Create a bounded queue of `capacity` events and register it.
    pub fn subscribe_queue(
        &self,
        capacity: usize,
        mask: EventMask,
    ) -> (SubscriberId, Receiver<Event>) {
        let (tx, rx) = bounded(capacity);
        (self.register(tx, mask), rx)
    }

    pub fn unregister(&self, id: SubscriberId) -> Result<()> {
        self.registry()
            .subscribers
            .remove(&id)
            .map(|_| tracing::debug!(subscriber = %id, "subscriber removed"))
            .ok_or(EventingError::UnknownSubscriber(id))
    }

    /// Add one event type to a subscriber's mask.
    pub fn subscribe(&self, id: SubscriberId, event_type: EventType) -> Result<EventMask> {
        self.update_mask(id, |mask| mask.with(event_type))
    }

    /// Remove one event type from a subscriber's mask.
    pub fn unsubscribe(&self, id: SubscriberId, event_type: EventType) -> Result<EventMask> {
        self.update_mask(id, |mask| mask.without(event_type))
    }

    pub fn set_mask(&self, id: SubscriberId, mask: EventMask) -> Result<EventMask> {
        self.update_mask(id, |_| mask)
    }

    pub fn mask(&self, id: SubscriberId) -> Result<EventMask> {
        self.registry()
            .subscribers
            .get(&id)
            .map(|sub| sub.mask)
            .ok_or(EventingError::UnknownSubscriber(id))
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }

    fn update_mask(
        &self,
        id: SubscriberId,
        f: impl FnOnce(EventMask) -> EventMask,
    ) -> Result<EventMask> {
        let mut registry = self.registry();
        let sub = registry
            .subscribers
            .get_mut(&id)
            .ok_or(EventingError::UnknownSubscriber(id))?;
        sub.mask = f(sub.mask);
        Ok(sub.mask)
    }

    fn matching(&self, event_type: EventType) -> Vec<(SubscriberId, Sender<Event>)> {
        self.registry()
            .subscribers
            .iter()
            .filter(|(_, sub)| sub.mask.contains(event_type))
            .map(|(id, sub)| (*id, sub.sender.clone()))
            .collect()
    }

    fn prune(&self, gone: &[SubscriberId]) {
        if gone.is_empty() {
            return;
        }
        let mut registry = self.registry();
        for id in gone {
            registry.subscribers.remove(id);
        }
    }

    /// Deliver a copy of `event` to every subscriber whose mask includes its
    /// type, waiting at most the configured timeout per full queue.
    pub fn send_event(&self, event: &Event) -> DeliveryReport {
        let timeout = self.shared.config.delivery_timeout;
        self.deliver(event, |sender, copy| match sender.send_timeout(copy, timeout) {
            Ok(()) => Delivery::Sent,
            Err(SendTimeoutError::Timeout(_)) => Delivery::Full,
            Err(SendTimeoutError::Disconnected(_)) => Delivery::Gone,
        })
    }

    /// Non-blocking variant for callers that must never wait.
    pub fn send_event_from_isr(&self, event: &Event) -> DeliveryReport {
        self.deliver(event, |sender, copy| match sender.try_send(copy) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Disconnected(_)) => Delivery::Gone,
        })
    }

    fn deliver(
        &self,
        event: &Event,
        mut send: impl FnMut(&Sender<Event>, Event) -> Delivery,
    ) -> DeliveryReport {
        let event_type = event.event_type();
        let mut report = DeliveryReport::default();
        let mut gone = Vec::new();

        for (id, sender) in self.matching(event_type) {
            match send(&sender, event.clone()) {
                Delivery::Sent => report.delivered += 1,
                Delivery::Full => {
                    report.dropped += 1;
                    tracing::warn!(subscriber = %id, ?event_type, "subscriber queue full, event dropped");
                }
                Delivery::Gone => {
                    report.disconnected += 1;
                    gone.push(id);
                }
            }
        }

        self.prune(&gone);
        report
    }
}

enum Delivery {
    Sent,
    Full,
    Gone,
}
