//! Sensor and actuator modules: an open plugin registry plus a poller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use connectorx_led::{create_id, SensorConfig};
use connectorx_proto::{ModuleData, ModuleListEntry, ModuleStatus, WireMessage, MAX_MODULE_SAMPLE_LEN};
use tracing::{debug, info};

use crate::error::ModuleError;
use crate::outbound::Outbound;
use crate::report::ErrorReporter;

/// A pluggable device driver.
pub trait Module: Send {
    fn init(&mut self) -> Result<(), ModuleError>;

    /// Take one sample.
    fn read(&mut self) -> Result<Vec<u8>, ModuleError>;

    /// Apply settings pushed by the host.
    fn push_data(&mut self, _data: &serde_json::Value) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Builds a module from its configuration entry.
pub type ModuleFactory =
    Arc<dyn Fn(&SensorConfig) -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

struct SlotState {
    module: Option<Box<dyn Module>>,
    status: ModuleStatus,
    next_poll: Instant,
}

struct ModuleSlot {
    id: u16,
    config: SensorConfig,
    state: Mutex<SlotState>,
}

impl ModuleSlot {
    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Every configured module, each behind its own lock.
pub struct ModuleManager {
    slots: Vec<ModuleSlot>,
    reporter: ErrorReporter,
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl ModuleManager {
    /// Create and initialise every module. Failures leave the module in an
    /// error or missing state and are reported; they never abort boot.
    pub fn new(
        sensors: &[SensorConfig],
        factories: &HashMap<String, ModuleFactory>,
        reporter: ErrorReporter,
    ) -> Self {
        let now = Instant::now();
        let slots = sensors
            .iter()
            .map(|config| {
                let (module, status) = match start(config, factories) {
                    Ok(module) => (Some(module), ModuleStatus::Ok),
                    Err(err @ ModuleError::UnknownType(_)) => {
                        reporter.module(&err);
                        (None, ModuleStatus::Missing)
                    }
                    Err(err) => {
                        reporter.module(&err);
                        (None, ModuleStatus::Error)
                    }
                };
                info!(module = %config.id, kind = %config.kind, ?status, "module registered");
                ModuleSlot {
                    id: create_id(&config.id),
                    config: config.clone(),
                    state: Mutex::new(SlotState {
                        module,
                        status,
                        next_poll: now,
                    }),
                }
            })
            .collect();
        Self { slots, reporter }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: u16) -> Result<&ModuleSlot, ModuleError> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .ok_or(ModuleError::NotFound(id))
    }

    pub fn status(&self, id: u16) -> Option<ModuleStatus> {
        self.slot(id).ok().map(|slot| slot.state().status)
    }

    /// The first entries that fit in a module list response.
    pub fn list(&self) -> Vec<ModuleListEntry> {
        self.slots
            .iter()
            .take(connectorx_proto::MAX_MODULE_LIST_ENTRIES)
            .map(|slot| ModuleListEntry {
                module_id: slot.id,
                name: slot.config.id.clone(),
                kind: slot.config.kind.clone(),
                polling_rate_ms: slot.config.polling_rate_ms,
                connection: slot.config.connection_type.into(),
            })
            .collect()
    }

    /// Take a sample now.
    pub fn read(&self, id: u16) -> Result<Vec<u8>, ModuleError> {
        let slot = self.slot(id)?;
        let mut guard = slot.state();
        let state = &mut *guard;
        let result = match state.module.as_mut() {
            Some(module) if state.status == ModuleStatus::Ok => module.read(),
            _ => return Err(ModuleError::Faulted(id)),
        };
        if result.is_err() {
            state.status = ModuleStatus::Error;
        }
        result
    }

    /// Forward host JSON to a module.
    pub fn push_data(&self, id: u16, json: &[u8]) -> Result<(), ModuleError> {
        let value: serde_json::Value = serde_json::from_slice(json)?;
        let slot = self.slot(id)?;
        let mut state = slot.state();
        match state.module.as_mut() {
            Some(module) => module.push_data(&value),
            None => Err(ModuleError::Faulted(id)),
        }
    }

    /// Read every healthy module whose polling period has elapsed and
    /// broadcast the samples. Returns how many were sent.
    pub fn poll_due(&self, now: Instant, outbound: &Outbound) -> usize {
        let mut sent = 0;
        for slot in &self.slots {
            let sample = {
                let mut state = slot.state();
                if state.status != ModuleStatus::Ok || now < state.next_poll {
                    continue;
                }
                state.next_poll = now + Duration::from_millis(u64::from(slot.config.polling_rate_ms));
                let Some(module) = state.module.as_mut() else {
                    continue;
                };
                match module.read() {
                    Ok(sample) => sample,
                    Err(err) => {
                        state.status = ModuleStatus::Error;
                        drop(state);
                        self.reporter.module(&err);
                        continue;
                    }
                }
            };

            let mut data = sample;
            data.truncate(MAX_MODULE_SAMPLE_LEN);
            let message = ModuleData::NewData {
                module_id: slot.id,
                data,
            };
            match message.to_transmission() {
                Ok(transmission) => {
                    outbound.broadcast(&transmission);
                    sent += 1;
                }
                Err(err) => debug!(module = %slot.config.id, %err, "sample not encodable"),
            }
        }
        sent
    }

    /// Poll until `stop`, sleeping `interval` between passes.
    pub fn run_poller(&self, outbound: Outbound, interval: Duration, stop: Arc<AtomicBool>) {
        while !stop.load(Ordering::Acquire) {
            self.poll_due(Instant::now(), &outbound);
            std::thread::sleep(interval);
        }
        debug!("module poller stopped");
    }
}

fn start(
    config: &SensorConfig,
    factories: &HashMap<String, ModuleFactory>,
) -> Result<Box<dyn Module>, ModuleError> {
    let factory = factories
        .get(&config.kind)
        .ok_or_else(|| ModuleError::UnknownType(config.kind.clone()))?;
    let mut module = factory(config)?;
    module.init()?;
    Ok(module)
}

#[cfg(test)]
pub(crate) mod tests {
    use connectorx_eventing::{BusConfig, ErrorFlags, EventBus};
    use connectorx_led::SensorConnectionConfig;
    use connectorx_proto::{ConnectionType, ErrorType};
    use connectorx_transport::{MemoryAdapter, TransportId};
    use crossbeam_channel::unbounded;

    use super::*;

    /// Counts reads; fails init when configured with `{"fail": true}`.
    pub(crate) struct Counter {
        pub(crate) fail_init: bool,
        pub(crate) reads: u8,
        pub(crate) pushed: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl Module for Counter {
        fn init(&mut self) -> Result<(), ModuleError> {
            if self.fail_init {
                return Err(ModuleError::Init("no ack".into()));
            }
            Ok(())
        }

        fn read(&mut self) -> Result<Vec<u8>, ModuleError> {
            self.reads += 1;
            Ok(vec![self.reads; 20])
        }

        fn push_data(&mut self, data: &serde_json::Value) -> Result<(), ModuleError> {
            self.pushed
                .lock()
                .unwrap()
                .push(data.clone());
            Ok(())
        }
    }

    pub(crate) fn counter_factory(pushed: Arc<Mutex<Vec<serde_json::Value>>>) -> ModuleFactory {
        Arc::new(move |config: &SensorConfig| -> Result<Box<dyn Module>, ModuleError> {
            let fail_init = config
                .custom_config
                .as_ref()
                .and_then(|c| c.get("fail"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(Counter {
                fail_init,
                reads: 0,
                pushed: pushed.clone(),
            }))
        })
    }

    pub(crate) fn sensor(id: &str, kind: &str, custom: Option<serde_json::Value>) -> SensorConfig {
        SensorConfig {
            id: id.into(),
            kind: kind.into(),
            polling_rate_ms: 100,
            connection_type: SensorConnectionConfig::I2c,
            custom_config: custom,
        }
    }

    fn manager() -> (ModuleManager, Arc<ErrorFlags>, Arc<Mutex<Vec<serde_json::Value>>>) {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let mut factories = HashMap::new();
        factories.insert("Counter".to_string(), counter_factory(pushed.clone()));
        let flags = Arc::new(ErrorFlags::new());
        let reporter = ErrorReporter::new(EventBus::new(BusConfig::default()), flags.clone());
        let manager = ModuleManager::new(
            &[
                sensor("ok", "Counter", None),
                sensor("broken", "Counter", Some(serde_json::json!({"fail": true}))),
                sensor("ghost", "Lidar", None),
            ],
            &factories,
            reporter,
        );
        (manager, flags, pushed)
    }

    #[test]
    fn init_outcomes() {
        let (manager, flags, _) = manager();
        assert_eq!(manager.status(create_id("ok")), Some(ModuleStatus::Ok));
        assert_eq!(manager.status(create_id("broken")), Some(ModuleStatus::Error));
        assert_eq!(manager.status(create_id("ghost")), Some(ModuleStatus::Missing));
        assert_eq!(manager.status(1), None);
        assert!(flags.is_set(ErrorType::DeviceMalfunction));

        let list = manager.list();
        assert_eq!(list.len(), 3);
        assert_eq!(list[2].kind, "Lidar");
    }

    #[test]
    fn read_and_push() {
        let (manager, _, pushed) = manager();
        assert_eq!(manager.read(create_id("ok")).unwrap()[0], 1);
        assert!(matches!(
            manager.read(create_id("broken")),
            Err(ModuleError::Faulted(_))
        ));
        assert!(matches!(manager.read(7), Err(ModuleError::NotFound(7))));

        manager
            .push_data(create_id("ok"), br#"{"gain": 2}"#)
            .unwrap();
        assert_eq!(pushed.lock().unwrap()[0]["gain"], 2);
        assert!(matches!(
            manager.push_data(create_id("ok"), b"not json"),
            Err(ModuleError::Json(_))
        ));
    }

    #[test]
    fn poll_broadcasts_truncated_samples_on_schedule() {
        let (manager, _, _) = manager();
        let (tx, _rx) = unbounded();
        let adapter = MemoryAdapter::new(TransportId(0), ConnectionType::Usb, tx);
        adapter.connect().unwrap();
        let outbound = Outbound::new();
        outbound.add(Arc::new(adapter.clone()));

        let start = Instant::now();
        assert_eq!(manager.poll_due(start, &outbound), 1);
        assert_eq!(manager.poll_due(start + Duration::from_millis(50), &outbound), 0);
        assert_eq!(manager.poll_due(start + Duration::from_millis(100), &outbound), 1);

        let sent = adapter.take_sent();
        assert_eq!(sent.len(), 2);
        let sample = ModuleData::from_transmission(&sent[1]).unwrap();
        assert_eq!(
            sample,
            ModuleData::NewData {
                module_id: create_id("ok"),
                data: vec![2; MAX_MODULE_SAMPLE_LEN],
            }
        );
    }

    #[test]
    fn settings_are_optional_for_modules() {
        struct ReadOnly;

        impl Module for ReadOnly {
            fn init(&mut self) -> Result<(), ModuleError> {
                Ok(())
            }

            fn read(&mut self) -> Result<Vec<u8>, ModuleError> {
                Ok(vec![1])
            }
        }

        let mut module = ReadOnly;
        assert!(module.push_data(&serde_json::json!({"gain": 3})).is_ok());
        assert_eq!(module.read().unwrap(), vec![1]);
    }
}
