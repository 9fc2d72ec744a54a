use std::sync::{Arc, RwLock, RwLockReadGuard};

use connectorx_frame::Transmission;
use connectorx_transport::{TransportAdapter, TransportId};
use tracing::{debug, warn};

/// Outbound side of every registered adapter.
#[derive(Clone, Default)]
pub struct Outbound {
    adapters: Arc<RwLock<Vec<Arc<dyn TransportAdapter>>>>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<TransportId> = self.adapters().iter().map(|a| a.id()).collect();
        f.debug_struct("Outbound").field("adapters", &ids).finish()
    }
}

impl Outbound {
    pub fn new() -> Self {
        Self::default()
    }

    fn adapters(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn TransportAdapter>>> {
        self.adapters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, adapter: Arc<dyn TransportAdapter>) {
        self.adapters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters().is_empty()
    }

    /// Write to every connected adapter; returns how many accepted it.
    pub fn broadcast(&self, transmission: &Transmission) -> usize {
        let mut sent = 0;
        for adapter in self.adapters().iter().filter(|a| a.is_connected()) {
            match adapter.send(transmission) {
                Ok(()) => sent += 1,
                Err(err) => warn!(id = %adapter.id(), %err, "broadcast failed"),
            }
        }
        sent
    }

    /// Write to the adapter a request came in on.
    pub fn respond(&self, origin: TransportId, transmission: &Transmission) -> bool {
        let adapters = self.adapters();
        let Some(adapter) = adapters.iter().find(|a| a.id() == origin) else {
            debug!(%origin, "response for unknown transport dropped");
            return false;
        };
        match adapter.send(transmission) {
            Ok(()) => true,
            Err(err) => {
                warn!(%origin, %err, "response not delivered");
                false
            }
        }
    }

    pub fn close_all(&self) {
        for adapter in self.adapters().iter() {
            adapter.close();
        }
    }
}
