use std::sync::Arc;

use connectorx_frame::Transmission;
use connectorx_proto::{ErrorType, ModuleData, WireMessage};
use tracing::debug;

use crate::modules::ModuleManager;
use crate::report::ErrorReporter;

/// Forwards host `PushData` messages to modules.
#[derive(Debug, Clone)]
pub struct ModuleHandler {
    modules: Arc<ModuleManager>,
    reporter: ErrorReporter,
}

impl ModuleHandler {
    pub fn new(modules: Arc<ModuleManager>, reporter: ErrorReporter) -> Self {
        Self { modules, reporter }
    }

    pub fn handle(&self, transmission: Transmission) {
        match ModuleData::from_transmission(&transmission) {
            Ok(ModuleData::PushData { module_id, json }) => {
                if let Err(err) = self.modules.push_data(module_id, &json) {
                    self.reporter.module(&err);
                }
            }
            Ok(ModuleData::NewData { module_id, .. }) => {
                debug!(module_id, "ignoring inbound sample");
            }
            Err(err) => self.reporter.report(ErrorType::InvalidFile, err),
        }
    }
}
