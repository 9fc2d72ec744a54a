use std::sync::Arc;

use connectorx_frame::Transmission;
use connectorx_proto::{Command, ErrorType, SystemCommand, WireMessage};
use tracing::{debug, info};

use crate::led_task::LedHandle;
use crate::report::ErrorReporter;
use crate::system::SystemContext;

/// Applies host commands: LED jobs go to the LED task, system commands are
/// applied in place.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    led: LedHandle,
    context: Arc<SystemContext>,
    reporter: ErrorReporter,
}

impl CommandHandler {
    pub fn new(led: LedHandle, context: Arc<SystemContext>, reporter: ErrorReporter) -> Self {
        Self {
            led,
            context,
            reporter,
        }
    }

    pub fn handle(&self, transmission: Transmission) {
        let command = match Command::from_transmission(&transmission) {
            Ok(command) => command,
            Err(err) => {
                self.reporter.report(ErrorType::InvalidFile, err);
                return;
            }
        };
        debug!(group = ?command.group(), "command");

        match command {
            Command::Led(command) => {
                if let Err(err) = self.led.command(command) {
                    self.reporter.route(&err);
                }
            }
            Command::System(command) => self.system(command),
        }
    }

    fn system(&self, command: SystemCommand) {
        match command {
            SystemCommand::ClearStatusFlag { mask } => {
                let status = self.context.clear_flags(mask);
                debug!(mask, ?status, "status flags cleared");
            }
            SystemCommand::SetAssignedId { id } => self.context.set_assigned_id(id),
            SystemCommand::RestartDevice { delay_ms } => {
                info!(delay_ms, "restart requested");
                self.context.request_restart();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use connectorx_eventing::{BusConfig, ErrorFlags, EventBus};
    use connectorx_frame::TransmissionType;
    use connectorx_proto::{LedCommand, Target};
    use connectorx_led::RGB8;
    use crossbeam_channel::{bounded, Receiver};

    use super::*;
    use crate::config::BoardInfo;
    use crate::led_task::LedRequest;

    fn handler() -> (CommandHandler, Receiver<LedRequest>, Arc<SystemContext>) {
        let flags = Arc::new(ErrorFlags::new());
        let context = Arc::new(SystemContext::new(BoardInfo::default(), [0; 16], flags.clone()));
        let reporter = ErrorReporter::new(EventBus::new(BusConfig::default()), flags);
        let (tx, rx) = bounded(2);
        let handler = CommandHandler::new(
            LedHandle::new(tx, Duration::from_millis(10)),
            context.clone(),
            reporter,
        );
        (handler, rx, context)
    }

    #[test]
    fn led_commands_are_forwarded() {
        let (handler, rx, _) = handler();
        let command = LedCommand::SetColor {
            target: Target::Zone(5),
            color: RGB8::new(1, 1, 1),
        };
        handler.handle(Command::Led(command.clone()).to_transmission().unwrap());
        assert!(matches!(rx.try_recv().unwrap(), LedRequest::Command(c) if c == command));
    }

    #[test]
    fn system_commands_update_context() {
        let (handler, _, context) = handler();
        handler.handle(
            Command::System(SystemCommand::SetAssignedId { id: "arm".into() })
                .to_transmission()
                .unwrap(),
        );
        assert_eq!(context.assigned_id().as_deref(), Some("arm"));

        context.flags().raise(ErrorType::QueueFull);
        handler.handle(
            Command::System(SystemCommand::ClearStatusFlag { mask: u32::MAX })
                .to_transmission()
                .unwrap(),
        );
        assert!(context.flags().is_empty());

        handler.handle(
            Command::System(SystemCommand::RestartDevice { delay_ms: 0 })
                .to_transmission()
                .unwrap(),
        );
        assert!(context.restart_requested());
    }

    #[test]
    fn malformed_command_is_reported() {
        let (handler, rx, context) = handler();
        handler.handle(Transmission::new(TransmissionType::Command, vec![9]).unwrap());
        assert!(context.flags().is_set(ErrorType::InvalidFile));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_led_queue_reports_queue_full() {
        let (handler, _rx, context) = handler();
        let command = Command::Led(LedCommand::SetColor {
            target: Target::Zone(5),
            color: RGB8::new(1, 1, 1),
        });
        for _ in 0..3 {
            handler.handle(command.to_transmission().unwrap());
        }
        assert!(context.flags().is_set(ErrorType::QueueFull));
    }
}
