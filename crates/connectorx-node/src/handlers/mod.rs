//! Consumers of the router's queues.

mod command;
mod files;
mod module;
mod request;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

pub use command::CommandHandler;
pub use files::FilesHandler;
pub use module::ModuleHandler;
pub use request::RequestHandler;

/// Drain `queue` into `handle` until `stop` is set or every sender is gone.
pub(crate) fn serve<T>(
    queue: &Receiver<T>,
    poll: Duration,
    stop: &Arc<AtomicBool>,
    mut handle: impl FnMut(T),
) {
    while !stop.load(Ordering::Acquire) {
        match queue.recv_timeout(poll) {
            Ok(item) => handle(item),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
