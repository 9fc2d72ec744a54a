//! A ConnectorX device assembled from its parts.
//!
//! Transport adapters feed a [`Router`], which hands each inbound
//! transmission to the queue of the handler for its type. Handlers, the LED
//! task, the module poller and the [`SystemService`] each run on their own
//! thread and share only bounded queues, the event bus, the error flags and
//! the [`SystemContext`]. [`NodeBuilder`] wires all of it together.
//!
//! ```no_run
//! use connectorx_node::NodeBuilder;
//!
//! let config = std::fs::read("config.json")?;
//! let node = NodeBuilder::from_json(&config)?.build()?;
//! println!("status: {:?}", node.status());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod led_task;
pub mod modules;
pub mod node;
pub mod outbound;
pub mod report;
pub mod router;
pub mod system;

pub use config::{firmware_version, BoardInfo, NodeConfig};
pub use error::{FileError, ModuleError, NodeError, Result, RouteError};
pub use files::{DirFileService, FileService, MemoryFileService, CONFIG_PATH};
pub use handlers::{CommandHandler, FilesHandler, ModuleHandler, RequestHandler};
pub use led_task::{LedHandle, LedRequest, LedTask, LedTopology};
pub use modules::{Module, ModuleFactory, ModuleManager};
pub use node::{Node, NodeBuilder};
pub use outbound::Outbound;
pub use report::{led_error_kind, ErrorReporter};
pub use router::{InboundRequest, Router, Routes};
pub use system::{status_pattern, SystemContext, SystemService};
