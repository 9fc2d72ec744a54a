//! Bit-exact ConnectorX payloads.
//!
//! Every transmission body is a tagged union on the wire: a fixed-width
//! discriminant followed by a fixed-size (or explicitly length-prefixed)
//! payload, little-endian and unpadded. This crate exposes those unions as
//! Rust enums and keeps byte layout inside the [`WireMessage`] codecs.

mod wire;

pub mod command;
pub mod event;
pub mod files;
pub mod module_data;
pub mod request;
pub mod response;

pub use command::{
    ApiGroup, Command, LedCommand, LedCommandType, ScrollDirection, SystemCommand,
    SystemCommandType, Target, ASSIGNED_ID_LEN, COMMAND_SIZE, MAX_MATRIX_TEXT_LEN,
};
pub use event::{
    ConnectionType, DisabledCause, ErrorType, Event, EventMask, EventType, FatalErrorType,
    HeartBeat, Status, ERROR_MESSAGE_LEN, EVENT_SIZE,
};
pub use files::{FileKind, FileTransfer, FileType, FILES_HEADER_SIZE, MAX_PATH_LEN};
pub use module_data::{ModuleData, ModuleDataType, MAX_MODULE_SAMPLE_LEN, NEW_DATA_SIZE};
pub use request::{HostSource, Request, RequestBody, RequestType, REQUEST_SIZE};
pub use response::{
    HandshakeInfo, ModuleListEntry, ModuleStatus, Response, ResponseBody, SensorConnection,
    Version, MAX_DEVICE_DATA_LEN, MAX_MODULE_LIST_ENTRIES, RESPONSE_SIZE,
};
pub use wire::{truncate_utf8, Result, WireError, WireMessage};
