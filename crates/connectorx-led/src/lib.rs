//! Animation engine for ConnectorX LED outputs.
//!
//! [`RegistryBuilder`] collects animations, sequences, bitmaps and groups at
//! boot and freezes them into an [`AnimationRegistry`]. A [`LedService`] owns
//! every [`Channel`]; each channel owns one pixel buffer split into
//! [`Zone`]s that step their jobs on each tick.

pub mod animation;
pub mod bitmap;
pub mod builtin;
pub mod channel;
pub mod config;
pub mod error;
pub mod ids;
pub mod layout;
pub mod registry;
pub mod service;
pub mod text;
pub mod time;
pub mod zone;

pub use animation::{AnimationFn, AnimationInstance, StateMode};
pub use bitmap::{decode_bmp, BitmapReader, BmpReader, Frame, MemoryBitmaps};
pub use builtin::{builtin_animations, DEFAULT_COLOR};
pub use channel::{Channel, LedDriver, NullDriver, PowerBudget, RecordingDriver};
pub use config::{
    AnimationStepConfig, BitmapConfig, BitmapKindConfig, ChannelConfig, ColorConfig,
    Configuration, GroupConfig, SensorConfig, SensorConnectionConfig, SequenceConfig, ZoneConfig,
    ZoneKindConfig,
};
pub use error::{BitmapError, ConfigError, LedDriverError, LedError, RegistryError, Result};
pub use ids::{config_hash, create_id};
pub use layout::MatrixLayout;
pub use registry::{
    AnimationGroup, AnimationRegistry, AnimationSequence, BitmapInstance, RegistryBuilder,
    SequenceStep,
};
pub use service::LedService;
pub use smart_leds::RGB8;
pub use text::{MatrixCanvas, TextJob};
pub use time::{Clock, ManualClock, MonotonicClock};
pub use zone::{AnimationJob, MatrixJob, MatrixZone, StripZone, Zone, ZoneCore, ZoneKind};
