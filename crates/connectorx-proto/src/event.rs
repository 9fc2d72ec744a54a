use std::ops::BitOr;

use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;

use crate::wire::{pad_to, put_fixed_str, wire_enum, Result, WireMessage, WireReader};

/// Encoded size of an [`Event`]: 4-byte type plus a 20-byte union.
pub const EVENT_SIZE: usize = 4 + EVENT_UNION_SIZE;
const EVENT_UNION_SIZE: usize = 20;

/// Width of the error message field.
pub const ERROR_MESSAGE_LEN: usize = 16;

/// Largest custom event payload.
pub const MAX_CUSTOM_DATA_LEN: usize = 16;

wire_enum! {
    /// One-hot event kind. `BeginInitialization` has no bit and never matches a mask.
    pub enum EventType: u32 {
        BeginInitialization = 0,
        FinishInitialization = 1 << 0,
        Enabled = 1 << 1,
        Disabled = 1 << 2,
        Connected = 1 << 3,
        Disconnected = 1 << 4,
        Error = 1 << 5,
        FatalError = 1 << 6,
        RegisteredEntity = 1 << 7,
        Custom = 1 << 8,
        PinInterrupt = 1 << 9,
        HeartBeat = 1 << 10,
    }
}

impl EventType {
    pub fn bit(self) -> u32 {
        self as u32
    }
}

/// Set of event types a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const ALL: EventMask = EventMask((1 << 11) - 1);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn of(types: &[EventType]) -> Self {
        types.iter().fold(Self::NONE, |mask, t| mask.with(*t))
    }

    pub fn with(self, event_type: EventType) -> Self {
        Self(self.0 | event_type.bit())
    }

    pub fn without(self, event_type: EventType) -> Self {
        Self(self.0 & !event_type.bit())
    }

    pub fn contains(self, event_type: EventType) -> bool {
        self.0 & event_type.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl From<EventType> for EventMask {
    fn from(event_type: EventType) -> Self {
        Self(event_type.bit())
    }
}

wire_enum! {
    /// Device status as reported in heartbeats and responses.
    pub enum Status: i8 {
        Unknown = -1,
        Booting = 0,
        Active = 1,
        Error = 2,
        Fatal = 3,
    }
}

wire_enum! {
    pub enum DisabledCause: u8 {
        NoHeartbeat = 0,
        Manual = 1,
        EStop = 2,
    }
}

wire_enum! {
    /// Physical link a host is attached through.
    pub enum ConnectionType: u8 {
        Usb = 0,
        WebUsb = 1,
        I2c = 2,
        Can = 3,
    }
}

wire_enum! {
    pub enum ErrorType: u8 {
        FileNotFound = 0,
        InvalidFile = 1,
        EntityNotFound = 2,
        DeviceMalfunction = 3,
        QueueFull = 4,
        LedStrip = 5,
        LedMatrix = 6,
        InvalidAnimationSequence = 7,
        InvalidChannel = 8,
        DuplicateId = 9,
        InvalidConfigUpload = 10,
    }
}

wire_enum! {
    pub enum FatalErrorType: u8 {
        InitError = 0,
        BadConfig = 1,
        StartTask = 2,
        CreateQueue = 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    pub status: Status,
    pub enabled: bool,
    pub connected_usb: bool,
    pub can_ok: bool,
}

/// Device-originated notification, carried by `TransmissionType::Event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BeginInitialization,
    FinishInitialization,
    Enabled,
    Disabled { cause: DisabledCause },
    Connected { connection: ConnectionType },
    Disconnected { connection: ConnectionType },
    Error { kind: ErrorType, message: String },
    FatalError { kind: FatalErrorType, message: String },
    RegisteredEntity { id: u16 },
    Custom { kind: u8, data: Vec<u8> },
    PinInterrupt { pin: u8 },
    HeartBeat(HeartBeat),
}

impl Event {
    pub fn error(kind: ErrorType, message: impl Into<String>) -> Self {
        Event::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn fatal(kind: FatalErrorType, message: impl Into<String>) -> Self {
        Event::FatalError {
            kind,
            message: message.into(),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::BeginInitialization => EventType::BeginInitialization,
            Event::FinishInitialization => EventType::FinishInitialization,
            Event::Enabled => EventType::Enabled,
            Event::Disabled { .. } => EventType::Disabled,
            Event::Connected { .. } => EventType::Connected,
            Event::Disconnected { .. } => EventType::Disconnected,
            Event::Error { .. } => EventType::Error,
            Event::FatalError { .. } => EventType::FatalError,
            Event::RegisteredEntity { .. } => EventType::RegisteredEntity,
            Event::Custom { .. } => EventType::Custom,
            Event::PinInterrupt { .. } => EventType::PinInterrupt,
            Event::HeartBeat(_) => EventType::HeartBeat,
        }
    }
}

impl WireMessage for Event {
    const TRANSMISSION: TransmissionType = TransmissionType::Event;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(EVENT_SIZE);
        dst.put_u32_le(self.event_type().bit());
        let start = dst.len();

        match self {
            Event::BeginInitialization | Event::FinishInitialization | Event::Enabled => {}
            Event::Disabled { cause } => dst.put_u8(*cause as u8),
            Event::Connected { connection } | Event::Disconnected { connection } => {
                dst.put_u8(*connection as u8)
            }
            Event::Error { kind, message } => {
                dst.put_u8(*kind as u8);
                put_fixed_str(dst, message, ERROR_MESSAGE_LEN);
            }
            Event::FatalError { kind, message } => {
                dst.put_u8(*kind as u8);
                put_fixed_str(dst, message, ERROR_MESSAGE_LEN);
            }
            Event::RegisteredEntity { id } => dst.put_u16_le(*id),
            Event::Custom { kind, data } => {
                let data = &data[..data.len().min(MAX_CUSTOM_DATA_LEN)];
                dst.put_u8(*kind);
                dst.put_slice(data);
                dst.put_bytes(0, MAX_CUSTOM_DATA_LEN - data.len());
                dst.put_u8(data.len() as u8);
            }
            // pin, three bytes of alignment, then a pointer-sized parameter
            Event::PinInterrupt { pin } => {
                dst.put_u8(*pin);
                dst.put_bytes(0, 3);
                dst.put_u32_le(0);
            }
            Event::HeartBeat(hb) => {
                dst.put_i8(hb.status as i8);
                dst.put_u8(u8::from(hb.enabled));
                dst.put_u8(u8::from(hb.connected_usb));
                dst.put_u8(u8::from(hb.can_ok));
            }
        }

        pad_to(dst, start, EVENT_UNION_SIZE);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("event", src);
        Ok(match EventType::try_from(reader.u32()?)? {
            EventType::BeginInitialization => Event::BeginInitialization,
            EventType::FinishInitialization => Event::FinishInitialization,
            EventType::Enabled => Event::Enabled,
            EventType::Disabled => Event::Disabled {
                cause: DisabledCause::try_from(reader.u8()?)?,
            },
            EventType::Connected => Event::Connected {
                connection: ConnectionType::try_from(reader.u8()?)?,
            },
            EventType::Disconnected => Event::Disconnected {
                connection: ConnectionType::try_from(reader.u8()?)?,
            },
            EventType::Error => Event::Error {
                kind: ErrorType::try_from(reader.u8()?)?,
                message: reader.fixed_str(ERROR_MESSAGE_LEN)?,
            },
            EventType::FatalError => Event::FatalError {
                kind: FatalErrorType::try_from(reader.u8()?)?,
                message: reader.fixed_str(ERROR_MESSAGE_LEN)?,
            },
            EventType::RegisteredEntity => Event::RegisteredEntity { id: reader.u16()? },
            EventType::Custom => {
                let kind = reader.u8()?;
                let raw = reader.bytes(MAX_CUSTOM_DATA_LEN)?;
                let len = (reader.u8()? as usize).min(MAX_CUSTOM_DATA_LEN);
                Event::Custom {
                    kind,
                    data: raw[..len].to_vec(),
                }
            }
            EventType::PinInterrupt => Event::PinInterrupt { pin: reader.u8()? },
            EventType::HeartBeat => Event::HeartBeat(HeartBeat {
                status: Status::try_from(reader.i8()?)?,
                enabled: reader.bool()?,
                connected_usb: reader.bool()?,
                can_ok: reader.bool()?,
            }),
        })
    }
}
