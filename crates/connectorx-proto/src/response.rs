use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;

use crate::event::{EventType, Status};
use crate::request::RequestType;
use crate::wire::{pad_to, put_fixed_str, wire_enum, Result, WireError, WireMessage, WireReader};
use crate::command::ASSIGNED_ID_LEN;

/// Encoded size of a [`Response`]: type, id, and a 426-byte union.
pub const RESPONSE_SIZE: usize = 1 + 4 + RESPONSE_UNION_SIZE;
const RESPONSE_UNION_SIZE: usize = 2 + MAX_MODULE_LIST_ENTRIES * MODULE_ENTRY_SIZE;

/// Encoded size of the handshake payload.
pub const HANDSHAKE_SIZE: usize = 1 + 2 + 8 + 16 + 1 + ASSIGNED_ID_LEN + 3;

/// Largest device data sample carried in a response.
pub const MAX_DEVICE_DATA_LEN: usize = 16;

/// Entries a module list response can hold.
pub const MAX_MODULE_LIST_ENTRIES: usize = 8;
pub const MODULE_NAME_LEN: usize = 24;
const MODULE_ENTRY_SIZE: usize = 2 + MODULE_NAME_LEN * 2 + 2 + 1;

wire_enum! {
    /// Bus a sensor module is wired through.
    pub enum SensorConnection: u8 {
        I2c = 0,
        Spi = 1,
        Uart = 2,
        Dio = 3,
        Aio = 4,
    }
}

wire_enum! {
    pub enum ModuleStatus: u8 {
        Ok = 0,
        Error = 1,
        Missing = 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub status: Status,
    pub sku: u16,
    pub serial: u64,
    pub config_hash: [u8; 16],
    pub assigned_id: Option<String>,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleListEntry {
    pub module_id: u16,
    pub name: String,
    pub kind: String,
    pub polling_rate_ms: u16,
    pub connection: SensorConnection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Handshake(HandshakeInfo),
    Status(Status),
    ProductSku(u16),
    ProductSerialNumber(u64),
    ConfigHash([u8; 16]),
    AssignedId(Option<String>),
    Faults(u32),
    DeviceStatus { device_id: u16, status: ModuleStatus },
    DeviceData { device_id: u16, data: Vec<u8> },
    LedChannelStatus { channel_id: u16 },
    LedZoneStatus { zone_id: u16 },
    LatestEvent(EventType),
    EventFlags(u32),
    ModuleList(Vec<ModuleListEntry>),
}

impl ResponseBody {
    pub fn request_type(&self) -> RequestType {
        match self {
            ResponseBody::Handshake(_) => RequestType::Handshake,
            ResponseBody::Status(_) => RequestType::Status,
            ResponseBody::ProductSku(_) => RequestType::ProductSku,
            ResponseBody::ProductSerialNumber(_) => RequestType::ProductSerialNumber,
            ResponseBody::ConfigHash(_) => RequestType::ConfigHash,
            ResponseBody::AssignedId(_) => RequestType::AssignedId,
            ResponseBody::Faults(_) => RequestType::Faults,
            ResponseBody::DeviceStatus { .. } => RequestType::DeviceStatus,
            ResponseBody::DeviceData { .. } => RequestType::DeviceData,
            ResponseBody::LedChannelStatus { .. } => RequestType::LedChannelStatus,
            ResponseBody::LedZoneStatus { .. } => RequestType::LedZoneStatus,
            ResponseBody::LatestEvent(_) => RequestType::LatestEvent,
            ResponseBody::EventFlags(_) => RequestType::EventFlags,
            ResponseBody::ModuleList(_) => RequestType::ModuleList,
        }
    }
}

/// Answer to a [`Request`](crate::Request), echoing its type and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: u32,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(id: u32, body: ResponseBody) -> Self {
        Self { id, body }
    }
}

fn put_assigned_id(dst: &mut BytesMut, id: Option<&str>) {
    dst.put_u8(u8::from(id.is_some()));
    put_fixed_str(dst, id.unwrap_or_default(), ASSIGNED_ID_LEN);
}

fn read_assigned_id(reader: &mut WireReader<'_>) -> Result<Option<String>> {
    let valid = reader.bool()?;
    let id = reader.fixed_str(ASSIGNED_ID_LEN)?;
    Ok(valid.then_some(id))
}

impl WireMessage for Response {
    const TRANSMISSION: TransmissionType = TransmissionType::Response;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(RESPONSE_SIZE);
        dst.put_u8(self.body.request_type() as u8);
        dst.put_u32_le(self.id);
        let start = dst.len();

        match &self.body {
            ResponseBody::Handshake(info) => {
                dst.put_i8(info.status as i8);
                dst.put_u16_le(info.sku);
                dst.put_u64_le(info.serial);
                dst.put_slice(&info.config_hash);
                put_assigned_id(dst, info.assigned_id.as_deref());
                dst.put_u8(info.version.major);
                dst.put_u8(info.version.minor);
                dst.put_u8(info.version.patch);
            }
            ResponseBody::Status(status) => dst.put_i8(*status as i8),
            ResponseBody::ProductSku(sku) => dst.put_u16_le(*sku),
            ResponseBody::ProductSerialNumber(serial) => dst.put_u64_le(*serial),
            ResponseBody::ConfigHash(hash) => dst.put_slice(hash),
            ResponseBody::AssignedId(id) => put_assigned_id(dst, id.as_deref()),
            ResponseBody::Faults(flags) | ResponseBody::EventFlags(flags) => dst.put_u32_le(*flags),
            ResponseBody::DeviceStatus { device_id, status } => {
                dst.put_u16_le(*device_id);
                dst.put_u8(*status as u8);
            }
            ResponseBody::DeviceData { device_id, data } => {
                let data = &data[..data.len().min(MAX_DEVICE_DATA_LEN)];
                dst.put_u16_le(*device_id);
                dst.put_slice(data);
                dst.put_bytes(0, MAX_DEVICE_DATA_LEN - data.len());
                dst.put_u8(data.len() as u8);
            }
            ResponseBody::LedChannelStatus { channel_id } => dst.put_u16_le(*channel_id),
            ResponseBody::LedZoneStatus { zone_id } => dst.put_u16_le(*zone_id),
            ResponseBody::LatestEvent(kind) => dst.put_u32_le(kind.bit()),
            ResponseBody::ModuleList(entries) => {
                let entries = &entries[..entries.len().min(MAX_MODULE_LIST_ENTRIES)];
                dst.put_u16_le(entries.len() as u16);
                for entry in entries {
                    dst.put_u16_le(entry.module_id);
                    put_fixed_str(dst, &entry.name, MODULE_NAME_LEN);
                    put_fixed_str(dst, &entry.kind, MODULE_NAME_LEN);
                    dst.put_u16_le(entry.polling_rate_ms);
                    dst.put_u8(entry.connection as u8);
                }
            }
        }

        pad_to(dst, start, RESPONSE_UNION_SIZE);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("response", src);
        let kind = RequestType::try_from(reader.u8()?)?;
        let id = reader.u32()?;

        let body = match kind {
            RequestType::Handshake => ResponseBody::Handshake(HandshakeInfo {
                status: Status::try_from(reader.i8()?)?,
                sku: reader.u16()?,
                serial: reader.u64()?,
                config_hash: reader.array()?,
                assigned_id: read_assigned_id(&mut reader)?,
                version: Version {
                    major: reader.u8()?,
                    minor: reader.u8()?,
                    patch: reader.u8()?,
                },
            }),
            RequestType::Status => ResponseBody::Status(Status::try_from(reader.i8()?)?),
            RequestType::ProductSku => ResponseBody::ProductSku(reader.u16()?),
            RequestType::ProductSerialNumber => ResponseBody::ProductSerialNumber(reader.u64()?),
            RequestType::ConfigHash => ResponseBody::ConfigHash(reader.array()?),
            RequestType::AssignedId => ResponseBody::AssignedId(read_assigned_id(&mut reader)?),
            RequestType::Faults => ResponseBody::Faults(reader.u32()?),
            RequestType::DeviceStatus => ResponseBody::DeviceStatus {
                device_id: reader.u16()?,
                status: ModuleStatus::try_from(reader.u8()?)?,
            },
            RequestType::DeviceData => {
                let device_id = reader.u16()?;
                let raw = reader.bytes(MAX_DEVICE_DATA_LEN)?;
                let len = (reader.u8()? as usize).min(MAX_DEVICE_DATA_LEN);
                ResponseBody::DeviceData {
                    device_id,
                    data: raw[..len].to_vec(),
                }
            }
            RequestType::LedChannelStatus => ResponseBody::LedChannelStatus {
                channel_id: reader.u16()?,
            },
            RequestType::LedZoneStatus => ResponseBody::LedZoneStatus {
                zone_id: reader.u16()?,
            },
            RequestType::LatestEvent => ResponseBody::LatestEvent(EventType::try_from(reader.u32()?)?),
            RequestType::EventFlags => ResponseBody::EventFlags(reader.u32()?),
            RequestType::ModuleList => {
                let count = reader.u16()? as usize;
                if count > MAX_MODULE_LIST_ENTRIES {
                    return Err(WireError::UnknownDiscriminant {
                        what: "module list count",
                        value: count as i64,
                    });
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(ModuleListEntry {
                        module_id: reader.u16()?,
                        name: reader.fixed_str(MODULE_NAME_LEN)?,
                        kind: reader.fixed_str(MODULE_NAME_LEN)?,
                        polling_rate_ms: reader.u16()?,
                        connection: SensorConnection::try_from(reader.u8()?)?,
                    });
                }
                ResponseBody::ModuleList(entries)
            }
        };

        Ok(Self { id, body })
    }
}
