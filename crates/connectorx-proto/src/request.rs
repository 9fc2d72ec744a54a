use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;

use crate::wire::{pad_to, wire_enum, Result, WireMessage, WireReader};

/// Encoded size of a [`Request`]: type, id, and a 2-byte union.
pub const REQUEST_SIZE: usize = 1 + 4 + REQUEST_UNION_SIZE;
const REQUEST_UNION_SIZE: usize = 2;

wire_enum! {
    pub enum RequestType: u8 {
        Handshake = 0,
        Status = 1,
        ProductSku = 2,
        ProductSerialNumber = 3,
        ConfigHash = 4,
        AssignedId = 5,
        Faults = 6,
        DeviceStatus = 7,
        DeviceData = 8,
        LedChannelStatus = 9,
        LedZoneStatus = 10,
        LatestEvent = 11,
        EventFlags = 12,
        ModuleList = 13,
    }
}

wire_enum! {
    /// Who opened the connection.
    pub enum HostSource: u8 {
        Unknown = 0,
        Studio = 1,
        Roborio = 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBody {
    Handshake { host: HostSource },
    Status,
    ProductSku,
    ProductSerialNumber,
    ConfigHash,
    AssignedId,
    Faults,
    DeviceStatus { device_id: u16 },
    DeviceData { device_id: u16 },
    LedChannelStatus { channel_id: u16 },
    LedZoneStatus { zone_id: u16 },
    LatestEvent,
    EventFlags,
    ModuleList,
}

impl RequestBody {
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestBody::Handshake { .. } => RequestType::Handshake,
            RequestBody::Status => RequestType::Status,
            RequestBody::ProductSku => RequestType::ProductSku,
            RequestBody::ProductSerialNumber => RequestType::ProductSerialNumber,
            RequestBody::ConfigHash => RequestType::ConfigHash,
            RequestBody::AssignedId => RequestType::AssignedId,
            RequestBody::Faults => RequestType::Faults,
            RequestBody::DeviceStatus { .. } => RequestType::DeviceStatus,
            RequestBody::DeviceData { .. } => RequestType::DeviceData,
            RequestBody::LedChannelStatus { .. } => RequestType::LedChannelStatus,
            RequestBody::LedZoneStatus { .. } => RequestType::LedZoneStatus,
            RequestBody::LatestEvent => RequestType::LatestEvent,
            RequestBody::EventFlags => RequestType::EventFlags,
            RequestBody::ModuleList => RequestType::ModuleList,
        }
    }
}

/// Host query; the response echoes `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub id: u32,
    pub body: RequestBody,
}

impl Request {
    pub fn new(id: u32, body: RequestBody) -> Self {
        Self { id, body }
    }
}

impl WireMessage for Request {
    const TRANSMISSION: TransmissionType = TransmissionType::Request;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(REQUEST_SIZE);
        dst.put_u8(self.body.request_type() as u8);
        dst.put_u32_le(self.id);
        let start = dst.len();
        match self.body {
            RequestBody::Handshake { host } => dst.put_u8(host as u8),
            RequestBody::DeviceStatus { device_id } | RequestBody::DeviceData { device_id } => {
                dst.put_u16_le(device_id)
            }
            RequestBody::LedChannelStatus { channel_id } => dst.put_u16_le(channel_id),
            RequestBody::LedZoneStatus { zone_id } => dst.put_u16_le(zone_id),
            _ => {}
        }
        pad_to(dst, start, REQUEST_UNION_SIZE);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("request", src);
        let kind = RequestType::try_from(reader.u8()?)?;
        let id = reader.u32()?;
        let body = match kind {
            RequestType::Handshake => RequestBody::Handshake {
                host: HostSource::try_from(reader.u8()?)?,
            },
            RequestType::Status => RequestBody::Status,
            RequestType::ProductSku => RequestBody::ProductSku,
            RequestType::ProductSerialNumber => RequestBody::ProductSerialNumber,
            RequestType::ConfigHash => RequestBody::ConfigHash,
            RequestType::AssignedId => RequestBody::AssignedId,
            RequestType::Faults => RequestBody::Faults,
            RequestType::DeviceStatus => RequestBody::DeviceStatus {
                device_id: reader.u16()?,
            },
            RequestType::DeviceData => RequestBody::DeviceData {
                device_id: reader.u16()?,
            },
            RequestType::LedChannelStatus => RequestBody::LedChannelStatus {
                channel_id: reader.u16()?,
            },
            RequestType::LedZoneStatus => RequestBody::LedZoneStatus {
                zone_id: reader.u16()?,
            },
            RequestType::LatestEvent => RequestBody::LatestEvent,
            RequestType::EventFlags => RequestBody::EventFlags,
            RequestType::ModuleList => RequestBody::ModuleList,
        };
        Ok(Self { id, body })
    }
}
