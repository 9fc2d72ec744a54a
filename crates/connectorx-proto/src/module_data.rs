use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;

use crate::wire::{pad_to, wire_enum, Result, WireMessage, WireReader};

/// Largest sensor sample carried by [`ModuleData::NewData`].
pub const MAX_MODULE_SAMPLE_LEN: usize = 16;
/// Encoded size of a [`ModuleData::NewData`] body.
pub const NEW_DATA_SIZE: usize = 1 + 2 + MAX_MODULE_SAMPLE_LEN + 1;

wire_enum! {
    pub enum ModuleDataType: u8 {
        NewData = 0,
        PushData = 1,
    }
}

/// Sensor module traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleData {
    /// A fresh sample, device to host.
    NewData { module_id: u16, data: Vec<u8> },
    /// JSON settings for a module, host to device.
    PushData { module_id: u16, json: Vec<u8> },
}

impl ModuleData {
    pub fn module_id(&self) -> u16 {
        match self {
            ModuleData::NewData { module_id, .. } | ModuleData::PushData { module_id, .. } => {
                *module_id
            }
        }
    }

    pub fn data_type(&self) -> ModuleDataType {
        match self {
            ModuleData::NewData { .. } => ModuleDataType::NewData,
            ModuleData::PushData { .. } => ModuleDataType::PushData,
        }
    }
}

impl WireMessage for ModuleData {
    const TRANSMISSION: TransmissionType = TransmissionType::ModuleData;

    fn encode(&self, dst: &mut BytesMut) {
        let start = dst.len();
        dst.put_u8(self.data_type() as u8);
        match self {
            ModuleData::NewData { module_id, data } => {
                let data = &data[..data.len().min(MAX_MODULE_SAMPLE_LEN)];
                dst.put_u16_le(*module_id);
                dst.put_slice(data);
                pad_to(dst, start, NEW_DATA_SIZE - 1);
                dst.put_u8(data.len() as u8);
            }
            ModuleData::PushData { module_id, json } => {
                let json = &json[..json.len().min(u16::MAX as usize)];
                dst.put_u16_le(*module_id);
                dst.put_u16_le(json.len() as u16);
                dst.put_slice(json);
            }
        }
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("module data", src);
        Ok(match ModuleDataType::try_from(reader.u8()?)? {
            ModuleDataType::NewData => {
                let module_id = reader.u16()?;
                let raw = reader.bytes(MAX_MODULE_SAMPLE_LEN)?;
                let len = (reader.u8()? as usize).min(MAX_MODULE_SAMPLE_LEN);
                ModuleData::NewData {
                    module_id,
                    data: raw[..len].to_vec(),
                }
            }
            ModuleDataType::PushData => {
                let module_id = reader.u16()?;
                let len = reader.u16()? as usize;
                ModuleData::PushData {
                    module_id,
                    json: reader.bytes(len)?.to_vec(),
                }
            }
        })
    }
}
