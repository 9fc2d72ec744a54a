use bytes::{BufMut, BytesMut};
use connectorx_frame::TransmissionType;

use crate::wire::{pad_to, put_fixed_str, wire_enum, Result, WireMessage, WireReader};

/// Encoded size of the header preceding the file bytes.
pub const FILES_HEADER_SIZE: usize = 1 + FILES_UNION_SIZE + 2 + 4;
const FILES_UNION_SIZE: usize = 32;

/// Width of a transfer destination path.
pub const MAX_PATH_LEN: usize = 32;

wire_enum! {
    pub enum FileType: u8 {
        Transfer = 0,
        SendConfig = 1,
        SetPixelBuffer = 2,
    }
}

/// What the attached bytes are for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// Store the bytes at `path` on the device filesystem.
    Transfer { path: String },
    /// Replace the stored configuration.
    SendConfig,
    /// Raw RGB triples for one zone.
    SetPixelBuffer { zone_id: u16, zone_length: u16 },
}

impl FileKind {
    pub fn file_type(&self) -> FileType {
        match self {
            FileKind::Transfer { .. } => FileType::Transfer,
            FileKind::SendConfig => FileType::SendConfig,
            FileKind::SetPixelBuffer { .. } => FileType::SetPixelBuffer,
        }
    }
}

/// A file upload: header plus `bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub kind: FileKind,
    /// Truncated checksum supplied by the host; carried but not verified.
    pub md5: u16,
    pub bytes: Vec<u8>,
}

impl FileTransfer {
    pub fn new(kind: FileKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            md5: 0,
            bytes: bytes.into(),
        }
    }
}

impl WireMessage for FileTransfer {
    const TRANSMISSION: TransmissionType = TransmissionType::File;

    fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(FILES_HEADER_SIZE + self.bytes.len());
        dst.put_u8(self.kind.file_type() as u8);
        let start = dst.len();
        match &self.kind {
            FileKind::Transfer { path } => put_fixed_str(dst, path, MAX_PATH_LEN),
            FileKind::SendConfig => {}
            FileKind::SetPixelBuffer {
                zone_id,
                zone_length,
            } => {
                dst.put_u16_le(*zone_id);
                dst.put_u16_le(*zone_length);
            }
        }
        pad_to(dst, start, FILES_UNION_SIZE);
        dst.put_u16_le(self.md5);
        dst.put_u32_le(self.bytes.len() as u32);
        dst.put_slice(&self.bytes);
    }

    fn decode(src: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new("file header", src);
        let file_type = FileType::try_from(reader.u8()?)?;
        let union = reader.bytes(FILES_UNION_SIZE)?;
        let md5 = reader.u16()?;
        let size = reader.u32()? as usize;

        let mut fields = WireReader::new("file header", union);
        let kind = match file_type {
            FileType::Transfer => FileKind::Transfer {
                path: fields.fixed_str(MAX_PATH_LEN)?,
            },
            FileType::SendConfig => FileKind::SendConfig,
            FileType::SetPixelBuffer => FileKind::SetPixelBuffer {
                zone_id: fields.u16()?,
                zone_length: fields.u16()?,
            },
        };

        let mut body = WireReader::new("file body", reader.rest());
        Ok(Self {
            kind,
            md5,
            bytes: body.bytes(size)?.to_vec(),
        })
    }
}
