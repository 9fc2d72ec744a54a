//! Bitmap frames for matrix zones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use smart_leds::RGB8;

use crate::config::{BitmapConfig, BitmapKindConfig};
use crate::error::BitmapError;

pub type Result<T> = std::result::Result<T, BitmapError>;

/// One decoded image, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<RGB8>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![RGB8::default(); usize::from(width) * usize::from(height)],
        }
    }

    pub fn from_pixels(width: u16, height: u16, pixels: Vec<RGB8>) -> Option<Self> {
        (pixels.len() == usize::from(width) * usize::from(height)).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<RGB8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(usize::from(y) * usize::from(self.width) + usize::from(x))
            .copied()
    }
}

/// Source of bitmap frames.
pub trait BitmapReader: Send {
    /// Frames available for `bitmap`: 1 for static, 1..N for animated.
    fn frame_count(&self, bitmap: &BitmapConfig) -> Result<u16>;

    fn read_frame(&self, bitmap: &BitmapConfig, index: u16) -> Result<Frame>;
}

/// Reads `.bmp` files below a root directory.
///
/// A static bitmap is the file at `path`; an animated bitmap is the directory
/// at `path` holding `0.bmp`, `1.bmp`, and so on.
#[derive(Debug, Clone)]
pub struct BmpReader {
    root: PathBuf,
}

impl BmpReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn frame_path(&self, bitmap: &BitmapConfig, index: u16) -> PathBuf {
        let base = self.root.join(bitmap.path.trim_start_matches('/'));
        match bitmap.kind {
            BitmapKindConfig::Static => base,
            BitmapKindConfig::Animated { .. } => base.join(format!("{index}.bmp")),
        }
    }
}

impl BitmapReader for BmpReader {
    fn frame_count(&self, bitmap: &BitmapConfig) -> Result<u16> {
        let count = match bitmap.kind {
            BitmapKindConfig::Static => u16::from(self.frame_path(bitmap, 0).is_file()),
            BitmapKindConfig::Animated { .. } => (0..u16::MAX)
                .take_while(|i| self.frame_path(bitmap, *i).is_file())
                .count() as u16,
        };
        if count == 0 {
            return Err(BitmapError::NotFound(bitmap.path.clone()));
        }
        Ok(count)
    }

    fn read_frame(&self, bitmap: &BitmapConfig, index: u16) -> Result<Frame> {
        let path = self.frame_path(bitmap, index);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BitmapError::NotFound(path.display().to_string()),
            _ => BitmapError::Io(e),
        })?;
        decode_bmp(&bytes).map_err(|reason| BitmapError::Invalid {
            path: path.display().to_string(),
            reason,
        })
    }
}

/// Frames held in memory, keyed by bitmap path.
#[derive(Debug, Clone, Default)]
pub struct MemoryBitmaps {
    frames: HashMap<String, Vec<Frame>>,
}

impl MemoryBitmaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, frames: Vec<Frame>) {
        self.frames.insert(path.into(), frames);
    }
}

impl BitmapReader for MemoryBitmaps {
    fn frame_count(&self, bitmap: &BitmapConfig) -> Result<u16> {
        match self.frames.get(&bitmap.path) {
            Some(frames) if !frames.is_empty() => Ok(frames.len().min(usize::from(u16::MAX)) as u16),
            _ => Err(BitmapError::NotFound(bitmap.path.clone())),
        }
    }

    fn read_frame(&self, bitmap: &BitmapConfig, index: u16) -> Result<Frame> {
        self.frames
            .get(&bitmap.path)
            .and_then(|frames| frames.get(usize::from(index)))
            .cloned()
            .ok_or_else(|| BitmapError::NotFound(format!("{}#{index}", bitmap.path)))
    }
}

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

fn le_u16(bytes: &[u8], at: usize) -> std::result::Result<u16, String> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| format!("truncated at offset {at}"))
}

fn le_u32(bytes: &[u8], at: usize) -> std::result::Result<u32, String> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| format!("truncated at offset {at}"))
}

fn expand(value: u16, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((u32::from(value) * 255 + max / 2) / max) as u8
}

/// Decode an uncompressed Windows bitmap.
pub fn decode_bmp(bytes: &[u8]) -> std::result::Result<Frame, String> {
    if bytes.get(..2) != Some(b"BM") {
        return Err("missing BM signature".into());
    }
    let data_offset = le_u32(bytes, 10)? as usize;
    let dib_size = le_u32(bytes, 14)? as usize;
    let width = le_u32(bytes, 18)? as i32;
    let height = le_u32(bytes, 22)? as i32;
    let bpp = le_u16(bytes, 28)?;
    let compression = le_u32(bytes, 30)?;
    let colors_used = if dib_size >= 40 { le_u32(bytes, 46)? } else { 0 };

    let top_down = height < 0;
    let (width, height) = (width.unsigned_abs(), height.unsigned_abs());
    if width == 0 || height == 0 || width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
        return Err(format!("unsupported size {width}x{height}"));
    }
    match (bpp, compression) {
        (1 | 4 | 8 | 24, BI_RGB) | (16 | 32, BI_RGB | BI_BITFIELDS) => {}
        _ => return Err(format!("unsupported format: {bpp} bpp, compression {compression}")),
    }

    let palette: Vec<RGB8> = if bpp <= 8 {
        let count = if colors_used == 0 { 1 << bpp } else { colors_used as usize };
        let start = 14 + dib_size;
        (0..count)
            .map(|i| {
                bytes
                    .get(start + i * 4..start + i * 4 + 3)
                    .map(|c| RGB8 { r: c[2], g: c[1], b: c[0] })
                    .ok_or_else(|| "truncated palette".to_string())
            })
            .collect::<std::result::Result<_, _>>()?
    } else {
        Vec::new()
    };

    let stride = (usize::from(bpp) * width as usize).div_ceil(32) * 4;
    let mut frame = Frame::new(width as u16, height as u16);

    for y in 0..height as usize {
        let src_row = if top_down { y } else { height as usize - 1 - y };
        let row_start = data_offset + src_row * stride;
        let row = bytes
            .get(row_start..row_start + stride)
            .ok_or_else(|| format!("truncated pixel row {src_row}"))?;

        for x in 0..width as usize {
            let color = match bpp {
                1 | 4 | 8 => {
                    let bit = x * usize::from(bpp);
                    let byte = row[bit / 8];
                    let shift = 8 - usize::from(bpp) - bit % 8;
                    let index = (byte >> shift) & ((1u16 << bpp) - 1) as u8;
                    *palette
                        .get(usize::from(index))
                        .ok_or_else(|| format!("palette index {index} out of range"))?
                }
                16 => {
                    let v = u16::from_le_bytes([row[x * 2], row[x * 2 + 1]]);
                    if compression == BI_BITFIELDS {
                        RGB8 {
                            r: expand(v >> 11, 5),
                            g: expand((v >> 5) & 0x3F, 6),
                            b: expand(v & 0x1F, 5),
                        }
                    } else {
                        RGB8 {
                            r: expand((v >> 10) & 0x1F, 5),
                            g: expand((v >> 5) & 0x1F, 5),
                            b: expand(v & 0x1F, 5),
                        }
                    }
                }
                24 => RGB8 {
                    r: row[x * 3 + 2],
                    g: row[x * 3 + 1],
                    b: row[x * 3],
                },
                _ => RGB8 {
                    r: row[x * 4 + 2],
                    g: row[x * 4 + 1],
                    b: row[x * 4],
                },
            };
            frame.pixels[y * width as usize + x] = color;
        }
    }

    Ok(frame)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal 24-bit bottom-up BMP.
    pub(crate) fn bmp24(width: u32, height: u32, pixels: &[RGB8]) -> Vec<u8> {
        let stride = (width as usize * 3).div_ceil(4) * 4;
        let data_len = stride * height as usize;
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(54 + data_len as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&54u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&[0; 24]);
        for y in (0..height as usize).rev() {
            let start = out.len();
            for x in 0..width as usize {
                let p = pixels[y * width as usize + x];
                out.extend_from_slice(&[p.b, p.g, p.r]);
            }
            out.resize(start + stride, 0);
        }
        out
    }

    const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
    const BLUE: RGB8 = RGB8 { r: 0, g: 0, b: 255 };

    #[test]
    fn decodes_bottom_up_24bit() {
        let pixels = [RED, BLUE, BLUE, RED, RED, RED];
        let frame = decode_bmp(&bmp24(3, 2, &pixels)).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert_eq!(frame.pixels, pixels);
        assert_eq!(frame.pixel(1, 0), Some(BLUE));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn decodes_monochrome_palette() {
        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&70u32.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&62u32.to_le_bytes());
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(-2i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&[0; 24]);
        out.extend_from_slice(&[0, 0, 0, 0, 255, 255, 255, 0]);
        // top-down rows: "10", "01"
        out.extend_from_slice(&[0b1000_0000, 0, 0, 0]);
        out.extend_from_slice(&[0b0100_0000, 0, 0, 0]);

        let frame = decode_bmp(&out).unwrap();
        let white = RGB8 { r: 255, g: 255, b: 255 };
        assert_eq!(frame.pixels, vec![white, RGB8::default(), RGB8::default(), white]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_bmp(b"PNG....").is_err());
        let mut truncated = bmp24(4, 4, &[RED; 16]);
        truncated.truncate(60);
        assert!(decode_bmp(&truncated).is_err());
    }

    #[test]
    fn reads_animated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let spin = dir.path().join("spin");
        std::fs::create_dir(&spin).unwrap();
        std::fs::write(spin.join("0.bmp"), bmp24(1, 1, &[RED])).unwrap();
        std::fs::write(spin.join("1.bmp"), bmp24(1, 1, &[BLUE])).unwrap();

        let reader = BmpReader::new(dir.path());
        let config = BitmapConfig {
            id: "spin".into(),
            path: "/spin".into(),
            kind: BitmapKindConfig::Animated { frame_delay: 50 },
        };
        assert_eq!(reader.frame_count(&config).unwrap(), 2);
        assert_eq!(reader.read_frame(&config, 1).unwrap().pixels, vec![BLUE]);
        assert!(matches!(
            reader.read_frame(&config, 2),
            Err(BitmapError::NotFound(_))
        ));
    }

    #[test]
    fn missing_static_bitmap_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reader = BmpReader::new(dir.path());
        let config = BitmapConfig {
            id: "logo".into(),
            path: "logo.bmp".into(),
            kind: BitmapKindConfig::Static,
        };
        assert!(matches!(
            reader.frame_count(&config),
            Err(BitmapError::NotFound(_))
        ));
    }
}
