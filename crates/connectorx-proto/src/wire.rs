use bytes::{Buf, BufMut, BytesMut};
use connectorx_frame::{FrameError, Transmission, TransmissionType};
use smart_leds::RGB8;

/// Errors raised while encoding or decoding payloads.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload ended before the selected variant was complete.
    #[error("{what} truncated (need {need} bytes, got {got})")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    /// A discriminant byte did not match any variant.
    #[error("unknown {what} value {value}")]
    UnknownDiscriminant { what: &'static str, value: i64 },

    /// The variant exists on the wire but has no defined payload.
    #[error("unsupported {0}")]
    Unsupported(&'static str),

    /// A transmission of another type was handed to a decoder.
    #[error("expected {expected:?} transmission, got {actual:?}")]
    WrongTransmission {
        expected: TransmissionType,
        actual: TransmissionType,
    },

    /// The encoded payload could not be wrapped in a transmission.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, WireError>;

/// A payload carried as the body of one transmission type.
pub trait WireMessage: Sized {
    const TRANSMISSION: TransmissionType;

    /// Append the encoded payload to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Decode a payload; trailing union padding is ignored.
    fn decode(src: &[u8]) -> Result<Self>;

    fn to_transmission(&self) -> Result<Transmission> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        Ok(Transmission::new(Self::TRANSMISSION, buf.to_vec())?)
    }

    fn from_transmission(transmission: &Transmission) -> Result<Self> {
        if transmission.kind() != Self::TRANSMISSION {
            return Err(WireError::WrongTransmission {
                expected: Self::TRANSMISSION,
                actual: transmission.kind(),
            });
        }
        Self::decode(transmission.body())
    }
}

/// Declares a fieldless `#[repr]` enum with a checked `TryFrom` for its wire value.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl TryFrom<$repr> for $name {
            type Error = $crate::wire::WireError;

            fn try_from(value: $repr) -> ::std::result::Result<Self, $crate::wire::WireError> {
                $(
                    if value == $value {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::wire::WireError::UnknownDiscriminant {
                    what: stringify!($name),
                    value: value as i64,
                })
            }
        }
    };
}

pub(crate) use wire_enum;

/// Cursor over a little-endian payload that reports truncation instead of panicking.
pub(crate) struct WireReader<'a> {
    what: &'static str,
    buf: &'a [u8],
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(what: &'static str, buf: &'a [u8]) -> Self {
        Self { what, buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.len() < n {
            return Err(WireError::Truncated {
                what: self.what,
                need: n,
                got: self.buf.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn i8(&mut self) -> Result<i8> {
        self.need(1)?;
        Ok(self.buf.get_i8())
    }

    pub(crate) fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn color(&mut self) -> Result<RGB8> {
        let [r, g, b] = self.array::<3>()?;
        Ok(RGB8 { r, g, b })
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// NUL-padded fixed-width text; stops at the first NUL.
    pub(crate) fn fixed_str(&mut self, width: usize) -> Result<String> {
        let raw = self.bytes(width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(width);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Everything not yet consumed.
    pub(crate) fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }
}

pub(crate) fn put_color(dst: &mut BytesMut, color: RGB8) {
    dst.put_u8(color.r);
    dst.put_u8(color.g);
    dst.put_u8(color.b);
}

/// Write `text` into a NUL-padded field of `width` bytes, truncating if needed.
pub(crate) fn put_fixed_str(dst: &mut BytesMut, text: &str, width: usize) {
    let bytes = truncate_utf8(text, width).as_bytes();
    dst.put_slice(bytes);
    dst.put_bytes(0, width - bytes.len());
}

/// Zero-fill so that `size` bytes have been written since `start`.
pub(crate) fn pad_to(dst: &mut BytesMut, start: usize, size: usize) {
    let written = dst.len() - start;
    if written < size {
        dst.put_bytes(0, size - written);
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a character.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
