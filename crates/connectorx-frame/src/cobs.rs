//! Consistent Overhead Byte Stuffing with a `0x00` frame delimiter.

use bytes::{BufMut, BytesMut};

/// Frame delimiter byte.
pub const DELIMITER: u8 = 0x00;

/// Worst-case encoded size of `len` raw bytes, excluding the delimiter.
pub const fn max_encoded_len(len: usize) -> usize {
    len + len / 254 + 1
}

/// Encode `src` and append it to `dst`, followed by the delimiter.
pub fn encode(src: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(src.len()) + 1);

    let mut code_idx = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for &byte in src {
        if byte == 0 {
            dst[code_idx] = code;
            code_idx = dst.len();
            dst.put_u8(0);
            code = 1;
            continue;
        }

        dst.put_u8(byte);
        code += 1;
        if code == 0xFF {
            dst[code_idx] = code;
            code_idx = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }

    dst[code_idx] = code;
    dst.put_u8(DELIMITER);
}

/// Decode one COBS block (delimiter already stripped).
///
/// Returns `None` when the block is malformed.
pub fn decode(src: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0usize;

    while i < src.len() {
        let code = src[i];
        if code == 0 {
            return None;
        }
        i += 1;

        let run = code as usize - 1;
        if i + run > src.len() {
            return None;
        }
        let block = &src[i..i + run];
        if block.contains(&0) {
            return None;
        }
        out.extend_from_slice(block);
        i += run;

        if code != 0xFF && i < src.len() {
            out.push(0);
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(src: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode(src, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn encodes_known_vectors() {
        assert_eq!(encoded(&[]), vec![0x01, 0x00]);
        assert_eq!(encoded(&[0x00]), vec![0x01, 0x01, 0x00]);
        assert_eq!(encoded(&[0x11, 0x22, 0x00, 0x33]), vec![0x03, 0x11, 0x22, 0x02, 0x33, 0x00]);
    }

    #[test]
    fn encoded_body_never_contains_delimiter() {
        let src: Vec<u8> = (0..600u32).map(|i| (i % 7) as u8).collect();
        let wire = encoded(&src);
        let (last, body) = wire.split_last().unwrap();
        assert_eq!(*last, DELIMITER);
        assert!(!body.contains(&DELIMITER));
        assert_eq!(decode(body).unwrap(), src);
    }

    #[test]
    fn long_run_without_zeros() {
        let src = vec![0xAB; 254];
        let wire = encoded(&src);
        assert_eq!(wire[0], 0xFF);
        assert!(wire.len() <= max_encoded_len(src.len()) + 1);
        assert_eq!(decode(&wire[..wire.len() - 1]).unwrap(), src);
    }

    #[test]
    fn rejects_truncated_block() {
        assert!(decode(&[0x05, 0x01, 0x02]).is_none());
        assert!(decode(&[0x02, 0x00]).is_none());
    }
}
