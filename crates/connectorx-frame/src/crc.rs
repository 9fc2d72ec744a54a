//! CRC-8 (polynomial 0x07, init 0x00, no reflection, no final xor).

const POLY: u8 = 0x07;

/// Fold `bytes` into a running CRC-8 value.
pub fn crc8_update(mut crc: u8, bytes: &[u8]) -> u8 {
    for &b in bytes {
        crc ^= b;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// CRC-8 of a complete byte slice.
pub fn crc8(bytes: &[u8]) -> u8 {
    crc8_update(0, bytes)
}

/// CRC carried in a packet header: covers the packet id (LE), the length byte and the body.
pub fn packet_crc(packet_id: u16, body: &[u8]) -> u8 {
    let crc = crc8_update(0, &packet_id.to_le_bytes());
    let crc = crc8_update(crc, &[body.len() as u8]);
    crc8_update(crc, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_smbus_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn packet_crc_covers_id_and_length() {
        let body = b"abc";
        let base = packet_crc(1, body);
        assert_ne!(base, packet_crc(2, body));
        assert_ne!(base, packet_crc(1, b"abcd"));
        assert_eq!(base, crc8(&[0x01, 0x00, 0x03, b'a', b'b', b'c']));
    }
}
