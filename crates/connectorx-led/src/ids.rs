//! Numeric ids derived from configuration names.
//!
//! Hosts precompute the same ids when they build commands, so this function
//! is part of the wire contract.

const FNV32_OFFSET: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 0x0100_0193;

const FNV128_OFFSET: u128 = 0x6c62_272e_07bb_0142_62b8_2175_6295_c58d;
const FNV128_PRIME: u128 = 0x0000_0000_0100_0000_0000_0000_0000_013B;

/// Low 16 bits of the 32-bit FNV-1a hash of `name`.
pub fn create_id(name: &str) -> u16 {
    let hash = name.bytes().fold(FNV32_OFFSET, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    });
    (hash & 0xFFFF) as u16
}

/// 128-bit FNV-1a digest used as the configuration hash.
pub fn config_hash(bytes: &[u8]) -> [u8; 16] {
    bytes
        .iter()
        .fold(FNV128_OFFSET, |hash, byte| {
            (hash ^ u128::from(*byte)).wrapping_mul(FNV128_PRIME)
        })
        .to_be_bytes()
}
