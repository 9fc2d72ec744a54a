use std::sync::atomic::{AtomicU32, Ordering};

use connectorx_proto::{ErrorType, FatalErrorType};

const FATAL_SHIFT: u32 = 16;

/// Process-wide fault bitset: non-fatal kinds in the low half, fatal kinds in the high half.
///
/// Every mutation is a single atomic read-modify-write, so any task may raise
/// or clear bits without further locking.
#[derive(Debug, Default)]
pub struct ErrorFlags {
    bits: AtomicU32,
}

impl ErrorFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn error_bit(kind: ErrorType) -> u32 {
        1 << (kind as u8 as u32)
    }

    fn fatal_bit(kind: FatalErrorType) -> u32 {
        1 << (kind as u8 as u32 + FATAL_SHIFT)
    }

    pub fn raise(&self, kind: ErrorType) {
        self.bits.fetch_or(Self::error_bit(kind), Ordering::AcqRel);
    }

    pub fn raise_fatal(&self, kind: FatalErrorType) {
        self.bits.fetch_or(Self::fatal_bit(kind), Ordering::AcqRel);
    }

    pub fn clear(&self, kind: ErrorType) {
        self.bits.fetch_and(!Self::error_bit(kind), Ordering::AcqRel);
    }

    pub fn clear_fatal(&self, kind: FatalErrorType) {
        self.bits.fetch_and(!Self::fatal_bit(kind), Ordering::AcqRel);
    }

    /// Clear every bit set in `mask`; returns the remaining bits.
    pub fn clear_mask(&self, mask: u32) -> u32 {
        self.bits.fetch_and(!mask, Ordering::AcqRel) & !mask
    }

    pub fn is_set(&self, kind: ErrorType) -> bool {
        self.bits() & Self::error_bit(kind) != 0
    }

    pub fn is_fatal_set(&self, kind: FatalErrorType) -> bool {
        self.bits() & Self::fatal_bit(kind) != 0
    }

    pub fn has_fatal(&self) -> bool {
        self.bits() >> FATAL_SHIFT != 0
    }

    pub fn bits(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.bits() == 0
    }
}
