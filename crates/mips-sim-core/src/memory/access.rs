//! Access widths, alignment policy and endian-aware value assembly.

use crate::{Endian, Exception};

/// Width of a sized memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AccessWidth {
    /// 8-bit access.
    Byte = 1,
    /// 16-bit access.
    Half = 2,
    /// 32-bit access.
    Word = 4,
    /// 64-bit access.
    Double = 8,
}

impl AccessWidth {
    /// Number of bytes moved by this access.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Mask of address bits that must be clear for a naturally aligned access.
    #[must_use]
    pub const fn alignment_mask(self) -> u64 {
        self as u64 - 1
    }
}

/// Validates natural alignment for a data load.
///
/// # Errors
///
/// Returns an address-error-on-load exception carrying `vaddr` when it is misaligned.
pub const fn validate_load_alignment(vaddr: u64, width: AccessWidth) -> Result<(), Exception> {
    if vaddr & width.alignment_mask() == 0 {
        Ok(())
    } else {
        Err(Exception::address_load(vaddr))
    }
}

/// Validates natural alignment for a data store.
///
/// # Errors
///
/// Returns an address-error-on-store exception carrying `vaddr` when it is misaligned.
pub const fn validate_store_alignment(vaddr: u64, width: AccessWidth) -> Result<(), Exception> {
    if vaddr & width.alignment_mask() == 0 {
        Ok(())
    } else {
        Err(Exception::address_store(vaddr))
    }
}

/// Assembles a value from up to eight bytes stored in target order.
#[must_use]
pub fn decode_value(bytes: &[u8], endian: Endian) -> u64 {
    let len = bytes.len().min(8);
    let mut raw = [0u8; 8];
    match endian {
        Endian::Big => {
            raw[8 - len..].copy_from_slice(&bytes[..len]);
            u64::from_be_bytes(raw)
        }
        Endian::Little => {
            raw[..len].copy_from_slice(&bytes[..len]);
            u64::from_le_bytes(raw)
        }
    }
}

/// Splits the low `out.len()` bytes (at most eight) of `value` into target order.
pub fn encode_value(value: u64, endian: Endian, out: &mut [u8]) {
    let len = out.len().min(8);
    match endian {
        Endian::Big => out[..len].copy_from_slice(&value.to_be_bytes()[8 - len..]),
        Endian::Little => out[..len].copy_from_slice(&value.to_le_bytes()[..len]),
    }
}
