//! Physical memory backing store with compatibility-space address translation.

/// Access widths, alignment policy and byte-order helpers.
pub mod access;
/// Segment map and virtual-to-physical translation.
pub mod map;

pub use access::{
    decode_value, encode_value, validate_load_alignment, validate_store_alignment, AccessWidth,
};
pub use map::{
    compat_address, decode_segment, sign_extend_16, sign_extend_32, translate_address, Segment,
    DEFAULT_MEM_SIZE, K0BASE, K0SIZE, K1BASE, K1SIZE, K2BASE, MONITOR_BASE, MONITOR_SIZE,
    PHYSICAL_MASK,
};

use crate::{Endian, Exception};

/// Physical address of the monitor ROM.
pub const MONITOR_PHYSICAL_BASE: u64 = MONITOR_BASE & PHYSICAL_MASK;

/// One contiguous block of attached physical memory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct Region {
    base: u64,
    bytes: Box<[u8]>,
}

impl Region {
    fn slice(&self, paddr: u64, len: usize) -> Option<&[u8]> {
        let offset = usize::try_from(paddr.checked_sub(self.base)?).ok()?;
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    fn slice_mut(&mut self, paddr: u64, len: usize) -> Option<&mut [u8]> {
        let offset = usize::try_from(paddr.checked_sub(self.base)?).ok()?;
        self.bytes.get_mut(offset..offset.checked_add(len)?)
    }
}

/// Target memory: attached physical regions viewed through address translation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Memory {
    regions: Vec<Region>,
    endian: Endian,
}

impl Memory {
    /// Creates a memory with RAM of `ram_size` bytes at physical zero plus the monitor ROM.
    #[must_use]
    pub fn new(ram_size: usize, endian: Endian) -> Self {
        let mut memory = Self {
            regions: Vec::new(),
            endian,
        };
        memory.attach(0, ram_size);
        memory.attach(MONITOR_PHYSICAL_BASE, MONITOR_SIZE);
        memory
    }

    /// Attaches a zeroed physical region. Overlapping an existing region shadows it.
    pub fn attach(&mut self, base: u64, size: usize) {
        self.regions.insert(
            0,
            Region {
                base,
                bytes: vec![0; size].into_boxed_slice(),
            },
        );
    }

    /// Target byte order.
    #[must_use]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Size in bytes of the region attached at physical zero.
    #[must_use]
    pub fn ram_size(&self) -> usize {
        self.regions
            .iter()
            .find(|region| region.base == 0)
            .map_or(0, |region| region.bytes.len())
    }

    fn physical(&self, paddr: u64, len: usize) -> Option<&[u8]> {
        self.regions
            .iter()
            .find_map(|region| region.slice(paddr, len))
    }

    fn physical_mut(&mut self, paddr: u64, len: usize) -> Option<&mut [u8]> {
        self.regions
            .iter_mut()
            .find_map(|region| region.slice_mut(paddr, len))
    }

    /// Reads one byte through raw translation, without alignment or side effects.
    #[must_use]
    pub fn raw_read_byte(&self, vaddr: u64) -> Option<u8> {
        let paddr = translate_address(vaddr)?;
        self.physical(paddr, 1).map(|bytes| bytes[0])
    }

    /// Writes one byte through raw translation. Returns `false` when unbacked.
    pub fn raw_write_byte(&mut self, vaddr: u64, value: u8) -> bool {
        let Some(paddr) = translate_address(vaddr) else {
            return false;
        };
        if let Some(bytes) = self.physical_mut(paddr, 1) {
            bytes[0] = value;
            true
        } else {
            false
        }
    }

    /// Reads an instruction of `width` at `pc`, or `None` when the fetch address is unmappable.
    #[must_use]
    pub fn fetch(&self, pc: u64, width: AccessWidth) -> Option<u64> {
        let paddr = translate_address(pc)?;
        let bytes = self.physical(paddr, width.bytes())?;
        Some(decode_value(bytes, self.endian))
    }

    /// Performs a checked, naturally aligned load.
    ///
    /// # Errors
    ///
    /// Returns an address error for misaligned `vaddr` and a data bus error when the
    /// address does not translate to attached memory.
    pub fn load(&self, vaddr: u64, width: AccessWidth) -> Result<u64, Exception> {
        validate_load_alignment(vaddr, width)?;
        let bytes = translate_address(vaddr)
            .and_then(|paddr| self.physical(paddr, width.bytes()))
            .ok_or(Exception::bus_error(vaddr))?;
        Ok(decode_value(bytes, self.endian))
    }

    /// Performs a checked, naturally aligned store of the low bytes of `value`.
    ///
    /// # Errors
    ///
    /// Returns an address error for misaligned `vaddr` and a data bus error when the
    /// address does not translate to attached memory.
    pub fn store(&mut self, vaddr: u64, width: AccessWidth, value: u64) -> Result<(), Exception> {
        validate_store_alignment(vaddr, width)?;
        let endian = self.endian;
        let bytes = translate_address(vaddr)
            .and_then(|paddr| self.physical_mut(paddr, width.bytes()))
            .ok_or(Exception::bus_error(vaddr))?;
        encode_value(value, endian, bytes);
        Ok(())
    }

    /// Writes a target-order word through raw translation. Returns `false` when unbacked.
    pub fn raw_write_word(&mut self, vaddr: u64, value: u32) -> bool {
        let mut buf = [0u8; 4];
        encode_value(u64::from(value), self.endian, &mut buf);
        buf.iter()
            .zip(0u64..)
            .all(|(byte, offset)| self.raw_write_byte(vaddr.wrapping_add(offset), *byte))
    }
}
