//! Compatibility-space segment map and virtual-to-physical translation.

/// Base of the cached, unmapped kernel segment.
pub const K0BASE: u64 = 0x8000_0000;
/// Size of the cached, unmapped kernel segment.
pub const K0SIZE: u64 = 0x2000_0000;
/// Base of the uncached, unmapped kernel segment.
pub const K1BASE: u64 = 0xA000_0000;
/// Size of the uncached, unmapped kernel segment.
pub const K1SIZE: u64 = 0x2000_0000;
/// Base of the mapped supervisor/kernel segments.
pub const K2BASE: u64 = 0xC000_0000;
/// Mask folding kseg0/kseg1 onto physical addresses.
pub const PHYSICAL_MASK: u64 = 0x1FFF_FFFF;

/// Virtual base of the monitor ROM (kseg1 view of the reset vector).
pub const MONITOR_BASE: u64 = 0xBFC0_0000;
/// Size in bytes of the monitor ROM.
pub const MONITOR_SIZE: usize = 2048;
/// Default RAM size attached at physical address zero.
pub const DEFAULT_MEM_SIZE: usize = 2 << 20;

/// Segments of the 32-bit compatibility address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// User segment (`0x0000_0000..0x8000_0000`), identity mapped.
    Kuseg,
    /// Cached kernel segment (`0x8000_0000..0xA000_0000`).
    Kseg0,
    /// Uncached kernel segment (`0xA000_0000..0xC000_0000`).
    Kseg1,
    /// Mapped supervisor segment (`0xC000_0000..0xE000_0000`), identity mapped.
    Kseg2,
    /// Mapped kernel segment (`0xE000_0000..`), identity mapped.
    Kseg3,
}

impl Segment {
    /// Returns `true` for the unmapped kernel segments that fold onto physical memory.
    #[must_use]
    pub const fn is_unmapped_kernel(self) -> bool {
        matches!(self, Self::Kseg0 | Self::Kseg1)
    }
}

/// Folds a 64-bit virtual address into the 32-bit compatibility space.
///
/// Accepts sign-extended and zero-extended 32-bit addresses. Anything else lies in
/// the extended 64-bit segments, which this core does not map.
#[must_use]
pub const fn compat_address(vaddr: u64) -> Option<u32> {
    let upper = vaddr >> 32;
    let lower = (vaddr & 0xFFFF_FFFF) as u32;
    if upper == 0 || (upper == 0xFFFF_FFFF && lower & 0x8000_0000 != 0) {
        Some(lower)
    } else {
        None
    }
}

/// Classifies a virtual address into its compatibility-space segment.
#[must_use]
pub const fn decode_segment(vaddr: u64) -> Option<Segment> {
    let Some(addr) = compat_address(vaddr) else {
        return None;
    };
    let addr = addr as u64;
    Some(if addr < K0BASE {
        Segment::Kuseg
    } else if addr < K1BASE {
        Segment::Kseg0
    } else if addr < K2BASE {
        Segment::Kseg1
    } else if addr < 0xE000_0000 {
        Segment::Kseg2
    } else {
        Segment::Kseg3
    })
}

/// Translates a virtual address to a physical address.
#[must_use]
pub const fn translate_address(vaddr: u64) -> Option<u64> {
    let Some(segment) = decode_segment(vaddr) else {
        return None;
    };
    let Some(addr) = compat_address(vaddr) else {
        return None;
    };
    let addr = addr as u64;
    if segment.is_unmapped_kernel() {
        Some(addr & PHYSICAL_MASK)
    } else {
        Some(addr)
    }
}

/// Sign-extends a 32-bit value to 64 bits.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub const fn sign_extend_32(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}

/// Sign-extends a 16-bit value to 64 bits.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
pub const fn sign_extend_16(value: u64) -> u64 {
    value as u16 as i16 as i64 as u64
}

#[cfg(test)]
mod tests {
    use super::{
        compat_address, decode_segment, sign_extend_16, sign_extend_32, translate_address,
        Segment, K0BASE, K1BASE, MONITOR_BASE,
    };

    #[test]
    fn segment_boundaries_classify_correctly() {
        assert_eq!(decode_segment(0), Some(Segment::Kuseg));
        assert_eq!(decode_segment(K0BASE - 1), Some(Segment::Kuseg));
        assert_eq!(decode_segment(K0BASE), Some(Segment::Kseg0));
        assert_eq!(decode_segment(K1BASE), Some(Segment::Kseg1));
        assert_eq!(decode_segment(0xC000_0000), Some(Segment::Kseg2));
        assert_eq!(decode_segment(0xFFFF_FFFF), Some(Segment::Kseg3));
    }

    #[test]
    fn kernel_segments_alias_physical_memory() {
        assert_eq!(translate_address(0x8000_0180), Some(0x180));
        assert_eq!(translate_address(0xA000_0180), Some(0x180));
        assert_eq!(translate_address(MONITOR_BASE), Some(0x1FC0_0000));
        assert_eq!(
            translate_address(0xFFFF_FFFF_BFC0_0000),
            Some(0x1FC0_0000)
        );
        assert_eq!(translate_address(0x0040_0000), Some(0x0040_0000));
    }

    #[test]
    fn extended_segments_do_not_translate() {
        assert_eq!(compat_address(0x0000_0001_0000_0000), None);
        assert_eq!(compat_address(0xFFFF_FFFF_0000_1000), None);
        assert_eq!(translate_address(0x9000_0000_0000_0000), None);
    }

    #[test]
    fn sign_extension_helpers() {
        assert_eq!(sign_extend_32(0x8000_0000), 0xFFFF_FFFF_8000_0000);
        assert_eq!(sign_extend_32(0x7FFF_FFFF), 0x7FFF_FFFF);
        assert_eq!(sign_extend_16(0xFFFC), 0xFFFF_FFFF_FFFF_FFFC);
    }
}
