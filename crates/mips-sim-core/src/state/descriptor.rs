//! Declarative register descriptor table in debugger numbering.

use crate::{CpuVariant, SimConfig};

/// First floating-point general register.
pub const FGR_BASE: usize = 38;
/// First auxiliary embedded register.
pub const AUX_BASE: usize = 72;
/// First upper GPR half (R5900).
pub const GPR_UPPER_BASE: usize = 90;
/// First vector-unit integer register (R5900).
pub const VU_INTEGER_BASE: usize = 125;
/// First vector-unit special register (R5900).
pub const VU_SPECIAL_BASE: usize = 141;
/// First accumulator lane (R5900).
pub const VU_ACC_BASE: usize = 146;
/// First vector register lane (R5900).
pub const VU_VECTOR_BASE: usize = 150;
/// One past the last R5900 register.
pub const R5900_REGISTER_COUNT: usize = VU_VECTOR_BASE + 32 * 4;
/// One past the last register on other variants.
pub const BASE_REGISTER_COUNT: usize = GPR_UPPER_BASE;

/// Vector-unit special registers exposed to the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VuSpecial {
    /// Current instruction address of the micro-program.
    Cia,
    /// `R` random-number register.
    Mr,
    /// `P` register. Not modeled: reads return a fixed value, writes are ignored.
    Mp,
    /// `I` immediate register.
    Mi,
    /// `Q` quotient register.
    Mq,
}

/// Storage class of a logical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// General-purpose register.
    Gpr(u8),
    /// COP0 status register.
    Status,
    /// `LO`.
    Lo,
    /// `HI`.
    Hi,
    /// COP0 bad virtual address.
    BadVAddr,
    /// COP0 cause register.
    Cause,
    /// Program counter.
    Pc,
    /// Floating-point general register.
    Fgr(u8),
    /// FPU control/status register.
    Fcr31,
    /// FPU implementation register.
    Fcr0,
    /// Auxiliary embedded register.
    Aux(u8),
    /// Upper 64 bits of a 128-bit GPR.
    GprUpper(u8),
    /// Pipeline-1 `LO`.
    Lo1,
    /// Pipeline-1 `HI`.
    Hi1,
    /// Shift-amount register.
    Sa,
    /// Vector-unit integer register.
    VuInteger(u8),
    /// Vector-unit special register.
    VuSpecial(VuSpecial),
    /// Vector-unit accumulator lane.
    VuAccumulator(u8),
    /// Vector-unit floating-point register lane.
    VuVector {
        /// Register number.
        reg: u8,
        /// Lane (x, y, z, w).
        lane: u8,
    },
}

/// Class and transfer width of one logical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterDescriptor {
    /// Storage class.
    pub class: RegisterClass,
    /// Transfer width in bits. Zero means the register is absent.
    pub width_bits: u32,
}

/// Register descriptor table, built once per configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTable {
    entries: Vec<RegisterDescriptor>,
}

fn describe(index: usize, config: &SimConfig) -> RegisterDescriptor {
    let word = config.word_size.bits();
    let fp = config.floating_point.width_bits();
    let fcr = if fp == 0 { 0 } else { 32 };
    let (class, width_bits) = match index {
        0..=31 => (RegisterClass::Gpr(index as u8), word),
        32 => (RegisterClass::Status, 32),
        33 => (RegisterClass::Lo, word),
        34 => (RegisterClass::Hi, word),
        35 => (RegisterClass::BadVAddr, word),
        36 => (RegisterClass::Cause, word),
        37 => (RegisterClass::Pc, word),
        38..=69 => (RegisterClass::Fgr((index - FGR_BASE) as u8), fp),
        70 => (RegisterClass::Fcr31, fcr),
        71 => (RegisterClass::Fcr0, fcr),
        72..=89 => (RegisterClass::Aux((index - AUX_BASE) as u8), 32),
        90..=121 => (RegisterClass::GprUpper((index - GPR_UPPER_BASE) as u8), 64),
        122 => (RegisterClass::Lo1, 64),
        123 => (RegisterClass::Hi1, 64),
        124 => (RegisterClass::Sa, 64),
        125..=140 => (
            RegisterClass::VuInteger((index - VU_INTEGER_BASE) as u8),
            16,
        ),
        141 => (RegisterClass::VuSpecial(VuSpecial::Cia), 32),
        142 => (RegisterClass::VuSpecial(VuSpecial::Mr), 32),
        143 => (RegisterClass::VuSpecial(VuSpecial::Mp), 32),
        144 => (RegisterClass::VuSpecial(VuSpecial::Mi), 32),
        145 => (RegisterClass::VuSpecial(VuSpecial::Mq), 32),
        146..=149 => (
            RegisterClass::VuAccumulator((index - VU_ACC_BASE) as u8),
            32,
        ),
        _ => {
            let offset = index - VU_VECTOR_BASE;
            (
                RegisterClass::VuVector {
                    reg: (offset / 4) as u8,
                    lane: (offset % 4) as u8,
                },
                32,
            )
        }
    };
    RegisterDescriptor { class, width_bits }
}

impl RegisterTable {
    /// Builds the table for `config`.
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        let count = match config.variant {
            CpuVariant::R5900 => R5900_REGISTER_COUNT,
            CpuVariant::Generic | CpuVariant::R3900 => BASE_REGISTER_COUNT,
        };
        Self {
            entries: (0..count).map(|index| describe(index, config)).collect(),
        }
    }

    /// Descriptor for logical register `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<RegisterDescriptor> {
        self.entries.get(index).copied()
    }

    /// Transfer width of `index` in bits. Unknown registers have width zero.
    #[must_use]
    pub fn width(&self, index: usize) -> u32 {
        self.get(index).map_or(0, |descriptor| descriptor.width_bits)
    }

    /// Number of logical registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the table holds no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
