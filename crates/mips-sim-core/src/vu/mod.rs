//! Vector-unit sub-state reached through coprocessor 2.

/// Micro-engine trait and the fixed-latency reference engine.
pub mod engine;

pub use engine::{LatencyMicroEngine, MicroEngine};

/// Number of 16-bit integer registers.
pub const VU_INTEGER_COUNT: usize = 16;
/// Number of 128-bit floating-point registers.
pub const VU_VECTOR_COUNT: usize = 32;
/// Number of control-register numbers addressable by `CFC2`/`CTC2`.
pub const VU_CONTROL_COUNT: usize = 32;

/// Control register: status flags.
pub const VU_CTRL_STATUS: u8 = 16;
/// Control register: MAC flags.
pub const VU_CTRL_MAC: u8 = 17;
/// Control register: clipping flags.
pub const VU_CTRL_CLIP: u8 = 18;
/// Control register: `R`.
pub const VU_CTRL_R: u8 = 20;
/// Control register: `I`.
pub const VU_CTRL_I: u8 = 21;
/// Control register: `Q`.
pub const VU_CTRL_Q: u8 = 22;
/// Control register: micro-program counter.
pub const VU_CTRL_TPC: u8 = 26;
/// Control register: micro-program start address for `VCALLMSR`.
pub const VU_CTRL_CMSAR0: u8 = 27;
/// Control register: force break/reset.
pub const VU_CTRL_FBRST: u8 = 28;
/// Control register: VPU status.
pub const VU_CTRL_VPU_STAT: u8 = 29;
/// Control register: alternate micro-program start address.
pub const VU_CTRL_CMSAR1: u8 = 31;

/// Architectural register file of the vector unit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct VuRegisters {
    integer: [u16; VU_INTEGER_COUNT],
    vector: [[u32; 4]; VU_VECTOR_COUNT],
    accumulator: [u32; 4],
    control: [u32; VU_CONTROL_COUNT],
}

impl Default for VuRegisters {
    fn default() -> Self {
        Self {
            integer: [0; VU_INTEGER_COUNT],
            vector: [[0; 4]; VU_VECTOR_COUNT],
            accumulator: [0; 4],
            control: [0; VU_CONTROL_COUNT],
        }
    }
}

impl VuRegisters {
    /// Reads integer register `reg`. `vi00` always reads zero.
    #[must_use]
    pub const fn integer(&self, reg: u8) -> u16 {
        let reg = (reg & 0xF) as usize;
        if reg == 0 {
            0
        } else {
            self.integer[reg]
        }
    }

    /// Writes integer register `reg`. Writes to `vi00` are dropped.
    pub const fn set_integer(&mut self, reg: u8, value: u16) {
        let reg = (reg & 0xF) as usize;
        if reg != 0 {
            self.integer[reg] = value;
        }
    }

    /// Reads lane `lane` (x, y, z, w) of vector register `reg`.
    #[must_use]
    pub const fn lane(&self, reg: u8, lane: u8) -> u32 {
        self.vector[(reg & 0x1F) as usize][(lane & 3) as usize]
    }

    /// Writes lane `lane` (x, y, z, w) of vector register `reg`.
    pub const fn set_lane(&mut self, reg: u8, lane: u8, value: u32) {
        self.vector[(reg & 0x1F) as usize][(lane & 3) as usize] = value;
    }

    /// Reads accumulator lane `lane`.
    #[must_use]
    pub const fn accumulator(&self, lane: u8) -> u32 {
        self.accumulator[(lane & 3) as usize]
    }

    /// Writes accumulator lane `lane`.
    pub const fn set_accumulator(&mut self, lane: u8, value: u32) {
        self.accumulator[(lane & 3) as usize] = value;
    }

    /// Reads control register `id`. Numbers 0..16 alias the integer registers.
    #[must_use]
    pub const fn control(&self, id: u8) -> u32 {
        let id = id & 0x1F;
        if (id as usize) < VU_INTEGER_COUNT {
            self.integer(id) as u32
        } else {
            self.control[id as usize]
        }
    }

    /// Writes control register `id`. Numbers 0..16 alias the integer registers.
    pub const fn set_control(&mut self, id: u8, value: u32) {
        let id = id & 0x1F;
        if (id as usize) < VU_INTEGER_COUNT {
            self.set_integer(id, (value & 0xFFFF) as u16);
        } else {
            self.control[id as usize] = value;
        }
    }

    /// Packs vector register `reg` into 128 bits with `x` in the low word.
    #[must_use]
    pub fn quad(&self, reg: u8) -> u128 {
        (0..4u8).fold(0u128, |acc, lane| {
            acc | (u128::from(self.lane(reg, lane)) << (32 * u32::from(lane)))
        })
    }

    /// Unpacks 128 bits into vector register `reg`, `x` from the low word.
    pub fn set_quad(&mut self, reg: u8, value: u128) {
        for lane in 0..4u8 {
            self.set_lane(reg, lane, (value >> (32 * u32::from(lane))) as u32);
        }
    }
}

/// Vector unit: register file plus the engine executing macro-instructions and micro-programs.
pub struct VectorUnit {
    /// Architectural registers.
    pub regs: VuRegisters,
    engine: Box<dyn MicroEngine>,
}

impl std::fmt::Debug for VectorUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorUnit")
            .field("regs", &self.regs)
            .field("busy", &self.engine.is_busy())
            .finish_non_exhaustive()
    }
}

impl VectorUnit {
    /// Creates an idle vector unit driven by `engine`.
    #[must_use]
    pub fn new(engine: Box<dyn MicroEngine>) -> Self {
        Self {
            regs: VuRegisters::default(),
            engine,
        }
    }

    /// Returns `true` while a macro-instruction or micro-program is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Returns `true` while a `Q` register result is pending.
    #[must_use]
    pub fn is_q_busy(&self) -> bool {
        self.engine.is_q_busy()
    }

    /// Advances the engine by one issue cycle.
    pub fn issue(&mut self) {
        self.engine.issue(&mut self.regs);
    }

    /// Issues one macro-instruction as an upper/lower micro-instruction pair.
    pub fn macro_issue(&mut self, upper: u32, lower: u32) {
        self.engine.macro_issue(&mut self.regs, upper, lower);
    }

    /// Records `address` in `TPC` and starts the micro-program there.
    pub fn start_microprogram(&mut self, address: u32) {
        self.regs.set_control(VU_CTRL_TPC, address);
        self.engine.start_microprogram(&mut self.regs, address);
    }

    /// Returns `true` once a running micro-program has released the interlock.
    #[must_use]
    pub fn micro_interlock_released(&self) -> bool {
        self.engine.micro_interlock_released()
    }

    /// Acknowledges a released micro-interlock.
    pub fn clear_micro_interlock(&mut self) {
        self.engine.clear_micro_interlock();
    }
}
