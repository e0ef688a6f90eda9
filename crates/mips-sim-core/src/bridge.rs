//! Debugger bridge: raw memory transfers and target-endian register access.
//!
//! Nothing here goes through the checked access path, so bridge traffic never shows
//! up in statistics or traces.

use thiserror::Error;

use crate::memory::{decode_value, encode_value};
use crate::state::{RegisterClass, VuSpecial};
use crate::vu::{VU_CTRL_I, VU_CTRL_Q, VU_CTRL_R, VU_CTRL_TPC};
use crate::Simulator;

/// Register bridge failures. Each one transfers zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum BridgeError {
    /// The register number is outside the descriptor table.
    #[error("register {index} does not exist")]
    UnknownRegister {
        /// Logical register number.
        index: usize,
    },
    /// The register exists in the numbering but not in this configuration.
    #[error("Invalid register width for {index}")]
    InvalidWidth {
        /// Logical register number.
        index: usize,
    },
    /// The caller's buffer cannot hold the register.
    #[error("buffer of {len} bytes is too short for register {index} ({width} bytes)")]
    ShortBuffer {
        /// Logical register number.
        index: usize,
        /// Register transfer width in bytes.
        width: usize,
        /// Buffer length in bytes.
        len: usize,
    },
}

impl Simulator {
    /// Copies `data` into target memory at `addr` through raw translation.
    ///
    /// Returns the number of bytes written, stopping at the first unbacked address.
    pub fn write_memory(&mut self, addr: u64, data: &[u8]) -> usize {
        data.iter()
            .zip(0u64..)
            .take_while(|(byte, offset)| self.memory.raw_write_byte(addr.wrapping_add(*offset), **byte))
            .count()
    }

    /// Copies target memory at `addr` into `buf` through raw translation.
    ///
    /// Returns the number of bytes read, stopping at the first unbacked address.
    pub fn read_memory(&self, addr: u64, buf: &mut [u8]) -> usize {
        let mut count = 0;
        for (slot, offset) in buf.iter_mut().zip(0u64..) {
            let Some(byte) = self.memory.raw_read_byte(addr.wrapping_add(offset)) else {
                break;
            };
            *slot = byte;
            count += 1;
        }
        count
    }

    fn register_transfer(&self, index: usize, len: usize) -> Result<(RegisterClass, usize), BridgeError> {
        let descriptor = self
            .registers
            .get(index)
            .ok_or(BridgeError::UnknownRegister { index })?;
        let width = descriptor.width_bits as usize / 8;
        if width == 0 {
            return Err(BridgeError::InvalidWidth { index });
        }
        if len < width {
            return Err(BridgeError::ShortBuffer { index, width, len });
        }
        Ok((descriptor.class, width))
    }

    /// Writes logical register `index` from a target-endian buffer.
    ///
    /// # Errors
    ///
    /// Fails for unknown or absent registers and buffers shorter than the register.
    pub fn try_store_register(&mut self, index: usize, data: &[u8]) -> Result<usize, BridgeError> {
        let (class, width) = self.register_transfer(index, data.len())?;
        let value = decode_value(&data[..width], self.memory.endian());
        self.write_register(class, value);
        Ok(width)
    }

    /// Reads logical register `index` into a target-endian buffer.
    ///
    /// # Errors
    ///
    /// Fails for unknown or absent registers and buffers shorter than the register.
    pub fn try_fetch_register(&self, index: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
        let (class, width) = self.register_transfer(index, buf.len())?;
        encode_value(self.read_register(class), self.memory.endian(), &mut buf[..width]);
        Ok(width)
    }

    /// Writes logical register `index`, returning the bytes consumed or zero on failure.
    pub fn store_register(&mut self, index: usize, data: &[u8]) -> usize {
        self.try_store_register(index, data).unwrap_or_else(|err| {
            tracing::error!(%err, "register store ignored");
            0
        })
    }

    /// Reads logical register `index`, returning the bytes produced or zero on failure.
    pub fn fetch_register(&self, index: usize, buf: &mut [u8]) -> usize {
        self.try_fetch_register(index, buf).unwrap_or_else(|err| {
            tracing::error!(%err, "register fetch failed");
            0
        })
    }

    fn read_register(&self, class: RegisterClass) -> u64 {
        let cpu = &self.cpu;
        let vu = self.vector_unit.as_ref().map(|unit| &unit.regs);
        match class {
            RegisterClass::Gpr(reg) => cpu.gpr(reg),
            RegisterClass::Status => u64::from(cpu.sr()),
            RegisterClass::Lo => cpu.lo(),
            RegisterClass::Hi => cpu.hi(),
            RegisterClass::BadVAddr => cpu.bad_vaddr(),
            RegisterClass::Cause => u64::from(cpu.cause()),
            RegisterClass::Pc => cpu.pc(),
            RegisterClass::Fgr(reg) => cpu.fgr(reg),
            RegisterClass::Fcr31 => u64::from(cpu.fcr31()),
            RegisterClass::Fcr0 => u64::from(cpu.fcr0()),
            RegisterClass::Aux(index) => u64::from(cpu.aux(usize::from(index)).unwrap_or(0)),
            RegisterClass::GprUpper(reg) => cpu.gpr_upper(reg),
            RegisterClass::Lo1 => cpu.lo1(),
            RegisterClass::Hi1 => cpu.hi1(),
            RegisterClass::Sa => cpu.sa(),
            RegisterClass::VuInteger(reg) => vu.map_or(0, |regs| u64::from(regs.integer(reg))),
            // VU0 has no P register.
            RegisterClass::VuSpecial(VuSpecial::Mp) => 0,
            RegisterClass::VuSpecial(special) => {
                vu.map_or(0, |regs| u64::from(regs.control(special_control(special))))
            }
            RegisterClass::VuAccumulator(lane) => vu.map_or(0, |regs| u64::from(regs.accumulator(lane))),
            RegisterClass::VuVector { reg, lane } => vu.map_or(0, |regs| u64::from(regs.lane(reg, lane))),
        }
    }

    fn write_register(&mut self, class: RegisterClass, value: u64) {
        let cpu = &mut self.cpu;
        let vu = self.vector_unit.as_mut().map(|unit| &mut unit.regs);
        match class {
            RegisterClass::Gpr(reg) => cpu.set_gpr(reg, value),
            RegisterClass::Status => cpu.set_sr(value as u32),
            RegisterClass::Lo => cpu.set_lo(value),
            RegisterClass::Hi => cpu.set_hi(value),
            RegisterClass::BadVAddr => cpu.set_bad_vaddr(value),
            RegisterClass::Cause => cpu.set_cause(value as u32),
            RegisterClass::Pc => cpu.set_pc(value),
            RegisterClass::Fgr(reg) => cpu.set_fgr(reg, value),
            RegisterClass::Fcr31 => cpu.set_fcr31(value as u32),
            RegisterClass::Fcr0 => cpu.set_fcr0(value as u32),
            RegisterClass::Aux(index) => cpu.set_aux(usize::from(index), value as u32),
            RegisterClass::GprUpper(reg) => cpu.set_gpr_upper(reg, value),
            RegisterClass::Lo1 => cpu.set_lo1(value),
            RegisterClass::Hi1 => cpu.set_hi1(value),
            RegisterClass::Sa => cpu.set_sa(value),
            RegisterClass::VuSpecial(VuSpecial::Mp) => {}
            RegisterClass::VuInteger(reg) => {
                if let Some(regs) = vu {
                    regs.set_integer(reg, value as u16);
                }
            }
            RegisterClass::VuSpecial(special) => {
                if let Some(regs) = vu {
                    regs.set_control(special_control(special), value as u32);
                }
            }
            RegisterClass::VuAccumulator(lane) => {
                if let Some(regs) = vu {
                    regs.set_accumulator(lane, value as u32);
                }
            }
            RegisterClass::VuVector { reg, lane } => {
                if let Some(regs) = vu {
                    regs.set_lane(reg, lane, value as u32);
                }
            }
        }
    }
}

const fn special_control(special: VuSpecial) -> u8 {
    match special {
        VuSpecial::Cia => VU_CTRL_TPC,
        VuSpecial::Mr => VU_CTRL_R,
        VuSpecial::Mi => VU_CTRL_I,
        VuSpecial::Mq | VuSpecial::Mp => VU_CTRL_Q,
    }
}
