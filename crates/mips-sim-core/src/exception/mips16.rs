use crate::memory::{sign_extend_32, AccessWidth};
use crate::state::{REG_RA, REG_SP};
use crate::{Exception, FloatingPoint, FpFormat, Simulator};

/// `aregs` values at or above this encode an exit rather than an entry.
pub const MIPS16_EXIT_AREGS: u8 = 5;

/// Returns `true` for a compressed-mode `entry`/`exit` instruction fetched at `cia`.
#[must_use]
pub const fn is_entry_exit(cia: u64, insn: u32) -> bool {
    cia & 1 != 0 && insn & 0xF81F == 0xE809 && insn & 0x00C0 != 0x00C0
}

/// Operand fields of a compressed `entry`/`exit` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryExit {
    /// Argument-register count, or the exit form and its floating-point result shape.
    pub aregs: u8,
    /// Number of callee-saved registers spilled or restored.
    pub sregs: u8,
    /// Saves or restores the return address.
    pub save_ra: bool,
}

impl EntryExit {
    /// Extracts the operand fields.
    #[must_use]
    pub const fn decode(insn: u32) -> Self {
        Self {
            aregs: ((insn >> 8) & 7) as u8,
            sregs: ((insn >> 6) & 3) as u8,
            save_ra: insn & 0x20 != 0,
        }
    }

    /// Returns `true` for the exit form.
    #[must_use]
    pub const fn is_exit(self) -> bool {
        self.aregs >= MIPS16_EXIT_AREGS
    }
}

impl Simulator {
    /// Emulates a compressed procedure `entry` or `exit`.
    ///
    /// Frame accesses are checked word accesses, so a misaligned stack pointer raises
    /// an address error part way through.
    pub(crate) fn mips16_entry_exit(&mut self, insn: u32) -> Result<(), Exception> {
        let op = EntryExit::decode(insn);
        let frame = self.config.mips16;
        let sp = self.cpu.gpr(REG_SP);

        if op.is_exit() {
            let mut tsp = sp.wrapping_add(frame.frame_size);
            if op.save_ra {
                tsp = tsp.wrapping_sub(4);
                let ra = self.load(tsp, AccessWidth::Word)?;
                self.cpu.set_gpr(REG_RA, sign_extend_32(ra));
            }
            for i in 0..op.sregs {
                tsp = tsp.wrapping_sub(4);
                let value = self.load(tsp, AccessWidth::Word)?;
                self.cpu.set_gpr(frame.first_saved_reg + i, sign_extend_32(value));
            }
            self.cpu.set_gpr(REG_SP, sp.wrapping_add(frame.frame_size));

            if self.config.floating_point != FloatingPoint::None {
                let first = frame.first_arg_reg;
                let results: &[(u8, u8)] = if op.aregs == frame.single_fp_result {
                    &[(0, first)]
                } else if op.aregs == frame.double_fp_result {
                    &[(0, first + 1), (1, first)]
                } else {
                    &[]
                };
                for &(fgr, gpr) in results {
                    self.cpu.set_fgr(fgr, self.cpu.gpr(gpr) & 0xFFFF_FFFF);
                    self.cpu.set_fpr_state(fgr, FpFormat::Uninterpreted);
                }
            }
            self.cpu.set_pc(self.cpu.gpr(REG_RA));
        } else {
            for i in 0..op.aregs {
                let value = self.cpu.gpr(frame.first_arg_reg + i);
                self.store(sp.wrapping_add(4 * u64::from(i)), AccessWidth::Word, value)?;
            }
            let mut tsp = sp;
            self.cpu.set_gpr(REG_SP, sp.wrapping_sub(frame.frame_size));
            if op.save_ra {
                tsp = tsp.wrapping_sub(4);
                self.store(tsp, AccessWidth::Word, self.cpu.gpr(REG_RA))?;
            }
            for i in 0..op.sregs {
                tsp = tsp.wrapping_sub(4);
                let value = self.cpu.gpr(frame.first_saved_reg + i);
                self.store(tsp, AccessWidth::Word, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{is_entry_exit, EntryExit};
    use crate::memory::AccessWidth;
    use crate::state::{REG_RA, REG_SP};
    use crate::{ExceptionKind, FpFormat, SimConfig, Simulator};

    const SP: u64 = 0xFFFF_FFFF_8000_8000;

    fn sim() -> Simulator {
        let mut sim = Simulator::new(SimConfig::default());
        sim.cpu.set_gpr(REG_SP, SP);
        sim
    }

    #[test]
    fn detection_needs_an_odd_pc_and_a_valid_sregs_field() {
        assert!(is_entry_exit(0x8000_0001, 0xE8A9));
        assert!(!is_entry_exit(0x8000_0000, 0xE8A9));
        assert!(!is_entry_exit(0x8000_0001, 0xE8E9));
        assert_eq!(
            EntryExit::decode(0xE9A9),
            EntryExit {
                aregs: 1,
                sregs: 2,
                save_ra: true
            }
        );
    }

    #[test]
    fn entry_spills_arguments_return_address_and_saved_registers() {
        let mut sim = sim();
        sim.cpu.set_gpr(4, 0x44);
        sim.cpu.set_gpr(5, 0x55);
        sim.cpu.set_gpr(16, 0x1616);
        sim.cpu.set_gpr(REG_RA, 0x8000_0100);
        // aregs 2, sregs 1, ra
        sim.mips16_entry_exit(0xEA69).expect("entry");
        let word = |sim: &Simulator, addr: u64| sim.memory.load(addr, AccessWidth::Word).expect("word");
        assert_eq!(word(&sim, SP), 0x44);
        assert_eq!(word(&sim, SP + 4), 0x55);
        assert_eq!(word(&sim, SP - 4), 0x8000_0100);
        assert_eq!(word(&sim, SP - 8), 0x1616);
        assert_eq!(sim.cpu.gpr(REG_SP), SP - 32);
    }

    #[test]
    fn exit_restores_the_frame_and_returns() {
        let mut sim = sim();
        sim.cpu.set_gpr(REG_RA, 0x8000_0100);
        sim.cpu.set_gpr(16, 0x1616);
        sim.mips16_entry_exit(0xE869).expect("entry");
        sim.cpu.set_gpr(REG_RA, 0);
        sim.cpu.set_gpr(16, 0);
        sim.cpu.set_gpr(4, 0x3F80_0000);

        // aregs 5 (single float result), sregs 1, ra
        sim.mips16_entry_exit(0xED69).expect("exit");
        assert_eq!(sim.cpu.gpr(REG_RA), 0xFFFF_FFFF_8000_0100);
        assert_eq!(sim.cpu.gpr(16), 0x1616);
        assert_eq!(sim.cpu.gpr(REG_SP), SP);
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_8000_0100);
        assert_eq!(sim.cpu.fgr(0), 0x3F80_0000);
        assert_eq!(sim.cpu.fpr_state(0), FpFormat::Uninterpreted);
    }

    #[test]
    fn misaligned_frames_raise_address_errors() {
        let mut sim = sim();
        sim.cpu.set_gpr(REG_SP, SP + 2);
        let err = sim.mips16_entry_exit(0xE969).expect_err("misaligned");
        assert_eq!(err.kind, ExceptionKind::AddressStore);
    }
}
