use super::decode::{decode_cop2, Cop2Instruction};
use crate::memory::sign_extend_32;
use crate::state::SR_CU2;
use crate::vu::{VectorUnit, VU_CTRL_CMSAR0};
use crate::{Exception, SimFault, Simulator, Trap};

/// Polls `waiting`, advancing the engine one issue cycle per iteration.
fn spin(
    unit: &mut VectorUnit,
    limit: u32,
    mut waiting: impl FnMut(&mut VectorUnit) -> bool,
) -> Result<(), SimFault> {
    let mut spins = 0;
    while waiting(unit) {
        if spins >= limit {
            return Err(SimFault::VectorUnitStalled { spins });
        }
        unit.issue();
        spins += 1;
    }
    Ok(())
}

/// Waits for an interlocked move: until the unit is idle or a running micro-program
/// releases the interlock.
fn await_interlock(unit: &mut VectorUnit, limit: u32, interlock: bool) -> Result<(), SimFault> {
    spin(unit, limit, |unit| {
        if !(interlock && unit.is_busy()) {
            return false;
        }
        if unit.micro_interlock_released() {
            unit.clear_micro_interlock();
            return false;
        }
        true
    })
}

impl Simulator {
    pub(crate) fn execute_cop2(&mut self, cia: u64, insn: u32) -> Result<(), Trap> {
        let limit = self.config.vu_spin_limit;
        let Some(unit) = self.vector_unit.as_mut() else {
            tracing::error!(insn = format_args!("{insn:#010x}"), "COP2 instruction with no handler");
            return Ok(());
        };
        if !self.cpu.sr_has(SR_CU2) {
            return Err(Exception::coprocessor_unusable(insn).into());
        }

        match decode_cop2(insn) {
            Cop2Instruction::Branch {
                on_busy,
                likely,
                offset,
            } => {
                if unit.is_busy() == on_busy {
                    self.cpu.delay_slot(cia.wrapping_add(4).wrapping_add(offset));
                } else if likely {
                    self.cpu.nullify_next_instruction();
                }
            }
            Cop2Instruction::ControlFrom(mv) => {
                spin(unit, limit, |unit| mv.interlock && unit.is_busy())?;
                let value = u64::from(unit.regs.control(mv.id));
                self.cpu.set_gpr(mv.rt, sign_extend_32(value));
            }
            Cop2Instruction::QuadFrom(mv) => {
                spin(unit, limit, |unit| mv.interlock && unit.is_busy())?;
                let value = unit.regs.quad(mv.id);
                self.cpu.set_gpr(mv.rt, value as u64);
                self.cpu.set_gpr_upper(mv.rt, (value >> 64) as u64);
            }
            Cop2Instruction::ControlTo(mv) => {
                await_interlock(unit, limit, mv.interlock)?;
                unit.regs.set_control(mv.id, self.cpu.gpr(mv.rt) as u32);
            }
            Cop2Instruction::QuadTo(mv) => {
                await_interlock(unit, limit, mv.interlock)?;
                let value =
                    (u128::from(self.cpu.gpr_upper(mv.rt)) << 64) | u128::from(self.cpu.gpr(mv.rt));
                unit.regs.set_quad(mv.id, value);
            }
            Cop2Instruction::WaitQ => spin(unit, limit, |unit| unit.is_q_busy())?,
            Cop2Instruction::CallMicroprogram { address } => {
                spin(unit, limit, |unit| unit.is_busy())?;
                unit.start_microprogram(address);
            }
            Cop2Instruction::CallMicroprogramRegister => {
                spin(unit, limit, |unit| unit.is_busy())?;
                let address = unit.regs.control(VU_CTRL_CMSAR0);
                unit.start_microprogram(address);
            }
            Cop2Instruction::UpperMacro { upper, lower }
            | Cop2Instruction::LowerMacro { upper, lower } => {
                spin(unit, limit, |unit| unit.is_busy())?;
                unit.macro_issue(upper, lower);
                spin(unit, limit, |unit| unit.is_busy())?;
            }
            Cop2Instruction::Reserved => {
                return Err(Exception::reserved_instruction(insn).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::state::SR_CU2;
    use crate::vu::{LatencyMicroEngine, VU_CTRL_CMSAR0, VU_CTRL_TPC};
    use crate::{CpuVariant, Exception, SimConfig, SimFault, Simulator, Trap};

    fn r5900(engine: LatencyMicroEngine) -> Simulator {
        let mut sim = Simulator::with_micro_engine(
            SimConfig {
                variant: CpuVariant::R5900,
                vu_spin_limit: 100,
                ..SimConfig::default()
            },
            Box::new(engine),
        );
        sim.cpu.set_sr(sim.cpu.sr() | SR_CU2);
        sim
    }

    #[test]
    fn cop2_without_cu2_is_unusable() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.cpu.set_sr(0);
        assert_eq!(
            sim.execute_cop2(0, 0x4A00_03BF),
            Err(Trap::Exception(Exception::coprocessor_unusable(0x4A00_03BF)))
        );
    }

    #[test]
    fn cop2_without_a_vector_unit_is_ignored() {
        let mut sim = Simulator::new(SimConfig::default());
        assert_eq!(sim.execute_cop2(0, 0x4A00_03BF), Ok(()));
    }

    #[test]
    fn bc2f_is_taken_when_idle() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.execute_cop2(0x8000_0000, 0x4900_0010).expect("branch");
        assert!(sim.cpu.in_delay_slot());
        assert_eq!(sim.cpu.dspc(), 0x8000_0044);
    }

    #[test]
    fn bc2tl_not_taken_nullifies_the_delay_slot() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.execute_cop2(0x8000_0000, 0x4903_0010).expect("branch");
        assert!(!sim.cpu.in_delay_slot());
        assert!(sim.cpu.flags.skip_next);
    }

    #[test]
    fn control_moves_sign_extend_on_read() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.cpu.set_gpr(5, 0x8000_0040);
        sim.execute_cop2(0, 0x48C5_D800).expect("ctc2");
        sim.execute_cop2(0, 0x4846_D800).expect("cfc2");
        assert_eq!(sim.cpu.gpr(6), 0xFFFF_FFFF_8000_0040);
    }

    #[test]
    fn quad_moves_use_the_upper_gpr_half() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.cpu.set_gpr(6, 0x2222_2222_1111_1111);
        sim.cpu.set_gpr_upper(6, 0x4444_4444_3333_3333);
        sim.execute_cop2(0, 0x48A6_2000).expect("qmtc2");
        let unit = sim.vector_unit().expect("unit");
        assert_eq!(unit.regs.lane(4, 0), 0x1111_1111);
        assert_eq!(unit.regs.lane(4, 3), 0x4444_4444);

        sim.execute_cop2(0, 0x4827_2000).expect("qmfc2");
        assert_eq!(sim.cpu.gpr(7), 0x2222_2222_1111_1111);
        assert_eq!(sim.cpu.gpr_upper(7), 0x4444_4444_3333_3333);
    }

    #[test]
    fn vcallmsr_starts_at_cmsar0() {
        let mut sim = r5900(LatencyMicroEngine::default());
        sim.vector_unit_mut()
            .expect("unit")
            .regs
            .set_control(VU_CTRL_CMSAR0, 0x80);
        sim.execute_cop2(0, 0x4A00_0039).expect("vcallmsr");
        let unit = sim.vector_unit().expect("unit");
        assert_eq!(unit.regs.control(VU_CTRL_TPC), 0x80);
        assert!(unit.is_busy());
    }

    #[test]
    fn macros_block_until_the_engine_is_idle() {
        let mut sim = r5900(LatencyMicroEngine::new(3, 8));
        sim.execute_cop2(0, 0x4BE2_0828).expect("macro");
        assert!(!sim.vector_unit().expect("unit").is_busy());
    }

    #[test]
    fn engines_that_never_finish_stall_the_simulator() {
        let mut sim = r5900(LatencyMicroEngine::new(1_000, 8));
        assert_eq!(
            sim.execute_cop2(0, 0x4BE2_0828),
            Err(Trap::Fault(SimFault::VectorUnitStalled { spins: 100 }))
        );
    }

    #[test]
    fn reserved_cop2_encodings_raise_ri() {
        let mut sim = r5900(LatencyMicroEngine::default());
        assert_eq!(
            sim.execute_cop2(0, 0x4A00_0036),
            Err(Trap::Exception(Exception::reserved_instruction(0x4A00_0036)))
        );
    }
}
