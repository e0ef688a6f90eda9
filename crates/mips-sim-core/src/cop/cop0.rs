use super::decode::{decode_cop0, Cop0Instruction};
use crate::state::{DEBUG_DM, SR_ERL, SR_EXL};
use crate::Simulator;

/// Written to the destination of an `MFC0` from an unmodeled register.
pub const COP0_POISON: u64 = 0xDEAD_C0DE;

const CP0_SR: u8 = 12;
const CP0_CAUSE: u8 = 13;
const CP0_EPC: u8 = 14;
const CP0_CONFIG_OR_DEBUG: u8 = 16;
const CP0_DEPC: u8 = 17;
const CP0_R3900_IGNORED: u8 = 3;

impl Simulator {
    pub(crate) fn execute_cop0(&mut self, insn: u32) {
        match decode_cop0(insn) {
            Cop0Instruction::MoveFrom { rt, rd } => self.move_from_cop0(rt, rd),
            Cop0Instruction::MoveTo { rt, rd } => self.move_to_cop0(rt, rd),
            Cop0Instruction::Eret => {
                let sr = self.cpu.sr();
                if sr & SR_ERL != 0 {
                    tracing::warn!(epc = self.cpu.epc(), "ERET with SR.ERL set");
                    self.cpu.set_sr(sr & !SR_ERL);
                } else {
                    self.cpu.set_sr(sr & !SR_EXL);
                }
                self.cpu.set_pc(self.cpu.epc());
                self.cpu.set_llbit(false);
            }
            Cop0Instruction::Rfe => {
                if self.config.is_r3900() {
                    let sr = self.cpu.sr();
                    self.cpu.set_sr((sr & !0xF) | ((sr >> 2) & 0xF));
                }
            }
            Cop0Instruction::Deret => {
                self.cpu.set_debug(self.cpu.debug() & !DEBUG_DM);
                self.cpu.delay_slot(self.cpu.depc());
            }
            Cop0Instruction::Unrecognised => {
                tracing::warn!(insn = format_args!("{insn:#010x}"), "unrecognised COP0 instruction");
            }
        }
    }

    fn move_from_cop0(&mut self, rt: u8, rd: u8) {
        let r3900 = self.config.is_r3900();
        let value = match rd {
            CP0_R3900_IGNORED if r3900 => return,
            CP0_SR => u64::from(self.cpu.sr()),
            CP0_CAUSE => u64::from(self.cpu.cause()),
            CP0_EPC => self.config.canonical_address(self.cpu.epc() as u32),
            CP0_CONFIG_OR_DEBUG if r3900 => u64::from(self.cpu.debug()),
            CP0_CONFIG_OR_DEBUG => u64::from(self.cpu.config()),
            CP0_DEPC if r3900 => self.cpu.depc(),
            _ => {
                tracing::warn!(rt, rd, "MFC0 from unmodeled register (architecture specific)");
                COP0_POISON
            }
        };
        self.cpu.set_gpr(rt, value);
    }

    fn move_to_cop0(&mut self, rt: u8, rd: u8) {
        let r3900 = self.config.is_r3900();
        let value = self.cpu.gpr(rt);
        match rd {
            CP0_R3900_IGNORED if r3900 => {}
            CP0_SR => self.cpu.set_sr(value as u32),
            CP0_CAUSE => self.cpu.set_cause(value as u32),
            CP0_EPC => self.cpu.set_epc(value),
            CP0_CONFIG_OR_DEBUG if r3900 => self.cpu.set_debug(value as u32),
            CP0_CONFIG_OR_DEBUG => self.cpu.set_config(value as u32),
            CP0_DEPC if r3900 => self.cpu.set_depc(value),
            _ => tracing::warn!(rt, rd, "MTC0 to unmodeled register ignored (architecture specific)"),
        }
    }
}
