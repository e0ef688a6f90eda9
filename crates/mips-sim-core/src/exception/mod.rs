//! Delay-slot-aware exception dispatch.
//!
//! [`Simulator::signal_exception`] records the architectural side effects of an
//! exception (`Cause`, `EPC`, `SR`, `PC`) and tells the execution loop whether to keep
//! going, restart at the new `PC` or halt. Monitor traps and compressed entry/exit
//! sequences arrive as reserved instructions and are serviced here before the generic
//! path runs.

/// Compressed-mode procedure entry/exit emulation.
pub mod mips16;

pub use mips16::{is_entry_exit, EntryExit, MIPS16_EXIT_AREGS};

use crate::monitor::{monitor_trap_reason, HostCallbacks};
use crate::state::{
    CAUSE_BD, CAUSE_EXCCODE_MASK, CAUSE_EXCCODE_SHIFT, DEBUG_DBD, DEBUG_DBP, DEBUG_DM, REG_RA,
    SR_BEV, SR_EXL,
};
use crate::{Exception, ExceptionKind, Simulator, StopReason, TraceEvent};

/// General exception vector.
pub const GENERAL_VECTOR: u32 = 0x8000_0180;
/// General exception vector while `SR.BEV` is set.
pub const GENERAL_VECTOR_BEV: u32 = 0xBFC0_0380;
/// R3900 exception vector.
pub const R3900_VECTOR: u32 = 0x8000_0080;
/// R3900 exception vector while `SR.BEV` is set.
pub const R3900_VECTOR_BEV: u32 = 0xBFC0_0180;
/// Debug-mode entry point.
pub const DEBUG_VECTOR: u32 = 0xBFC0_0200;
/// Reset entry point.
pub const RESET_VECTOR: u32 = 0xBFC0_0000;

/// What the execution loop does after an exception was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Finish the current step normally.
    Resume,
    /// Abandon the current step and start over at the new `PC`.
    Restart,
    /// Stop the loop.
    Halt(StopReason),
}

impl Simulator {
    /// Delivers `exception`, raised by the instruction at `cia`.
    ///
    /// Reserved instructions are first offered to the monitor shim and to the
    /// compressed entry/exit emulation. Everything else enters the exception vector,
    /// recording the delay-slot state in `Cause.BD` and `EPC`.
    pub fn signal_exception(
        &mut self,
        host: &mut dyn HostCallbacks,
        exception: Exception,
        cia: u64,
    ) -> Disposition {
        let kind = exception.kind;
        self.cpu.set_llbit(false);

        match (kind, exception.instruction) {
            (ExceptionKind::DebugBreakPoint, _) => {
                self.record_delivery(kind, cia);
                return self.enter_debug_mode(cia);
            }
            (ExceptionKind::ReservedInstruction, Some(insn)) => {
                if let Some(reason) = monitor_trap_reason(insn) {
                    return match self.monitor_call(host, cia, reason) {
                        Some(stop) => Disposition::Halt(stop),
                        None => {
                            self.cpu.set_pc(self.cpu.gpr(REG_RA));
                            Disposition::Restart
                        }
                    };
                }
                if is_entry_exit(cia, insn) {
                    return match self.mips16_entry_exit(insn) {
                        Ok(()) => Disposition::Restart,
                        Err(nested) => self.signal_exception(host, nested, cia),
                    };
                }
                tracing::error!(
                    pc = format_args!("{cia:#x}"),
                    insn = format_args!("{insn:#010x}"),
                    "reserved instruction"
                );
            }
            (ExceptionKind::ReservedInstruction, None) => {
                tracing::error!(pc = format_args!("{cia:#x}"), "reserved instruction");
            }
            _ => {}
        }

        self.record_delivery(kind, cia);
        if let Some(vaddr) = exception.bad_vaddr {
            self.cpu.set_bad_vaddr(vaddr);
        }
        if self.config.is_r3900() {
            self.enter_r3900_vector(kind, cia);
        } else {
            self.enter_general_vector(kind, cia);
        }

        match kind {
            ExceptionKind::Interrupt => {
                self.cpu.flags.unpark();
                Disposition::Resume
            }
            ExceptionKind::NmiReset => {
                if self.config.is_r3900() {
                    self.cpu.set_pc(self.config.canonical_address(RESET_VECTOR));
                }
                Disposition::Resume
            }
            _ => match kind.halt_signal() {
                Some(signal) => {
                    if kind.restores_epc() {
                        self.cpu.set_pc(self.cpu.epc());
                    }
                    Disposition::Halt(StopReason::Signalled(signal))
                }
                None => Disposition::Restart,
            },
        }
    }

    fn record_delivery(&mut self, kind: ExceptionKind, cia: u64) {
        tracing::debug!(?kind, pc = format_args!("{cia:#x}"), "exception");
        self.stats.record_exception(kind, cia);
        self.emit_trace(TraceEvent::Exception { kind, cia });
    }

    fn enter_debug_mode(&mut self, cia: u64) -> Disposition {
        let mut debug = self.cpu.debug();
        if debug & DEBUG_DM != 0 {
            return Disposition::Resume;
        }
        if self.cpu.in_delay_slot() {
            self.cpu.cancel_delay_slot();
            debug |= DEBUG_DBD;
            self.cpu.set_depc(cia.wrapping_sub(4));
        } else {
            debug &= !DEBUG_DBD;
            self.cpu.set_depc(cia);
        }
        self.cpu.set_debug(debug | DEBUG_DM | DEBUG_DBP);
        self.cpu.set_pc(self.config.canonical_address(DEBUG_VECTOR));
        Disposition::Restart
    }

    /// Saves `EPC` and `Cause.BD` for an exception at `cia`, abandoning any pending branch.
    fn save_victim(&mut self, cia: u64, cause: u32) -> u32 {
        if self.cpu.in_delay_slot() {
            self.cpu.cancel_delay_slot();
            self.cpu.set_epc(cia.wrapping_sub(4));
            cause | CAUSE_BD
        } else {
            self.cpu.set_epc(cia);
            cause & !CAUSE_BD
        }
    }

    fn enter_general_vector(&mut self, kind: ExceptionKind, cia: u64) {
        let code = u32::from(kind.as_u8()) << CAUSE_EXCCODE_SHIFT;
        let cause = if self.cpu.sr_has(SR_EXL) {
            // Nested: EPC keeps the first victim.
            self.cpu.cancel_delay_slot();
            code
        } else {
            self.save_victim(cia, code)
        };
        self.cpu.set_cause(cause);
        self.cpu.set_sr(self.cpu.sr() | SR_EXL);

        let vector = if self.cpu.sr_has(SR_BEV) {
            GENERAL_VECTOR_BEV
        } else {
            GENERAL_VECTOR
        };
        self.cpu.set_pc(self.config.canonical_address(vector));
    }

    fn enter_r3900_vector(&mut self, kind: ExceptionKind, cia: u64) {
        let code_mask = CAUSE_EXCCODE_MASK << CAUSE_EXCCODE_SHIFT;
        let code = (u32::from(kind.as_u8()) << CAUSE_EXCCODE_SHIFT) & code_mask;
        let cause = (self.cpu.cause() & !code_mask & !0b11) | code;
        let cause = self.save_victim(cia, cause);
        self.cpu.set_cause(cause);

        // Push the kernel/interrupt-enable stack.
        let sr = self.cpu.sr();
        self.cpu.set_sr((sr & !0x3F) | ((sr & 0xF) << 2));

        let vector = if self.cpu.sr_has(SR_BEV) {
            R3900_VECTOR_BEV
        } else {
            R3900_VECTOR
        };
        self.cpu.set_pc(self.config.canonical_address(vector));
    }
}
