//! Fetch/execute loop.
//!
//! Each step samples the delay-slot state, fetches at `PC`, advances `PC` past the
//! instruction, runs the per-opcode semantics, forces `r0` back to zero, commits any
//! delay slot sampled at the top of the step and finally advances the event queue.

use crate::events::EventKind;
use crate::exception::Disposition;
use crate::memory::AccessWidth;
use crate::monitor::HostCallbacks;
use crate::state::{REG_ZERO, SR_IE};
use crate::{
    Exception, ExceptionKind, RunBoundary, RunOutcome, RunState, SimFault, Simulator,
    StepOutcome, StopReason, TraceEvent, Trap,
};

/// An instruction fetched by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Address the instruction was fetched from, including the compressed-mode bit.
    pub cia: u64,
    /// Raw instruction word, zero-extended for 16-bit fetches.
    pub word: u32,
    /// Fetch width: half for compressed mode, word otherwise.
    pub width: AccessWidth,
}

impl Instruction {
    /// Returns `true` for a 16-bit compressed-mode instruction.
    #[must_use]
    pub const fn is_compressed(&self) -> bool {
        matches!(self.width, AccessWidth::Half)
    }
}

/// Per-opcode semantics driven by the execution loop.
///
/// Implementations read and write [`Simulator`] state and redirect control flow only
/// through the delay-slot helpers on [`crate::CpuState`] or by returning a [`Trap`].
pub trait InstructionSemantics {
    /// Executes `insn` and returns the cycles it consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Trap::Exception`] for an architectural exception, [`Trap::Fault`] for a
    /// fatal simulator fault and [`Trap::Halt`] to stop the loop.
    fn execute(&mut self, sim: &mut Simulator, insn: Instruction) -> Result<u32, Trap>;
}

impl<F> InstructionSemantics for F
where
    F: FnMut(&mut Simulator, Instruction) -> Result<u32, Trap>,
{
    fn execute(&mut self, sim: &mut Simulator, insn: Instruction) -> Result<u32, Trap> {
        self(sim, insn)
    }
}

impl Simulator {
    /// Runs one iteration of the execution loop.
    ///
    /// A latched fault is reported again without executing anything until
    /// [`Simulator::cold_reset`].
    pub fn step(
        &mut self,
        semantics: &mut dyn InstructionSemantics,
        host: &mut dyn HostCallbacks,
    ) -> StepOutcome {
        if let RunState::FaultLatched(fault) = self.run_state {
            return StepOutcome::Halted(StopReason::Faulted(fault));
        }
        self.run_state = RunState::Running;

        if self.cpu.flags.is_parked() {
            return match self.advance_time(host, 1) {
                Some(stop) => self.halt(stop),
                None => StepOutcome::Idle,
            };
        }

        self.cpu.flags.delay_slot_snapshot = self.cpu.flags.delay_slot;
        let cia = self.cpu.pc();
        let width = if cia & 1 == 0 {
            AccessWidth::Word
        } else {
            AccessWidth::Half
        };
        let Some(word) = self.memory.fetch(cia & !1, width) else {
            return self.latch(SimFault::UnmappedFetch { pc: cia });
        };
        self.emit_trace(TraceEvent::Fetch {
            pc: cia,
            width: width.bytes() as u8,
        });
        self.cpu.set_pc(cia.wrapping_add(width.bytes() as u64));

        let result = if self.cpu.flags.skip_next {
            self.cpu.flags.skip_next = false;
            Ok(1)
        } else {
            semantics.execute(
                self,
                Instruction {
                    cia,
                    word: word as u32,
                    width,
                },
            )
        };
        self.cpu.set_gpr(REG_ZERO, 0);

        let cycles = match result {
            Ok(cycles) => cycles,
            Err(Trap::Exception(exception)) => {
                match self.signal_exception(host, exception, cia) {
                    Disposition::Resume => 1,
                    Disposition::Restart => return StepOutcome::Restarted,
                    Disposition::Halt(stop) => return self.halt(stop),
                }
            }
            Err(Trap::Fault(fault)) => return self.latch(fault),
            Err(Trap::Halt(stop)) => return self.halt(stop),
        };

        if self.cpu.flags.delay_slot_snapshot {
            self.cpu.set_pc(self.cpu.dspc());
            self.cpu.cancel_delay_slot();
        }

        self.stats.record_instruction();
        match self.advance_time(host, u64::from(cycles.max(1))) {
            Some(stop) => self.halt(stop),
            None => StepOutcome::Retired { cycles },
        }
    }

    /// Steps until a halt or until `boundary` is reached.
    ///
    /// With [`RunBoundary::Halt`] the loop also returns, without a stop reason, when
    /// the processor is parked and no event is left to wake it.
    pub fn run(
        &mut self,
        semantics: &mut dyn InstructionSemantics,
        host: &mut dyn HostCallbacks,
        boundary: RunBoundary,
    ) -> RunOutcome {
        let mut steps = 0;
        loop {
            if let RunBoundary::Steps(limit) = boundary {
                if steps >= limit {
                    break;
                }
            }
            let outcome = self.step(semantics, host);
            steps += 1;
            match outcome {
                StepOutcome::Halted(stop) => {
                    return RunOutcome {
                        steps,
                        stop: Some(stop),
                    }
                }
                StepOutcome::Idle if self.events.is_empty() => break,
                StepOutcome::Retired { .. } | StepOutcome::Restarted | StepOutcome::Idle => {}
            }
        }
        RunOutcome { steps, stop: None }
    }

    /// Advances simulated time and services every event that fell due.
    fn advance_time(&mut self, host: &mut dyn HostCallbacks, ticks: u64) -> Option<StopReason> {
        self.events.advance(ticks);
        while let Some(kind) = self.events.pop_due() {
            match kind {
                EventKind::Interrupt => {
                    if self.cpu.sr_has(SR_IE) {
                        let cia = self.cpu.pc();
                        let exception = Exception::new(ExceptionKind::Interrupt);
                        if let Disposition::Halt(stop) =
                            self.signal_exception(host, exception, cia)
                        {
                            return Some(stop);
                        }
                    } else if !self.events.has_pending(EventKind::Interrupt) {
                        self.events.schedule(1, EventKind::Interrupt);
                    }
                }
            }
        }
        None
    }

    fn halt(&mut self, stop: StopReason) -> StepOutcome {
        tracing::debug!(?stop, pc = format_args!("{:#x}", self.cpu.pc()), "halted");
        self.run_state = RunState::Halted(stop);
        StepOutcome::Halted(stop)
    }

    fn latch(&mut self, fault: SimFault) -> StepOutcome {
        tracing::error!(%fault, "simulator fault");
        self.run_state = RunState::FaultLatched(fault);
        StepOutcome::Halted(StopReason::Faulted(fault))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::Instruction;
    use crate::memory::AccessWidth;
    use crate::monitor::{monitor_trap, BufferedHost};
    use crate::state::{REG_A0, REG_RA, SR_EXL, SR_IE};
    use crate::{
        Exception, ExceptionKind, RunBoundary, RunOutcome, RunState, SimConfig, SimFault,
        Simulator, StepOutcome, StopReason, TraceEvent, TraceSink, Trap,
    };

    const ENTRY: u64 = 0xFFFF_FFFF_8002_0000;
    const BRANCH: u32 = 0x1000_0003;
    const NOP: u32 = 0;

    fn program(words: &[u32]) -> Simulator {
        let mut sim = Simulator::new(SimConfig::default());
        for (i, word) in words.iter().enumerate() {
            sim.memory
                .store(ENTRY + 4 * i as u64, AccessWidth::Word, u64::from(*word))
                .expect("program store");
        }
        sim.create_inferior(ENTRY);
        sim.cpu.set_sr(0);
        sim
    }

    /// Branches forward by the low half of the word, records every executed `cia`.
    fn recorder(seen: &mut Vec<u64>) -> impl FnMut(&mut Simulator, Instruction) -> Result<u32, Trap> + '_ {
        move |sim, insn| {
            seen.push(insn.cia);
            if insn.word >> 16 == 0x1000 {
                let offset = u64::from(insn.word & 0xFFFF) << 2;
                sim.cpu.delay_slot(insn.cia + 4 + offset);
            }
            Ok(1)
        }
    }

    struct Shared(Rc<RefCell<Vec<TraceEvent>>>);

    impl TraceSink for Shared {
        fn on_event(&mut self, event: TraceEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    #[test]
    fn delay_slot_runs_once_before_the_branch_target() {
        let mut sim = program(&[BRANCH, NOP, NOP, NOP, NOP, NOP]);
        let mut host = BufferedHost::new();
        let mut seen = Vec::new();
        let mut semantics = recorder(&mut seen);
        for _ in 0..3 {
            sim.step(&mut semantics, &mut host);
        }
        drop(semantics);
        assert_eq!(seen, vec![ENTRY, ENTRY + 4, ENTRY + 16]);
        assert!(!sim.cpu.in_delay_slot());
    }

    #[test]
    fn register_zero_is_restored_after_every_step() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        let mut semantics = |sim: &mut Simulator, _insn: Instruction| -> Result<u32, Trap> {
            sim.cpu.set_gpr(0, 0xDEAD);
            Ok(1)
        };
        sim.step(&mut semantics, &mut host);
        assert_eq!(sim.cpu.gpr(0), 0);
    }

    #[test]
    fn skip_next_suppresses_exactly_one_instruction() {
        let mut sim = program(&[NOP, NOP, NOP]);
        let mut host = BufferedHost::new();
        let mut seen = Vec::new();
        sim.cpu.nullify_next_instruction();
        let mut semantics = recorder(&mut seen);
        assert_eq!(
            sim.step(&mut semantics, &mut host),
            StepOutcome::Retired { cycles: 1 }
        );
        sim.step(&mut semantics, &mut host);
        drop(semantics);
        assert_eq!(seen, vec![ENTRY + 4]);
        assert_eq!(sim.stats().instructions(), 2);
    }

    #[test]
    fn unmapped_fetch_latches_until_reset() {
        let mut sim = program(&[]);
        let mut host = BufferedHost::new();
        let mut executed = false;
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> {
            executed = true;
            Ok(1)
        };
        sim.cpu.set_pc(0xFFFF_FFFF_9000_0000);
        let fault = SimFault::UnmappedFetch {
            pc: 0xFFFF_FFFF_9000_0000,
        };
        let halted = StepOutcome::Halted(StopReason::Faulted(fault));
        assert_eq!(sim.step(&mut semantics, &mut host), halted);
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_9000_0000);
        assert_eq!(sim.step(&mut semantics, &mut host), halted);
        assert_eq!(sim.run_state(), RunState::FaultLatched(fault));

        sim.cold_reset();
        assert_eq!(sim.run_state(), RunState::Running);
        drop(semantics);
        assert!(!executed);
    }

    #[test]
    fn faults_from_semantics_latch() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> {
            Err(SimFault::Internal("bad decode").into())
        };
        assert_eq!(
            sim.step(&mut semantics, &mut host),
            StepOutcome::Halted(StopReason::Faulted(SimFault::Internal("bad decode")))
        );
    }

    #[test]
    fn synchronous_exceptions_restart_at_the_vector() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> {
            Err(ExceptionKind::SystemCall.into())
        };
        assert_eq!(sim.step(&mut semantics, &mut host), StepOutcome::Restarted);
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_8000_0180);
        assert_eq!(sim.cpu.epc(), ENTRY);
        assert_eq!(sim.stats().instructions(), 0);
    }

    #[test]
    fn enabled_interrupts_are_delivered_after_the_step() {
        let mut sim = program(&[NOP, NOP]);
        let mut host = BufferedHost::new();
        let mut seen = Vec::new();
        sim.cpu.set_sr(SR_IE);
        sim.schedule_interrupt(1);
        let mut semantics = recorder(&mut seen);
        sim.step(&mut semantics, &mut host);
        assert_eq!(sim.cpu.epc(), ENTRY + 4);
        assert!(sim.cpu.sr_has(SR_EXL));
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_8000_0180);
        assert!(sim.events().is_empty());
    }

    #[test]
    fn masked_interrupts_stay_pending() {
        let mut sim = program(&[NOP, NOP, NOP]);
        let mut host = BufferedHost::new();
        let mut seen = Vec::new();
        sim.schedule_interrupt(0);
        let mut semantics = recorder(&mut seen);
        sim.step(&mut semantics, &mut host);
        sim.step(&mut semantics, &mut host);
        assert_eq!(sim.events().len(), 1);
        assert_eq!(sim.cpu.pc(), ENTRY + 8);

        sim.cpu.set_sr(SR_IE);
        sim.step(&mut semantics, &mut host);
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_8000_0180);
    }

    #[test]
    fn parked_processor_idles_until_an_interrupt() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        let mut seen = Vec::new();
        sim.cpu.set_sr(SR_IE);
        sim.cpu.flags.halted_in = true;
        sim.schedule_interrupt(2);
        let mut semantics = recorder(&mut seen);
        assert_eq!(sim.step(&mut semantics, &mut host), StepOutcome::Idle);
        assert!(sim.cpu.flags.is_parked());
        assert_eq!(sim.step(&mut semantics, &mut host), StepOutcome::Idle);
        assert!(!sim.cpu.flags.is_parked());
        drop(semantics);
        assert!(seen.is_empty());
    }

    #[test]
    fn run_stops_when_nothing_can_wake_a_parked_processor() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        sim.cpu.flags.halted_ex = true;
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> { Ok(1) };
        assert_eq!(
            sim.run(&mut semantics, &mut host, RunBoundary::Halt),
            RunOutcome { steps: 1, stop: None }
        );
    }

    #[test]
    fn run_honours_the_step_boundary() {
        let mut sim = program(&[NOP; 8]);
        let mut host = BufferedHost::new();
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> { Ok(2) };
        let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Steps(5));
        assert_eq!(outcome, RunOutcome { steps: 5, stop: None });
        assert_eq!(sim.cpu.pc(), ENTRY + 20);
        assert_eq!(sim.events().now(), 10);
    }

    #[test]
    fn monitor_exit_stops_the_run() {
        let mut sim = program(&[]);
        let mut host = BufferedHost::new();
        // Every word decodes as a reserved instruction.
        let mut semantics = |_: &mut Simulator, insn: Instruction| -> Result<u32, Trap> {
            Err(Exception::reserved_instruction(insn.word).into())
        };
        sim.cpu.set_gpr(REG_A0, 3);
        sim.cpu.set_gpr(REG_RA, ENTRY);
        sim.cpu.set_pc(0xFFFF_FFFF_BFC0_0000 + 34 * 4);
        assert_eq!(
            sim.memory.load(0xFFFF_FFFF_BFC0_0000 + 34 * 4, AccessWidth::Word),
            Ok(u64::from(monitor_trap(34)))
        );
        let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Halt);
        assert_eq!(outcome.stop, Some(StopReason::Exited(3)));
        assert_eq!(sim.run_state(), RunState::Halted(StopReason::Exited(3)));
    }

    #[test]
    fn halt_requests_stop_and_resume_at_the_next_instruction() {
        let mut sim = program(&[NOP, NOP]);
        let mut host = BufferedHost::new();
        let mut semantics = |_: &mut Simulator, insn: Instruction| -> Result<u32, Trap> {
            if insn.cia == ENTRY {
                Err(Trap::Halt(StopReason::Exited(0)))
            } else {
                Ok(1)
            }
        };
        let outcome = sim.run(&mut semantics, &mut host, RunBoundary::Halt);
        assert_eq!(outcome, RunOutcome { steps: 1, stop: Some(StopReason::Exited(0)) });
        assert_eq!(
            sim.step(&mut semantics, &mut host),
            StepOutcome::Retired { cycles: 1 }
        );
        assert_eq!(sim.run_state(), RunState::Running);
    }

    #[test]
    fn compressed_mode_fetches_halfwords() {
        let mut sim = program(&[0x1234_5678]);
        let mut host = BufferedHost::new();
        let mut fetched = None;
        let mut semantics = |_: &mut Simulator, insn: Instruction| -> Result<u32, Trap> {
            fetched = Some((insn.word, insn.is_compressed()));
            Ok(1)
        };
        sim.cpu.set_pc(ENTRY + 3);
        sim.step(&mut semantics, &mut host);
        drop(semantics);
        assert_eq!(fetched, Some((0x5678, true)));
        assert_eq!(sim.cpu.pc(), ENTRY + 5);
    }

    #[test]
    fn trace_sink_sees_fetches_and_exceptions() {
        let mut sim = program(&[NOP]);
        let mut host = BufferedHost::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        sim.set_trace_sink(Some(Box::new(Shared(Rc::clone(&events)))));
        sim.cpu.flags.trace = true;
        let mut semantics = |_: &mut Simulator, _: Instruction| -> Result<u32, Trap> {
            Err(ExceptionKind::BreakPoint.into())
        };
        sim.step(&mut semantics, &mut host);
        assert_eq!(
            *events.borrow(),
            vec![
                TraceEvent::Fetch {
                    pc: ENTRY,
                    width: 4
                },
                TraceEvent::Exception {
                    kind: ExceptionKind::BreakPoint,
                    cia: ENTRY
                },
            ]
        );
    }
}
