//! Public host-facing API: configuration, run outcomes and the simulation context.
//!
//! [`Simulator`] owns every piece of per-processor state. The execution loop, the
//! exception dispatcher, the monitor shim and the debugger bridge each extend it with
//! their own `impl` blocks.

use std::fmt;

use crate::events::{EventKind, EventQueue};
use crate::memory::{sign_extend_32, AccessWidth, Memory, DEFAULT_MEM_SIZE, MONITOR_BASE};
use crate::state::{RegisterTable, SR_BEV, SR_ERL, SR_FR, SR_RP, SR_SR, SR_TS};
use crate::{
    fpu, CpuState, Exception, FpFormat, LatencyMicroEngine, MicroEngine, RoundingMode, RunFlags,
    RunState, Signal, SimFault, SimStats, TraceEvent, TraceSink, Trap, VectorUnit,
};

/// Target general-purpose register width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum WordSize {
    /// 32-bit registers and addresses.
    Bits32,
    /// 64-bit registers and addresses.
    #[default]
    Bits64,
}

impl WordSize {
    /// Register width in bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits32 => 32,
            Self::Bits64 => 64,
        }
    }
}

/// Floating-point hardware fitted to the simulated processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FloatingPoint {
    /// No FPU. Floating-point registers are absent from the register table.
    None,
    /// FPU with 32-bit FGRs; 64-bit values use even/odd register pairs.
    Hard32,
    /// FPU with 64-bit FGRs.
    #[default]
    Hard64,
}

impl FloatingPoint {
    /// Width of one FGR in bits, or zero without an FPU.
    #[must_use]
    pub const fn width_bits(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Hard32 => 32,
            Self::Hard64 => 64,
        }
    }
}

/// Target byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endian {
    /// Most significant byte first.
    #[default]
    Big,
    /// Least significant byte first.
    Little,
}

/// Processor variant selecting COP0 layout, exception entry and optional units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CpuVariant {
    /// Generic R4000-style MIPS.
    #[default]
    Generic,
    /// TX3900-style core with R3000 exception entry and a debug unit.
    R3900,
    /// R5900 core with 128-bit GPRs and a vector unit on COP2.
    R5900,
}

/// Frame constants for compressed-mode procedure entry/exit emulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Mips16FrameConfig {
    /// Bytes reserved on the stack by an entry sequence.
    pub frame_size: u64,
    /// First argument register saved by an entry sequence.
    pub first_arg_reg: u8,
    /// First callee-saved register covered by the `sregs` count.
    pub first_saved_reg: u8,
    /// `aregs` encoding that returns one floating-point result.
    pub single_fp_result: u8,
    /// `aregs` encoding that returns a two-register floating-point result.
    pub double_fp_result: u8,
}

impl Default for Mips16FrameConfig {
    fn default() -> Self {
        Self {
            frame_size: 32,
            first_arg_reg: 4,
            first_saved_reg: 16,
            single_fp_result: 5,
            double_fp_result: 6,
        }
    }
}

/// Top-level immutable configuration for a simulator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimConfig {
    /// Target register width.
    pub word_size: WordSize,
    /// Floating-point hardware.
    pub floating_point: FloatingPoint,
    /// Target byte order.
    pub endian: Endian,
    /// Processor variant.
    pub variant: CpuVariant,
    /// Bytes of RAM attached at physical address zero.
    pub mem_size: usize,
    /// Installs the firmware monitor vectors into the ROM at construction.
    pub monitor: bool,
    /// Starts with the trace flag set.
    pub trace_enabled: bool,
    /// Issue cycles a coprocessor-2 wait may poll before the unit is declared stalled.
    pub vu_spin_limit: u32,
    /// Compressed entry/exit frame constants.
    pub mips16: Mips16FrameConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            word_size: WordSize::default(),
            floating_point: FloatingPoint::default(),
            endian: Endian::default(),
            variant: CpuVariant::default(),
            mem_size: DEFAULT_MEM_SIZE,
            monitor: true,
            trace_enabled: false,
            vu_spin_limit: 1_000_000,
            mips16: Mips16FrameConfig::default(),
        }
    }
}

impl SimConfig {
    /// Returns `true` when COP2 is backed by a vector unit.
    #[must_use]
    pub const fn has_vector_unit(&self) -> bool {
        matches!(self.variant, CpuVariant::R5900)
    }

    /// Returns `true` for the R3900 variant.
    #[must_use]
    pub const fn is_r3900(&self) -> bool {
        matches!(self.variant, CpuVariant::R3900)
    }

    /// Widens a 32-bit address the way the target's address registers hold it.
    ///
    /// 64-bit targets sign-extend; 32-bit targets keep the low word.
    #[must_use]
    pub const fn canonical_address(&self, addr: u32) -> u64 {
        match self.word_size {
            WordSize::Bits32 => addr as u64,
            WordSize::Bits64 => sign_extend_32(addr as u64),
        }
    }
}

/// Why the execution loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The target program exited with a status.
    Exited(u32),
    /// An exception halted the target with a signal.
    Signalled(Signal),
    /// A simulator fault is latched.
    Faulted(SimFault),
}

/// Outcome of one execution-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction retired.
    Retired {
        /// Cycles charged by the instruction semantics.
        cycles: u32,
    },
    /// An exception was delivered and execution resumes at the new `PC`.
    Restarted,
    /// The loop halted.
    Halted(StopReason),
    /// The processor is parked in standby. Only the event queue advanced.
    Idle,
}

/// Run loop boundary modes for batched execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Stop after this many steps or at the first halt, whichever comes first.
    Steps(u64),
    /// Run until a halt.
    Halt,
}

/// Aggregated outcome from running multiple steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Number of steps taken during this call.
    pub steps: u64,
    /// Stop reason, or `None` when the step boundary was reached first.
    pub stop: Option<StopReason>,
}

/// Simulation context for one processor.
pub struct Simulator {
    pub(crate) config: SimConfig,
    pub(crate) registers: RegisterTable,
    /// Architectural register state.
    pub cpu: CpuState,
    /// Target memory.
    pub memory: Memory,
    pub(crate) events: EventQueue,
    pub(crate) vector_unit: Option<VectorUnit>,
    pub(crate) run_state: RunState,
    pub(crate) stats: SimStats,
    pub(crate) trace_sink: Option<Box<dyn TraceSink>>,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("cpu", &self.cpu)
            .field("run_state", &self.run_state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Simulator {
    /// Creates a simulator. An R5900 gets a [`LatencyMicroEngine`] behind its vector unit.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::with_micro_engine(config, Box::new(LatencyMicroEngine::default()))
    }

    /// Creates a simulator whose vector unit, if the variant has one, runs on `engine`.
    #[must_use]
    pub fn with_micro_engine(config: SimConfig, engine: Box<dyn MicroEngine>) -> Self {
        let vector_unit = config
            .has_vector_unit()
            .then(|| VectorUnit::new(engine));
        let mut sim = Self {
            registers: RegisterTable::new(&config),
            cpu: CpuState::default(),
            memory: Memory::new(config.mem_size, config.endian),
            events: EventQueue::default(),
            vector_unit,
            run_state: RunState::Running,
            stats: SimStats::default(),
            trace_sink: None,
            config,
        };
        if sim.config.monitor {
            sim.install_monitor_vectors();
        }
        sim.cold_reset();
        sim
    }

    /// Immutable configuration.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Register descriptor table built from the configuration.
    #[must_use]
    pub const fn registers(&self) -> &RegisterTable {
        &self.registers
    }

    /// Current execution state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Execution statistics.
    #[must_use]
    pub const fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Pending scheduled events.
    #[must_use]
    pub const fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Vector unit, when the variant has one.
    #[must_use]
    pub const fn vector_unit(&self) -> Option<&VectorUnit> {
        self.vector_unit.as_ref()
    }

    /// Mutable vector unit, when the variant has one.
    pub fn vector_unit_mut(&mut self) -> Option<&mut VectorUnit> {
        self.vector_unit.as_mut()
    }

    /// Installs or removes the trace sink.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.trace_sink = sink;
    }

    /// Queues an interrupt request `delay` ticks from now.
    pub fn schedule_interrupt(&mut self, delay: u64) {
        self.events.schedule(delay, EventKind::Interrupt);
    }

    /// Hardware cold reset.
    ///
    /// Execution restarts at the reset vector in kernel mode with bootstrap vectors,
    /// every FPR tag returns to uninterpreted and any latched fault is cleared.
    /// General registers and memory are preserved.
    pub fn cold_reset(&mut self) {
        let pc = self.config.canonical_address(MONITOR_BASE as u32);
        self.cpu.set_pc(pc);

        let mut sr = self.cpu.sr() & !(SR_SR | SR_TS | SR_RP);
        sr |= SR_ERL | SR_BEV;
        if self.config.word_size == WordSize::Bits64
            && self.config.floating_point != FloatingPoint::None
        {
            sr |= SR_FR;
        }
        self.cpu.set_sr(sr);
        self.cpu.reset_fpr_states();
        self.cpu.flags = RunFlags {
            trace: self.config.trace_enabled,
            ..RunFlags::default()
        };

        self.events.clear();
        self.run_state = RunState::Running;
    }

    /// Prepares to run a loaded program: cold reset, then `PC` at `entry`.
    pub fn create_inferior(&mut self, entry: u64) {
        self.cold_reset();
        let entry = match self.config.word_size {
            WordSize::Bits32 => entry & 0xFFFF_FFFF,
            WordSize::Bits64 => entry,
        };
        self.cpu.set_pc(entry);
    }

    pub(crate) fn emit_trace(&mut self, event: TraceEvent) {
        if !self.cpu.flags.trace {
            return;
        }
        if let Some(sink) = self.trace_sink.as_mut() {
            sink.on_event(event);
        }
    }

    /// Checked data load: alignment, translation, statistics and trace.
    ///
    /// # Errors
    ///
    /// Returns an address error or a data bus error.
    pub fn load(&mut self, vaddr: u64, width: AccessWidth) -> Result<u64, Exception> {
        let value = self.memory.load(vaddr, width)?;
        self.stats.record_load();
        self.emit_trace(TraceEvent::Read {
            addr: vaddr,
            width: width.bytes() as u8,
        });
        Ok(value)
    }

    /// Checked data store: alignment, translation, statistics and trace.
    ///
    /// # Errors
    ///
    /// Returns an address error or a data bus error.
    pub fn store(&mut self, vaddr: u64, width: AccessWidth, value: u64) -> Result<(), Exception> {
        self.memory.store(vaddr, width, value)?;
        self.stats.record_store();
        self.emit_trace(TraceEvent::Write {
            addr: vaddr,
            width: width.bytes() as u8,
        });
        Ok(())
    }

    /// Reads a floating-point register through its format tag.
    ///
    /// # Errors
    ///
    /// See [`fpu::value_fpr`].
    pub fn value_fpr(&mut self, fpr: u8, fmt: FpFormat) -> Result<u64, Trap> {
        fpu::value_fpr(&mut self.cpu, self.config.floating_point, fpr, fmt)
    }

    /// Writes a floating-point register and its format tag.
    ///
    /// # Errors
    ///
    /// See [`fpu::store_fpr`].
    pub fn store_fpr(&mut self, fpr: u8, fmt: FpFormat, value: u64) -> Result<(), Trap> {
        fpu::store_fpr(&mut self.cpu, self.config.floating_point, fpr, fmt, value)
    }

    /// Rounding mode selected by the `FCR31.RM` field.
    #[must_use]
    pub const fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::from_fcr31(self.cpu.fcr31())
    }
}

#[cfg(test)]
mod tests {
    use super::{CpuVariant, FloatingPoint, SimConfig, Simulator, WordSize};
    use crate::memory::AccessWidth;
    use crate::state::{SR_BEV, SR_ERL, SR_FR, SR_RP};
    use crate::{FpFormat, RoundingMode, RunState, SimFault};

    #[test]
    fn default_config_is_a_64_bit_big_endian_generic_core() {
        let config = SimConfig::default();
        assert_eq!(config.word_size, WordSize::Bits64);
        assert_eq!(config.mem_size, 2 << 20);
        assert!(config.monitor);
        assert!(!config.has_vector_unit());
    }

    #[test]
    fn cold_reset_enters_bootstrap_kernel_mode() {
        let mut sim = Simulator::new(SimConfig::default());
        assert_eq!(sim.cpu.pc(), 0xFFFF_FFFF_BFC0_0000);
        assert!(sim.cpu.sr_has(SR_ERL | SR_BEV | SR_FR));

        sim.cpu.set_sr(SR_RP);
        sim.cpu.set_fpr_state(3, FpFormat::Double);
        sim.run_state = RunState::FaultLatched(SimFault::Internal("test"));
        sim.cold_reset();
        assert!(!sim.cpu.sr_has(SR_RP));
        assert_eq!(sim.cpu.fpr_state(3), FpFormat::Uninterpreted);
        assert_eq!(sim.run_state(), RunState::Running);
    }

    #[test]
    fn thirty_two_bit_targets_keep_low_word_pc() {
        let sim = Simulator::new(SimConfig {
            word_size: WordSize::Bits32,
            floating_point: FloatingPoint::Hard32,
            ..SimConfig::default()
        });
        assert_eq!(sim.cpu.pc(), 0xBFC0_0000);
        assert!(!sim.cpu.sr_has(SR_FR));
    }

    #[test]
    fn create_inferior_sets_entry_point() {
        let mut sim = Simulator::new(SimConfig::default());
        sim.create_inferior(0x8002_0000);
        assert_eq!(sim.cpu.pc(), 0x8002_0000);
    }

    #[test]
    fn rounding_mode_follows_fcr31() {
        let mut sim = Simulator::new(SimConfig::default());
        assert_eq!(sim.rounding_mode(), RoundingMode::Nearest);
        sim.cpu.set_fcr31(0x0080_0001);
        assert_eq!(sim.rounding_mode(), RoundingMode::ToZero);
    }

    #[test]
    fn checked_accesses_update_statistics() {
        let mut sim = Simulator::new(SimConfig::default());
        sim.store(0x8000_1000, AccessWidth::Word, 7).expect("store");
        assert_eq!(sim.load(0x8000_1000, AccessWidth::Word), Ok(7));
        assert!(sim.load(0x8000_1001, AccessWidth::Word).is_err());
        assert_eq!(sim.stats().loads(), 1);
        assert_eq!(sim.stats().stores(), 1);
    }

    #[test]
    fn only_the_r5900_has_a_vector_unit() {
        let sim = Simulator::new(SimConfig {
            variant: CpuVariant::R5900,
            ..SimConfig::default()
        });
        assert!(sim.vector_unit().is_some());
        assert!(Simulator::new(SimConfig::default()).vector_unit().is_none());
    }
}
