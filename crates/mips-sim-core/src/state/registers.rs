use crate::{FpFormat, RunFlags};

/// Number of general-purpose registers.
pub const GPR_COUNT: usize = 32;
/// Number of floating-point general registers.
pub const FGR_COUNT: usize = 32;
/// Number of auxiliary 32-bit embedded registers exposed to the debugger bridge.
pub const AUX_REGISTER_COUNT: usize = 18;

/// Hard-wired zero register.
pub const REG_ZERO: u8 = 0;
/// Function return value register.
pub const REG_V0: u8 = 2;
/// First argument register.
pub const REG_A0: u8 = 4;
/// Second argument register.
pub const REG_A1: u8 = 5;
/// Third argument register.
pub const REG_A2: u8 = 6;
/// Fourth argument register.
pub const REG_A3: u8 = 7;
/// Stack pointer.
pub const REG_SP: u8 = 29;
/// Return address register.
pub const REG_RA: u8 = 31;

/// `SR` interrupt enable.
pub const SR_IE: u32 = 1 << 0;
/// `SR` exception level.
pub const SR_EXL: u32 = 1 << 1;
/// `SR` error level.
pub const SR_ERL: u32 = 1 << 2;
/// `SR` soft reset.
pub const SR_SR: u32 = 1 << 20;
/// `SR` TLB shutdown.
pub const SR_TS: u32 = 1 << 21;
/// `SR` bootstrap exception vectors.
pub const SR_BEV: u32 = 1 << 22;
/// `SR` 64-bit floating-point register mode.
pub const SR_FR: u32 = 1 << 26;
/// `SR` reduced power.
pub const SR_RP: u32 = 1 << 27;
/// `SR` coprocessor 0 usable.
pub const SR_CU0: u32 = 1 << 28;
/// `SR` coprocessor 1 usable.
pub const SR_CU1: u32 = 1 << 29;
/// `SR` coprocessor 2 usable.
pub const SR_CU2: u32 = 1 << 30;
/// `SR` coprocessor 3 usable.
pub const SR_CU3: u32 = 1 << 31;

/// `Cause` branch-delay bit.
pub const CAUSE_BD: u32 = 1 << 31;
/// `Cause` exception-code field mask, before shifting.
pub const CAUSE_EXCCODE_MASK: u32 = 0x1F;
/// `Cause` exception-code field shift.
pub const CAUSE_EXCCODE_SHIFT: u32 = 2;

/// `Debug` breakpoint exception raised.
pub const DEBUG_DBP: u32 = 1 << 1;
/// `Debug` processor is in debug mode.
pub const DEBUG_DM: u32 = 1 << 30;
/// `Debug` debug exception taken in a delay slot.
pub const DEBUG_DBD: u32 = 1 << 31;

/// Complete architectural state of one simulated processor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CpuState {
    gpr: [u64; GPR_COUNT],
    gpr_upper: [u64; GPR_COUNT],
    lo: u64,
    hi: u64,
    lo1: u64,
    hi1: u64,
    sa: u64,
    pc: u64,
    dspc: u64,
    fgr: [u64; FGR_COUNT],
    fpr_state: [FpFormat; FGR_COUNT],
    fcr0: u32,
    fcr31: u32,
    sr: u32,
    cause: u32,
    epc: u64,
    bad_vaddr: u64,
    config: u32,
    debug: u32,
    depc: u64,
    llbit: bool,
    aux: [u32; AUX_REGISTER_COUNT],
    /// Run-state flags for the delay-slot, skip-next and standby protocols.
    pub flags: RunFlags,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            gpr: [0; GPR_COUNT],
            gpr_upper: [0; GPR_COUNT],
            lo: 0,
            hi: 0,
            lo1: 0,
            hi1: 0,
            sa: 0,
            pc: 0,
            dspc: 0,
            fgr: [0; FGR_COUNT],
            fpr_state: [FpFormat::Uninterpreted; FGR_COUNT],
            fcr0: 0,
            fcr31: 0,
            sr: 0,
            cause: 0,
            epc: 0,
            bad_vaddr: 0,
            config: 0,
            debug: 0,
            depc: 0,
            llbit: false,
            aux: [0; AUX_REGISTER_COUNT],
            flags: RunFlags::default(),
        }
    }
}

impl CpuState {
    /// Reads a general-purpose register. The index is taken modulo 32.
    #[must_use]
    pub const fn gpr(&self, reg: u8) -> u64 {
        self.gpr[(reg & 0x1F) as usize]
    }

    /// Writes a general-purpose register. The index is taken modulo 32.
    ///
    /// Writes to `$zero` land in the register file and are discarded by the
    /// execution loop after the instruction retires.
    pub const fn set_gpr(&mut self, reg: u8, value: u64) {
        self.gpr[(reg & 0x1F) as usize] = value;
    }

    /// Reads the upper 64-bit half of a 128-bit general-purpose register.
    #[must_use]
    pub const fn gpr_upper(&self, reg: u8) -> u64 {
        self.gpr_upper[(reg & 0x1F) as usize]
    }

    /// Writes the upper 64-bit half of a 128-bit general-purpose register.
    pub const fn set_gpr_upper(&mut self, reg: u8, value: u64) {
        self.gpr_upper[(reg & 0x1F) as usize] = value;
    }

    /// Reads `LO`.
    #[must_use]
    pub const fn lo(&self) -> u64 {
        self.lo
    }

    /// Writes `LO`.
    pub const fn set_lo(&mut self, value: u64) {
        self.lo = value;
    }

    /// Reads `HI`.
    #[must_use]
    pub const fn hi(&self) -> u64 {
        self.hi
    }

    /// Writes `HI`.
    pub const fn set_hi(&mut self, value: u64) {
        self.hi = value;
    }

    /// Reads the pipeline-1 `LO1` register.
    #[must_use]
    pub const fn lo1(&self) -> u64 {
        self.lo1
    }

    /// Writes the pipeline-1 `LO1` register.
    pub const fn set_lo1(&mut self, value: u64) {
        self.lo1 = value;
    }

    /// Reads the pipeline-1 `HI1` register.
    #[must_use]
    pub const fn hi1(&self) -> u64 {
        self.hi1
    }

    /// Writes the pipeline-1 `HI1` register.
    pub const fn set_hi1(&mut self, value: u64) {
        self.hi1 = value;
    }

    /// Reads the funnel shift-amount register.
    #[must_use]
    pub const fn sa(&self) -> u64 {
        self.sa
    }

    /// Writes the funnel shift-amount register.
    pub const fn set_sa(&mut self, value: u64) {
        self.sa = value;
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    /// Reads the pending delay-slot target.
    #[must_use]
    pub const fn dspc(&self) -> u64 {
        self.dspc
    }

    /// Reads a raw floating-point general register.
    #[must_use]
    pub const fn fgr(&self, reg: u8) -> u64 {
        self.fgr[(reg & 0x1F) as usize]
    }

    /// Writes a raw floating-point general register without touching its format tag.
    pub const fn set_fgr(&mut self, reg: u8, value: u64) {
        self.fgr[(reg & 0x1F) as usize] = value;
    }

    /// Reads the format tag of a floating-point register.
    #[must_use]
    pub const fn fpr_state(&self, reg: u8) -> FpFormat {
        self.fpr_state[(reg & 0x1F) as usize]
    }

    /// Writes the format tag of a floating-point register.
    pub const fn set_fpr_state(&mut self, reg: u8, format: FpFormat) {
        self.fpr_state[(reg & 0x1F) as usize] = format;
    }

    /// Marks every floating-point register as uninterpreted.
    pub fn reset_fpr_states(&mut self) {
        self.fpr_state = [FpFormat::Uninterpreted; FGR_COUNT];
    }

    /// Reads the FPU implementation register (`FCR0`).
    #[must_use]
    pub const fn fcr0(&self) -> u32 {
        self.fcr0
    }

    /// Writes the FPU implementation register (`FCR0`).
    pub const fn set_fcr0(&mut self, value: u32) {
        self.fcr0 = value;
    }

    /// Reads the FPU control/status register (`FCR31`).
    #[must_use]
    pub const fn fcr31(&self) -> u32 {
        self.fcr31
    }

    /// Writes the FPU control/status register (`FCR31`).
    pub const fn set_fcr31(&mut self, value: u32) {
        self.fcr31 = value;
    }

    /// Reads the COP0 status register.
    #[must_use]
    pub const fn sr(&self) -> u32 {
        self.sr
    }

    /// Writes the COP0 status register.
    pub const fn set_sr(&mut self, value: u32) {
        self.sr = value;
    }

    /// Returns `true` when every bit of `mask` is set in `SR`.
    #[must_use]
    pub const fn sr_has(&self, mask: u32) -> bool {
        self.sr & mask == mask
    }

    /// Reads the COP0 cause register.
    #[must_use]
    pub const fn cause(&self) -> u32 {
        self.cause
    }

    /// Writes the COP0 cause register.
    pub const fn set_cause(&mut self, value: u32) {
        self.cause = value;
    }

    /// Returns the exception kind currently encoded in `Cause.ExcCode`.
    #[must_use]
    pub const fn cause_code(&self) -> u8 {
        ((self.cause >> CAUSE_EXCCODE_SHIFT) & CAUSE_EXCCODE_MASK) as u8
    }

    /// Reads the exception program counter.
    #[must_use]
    pub const fn epc(&self) -> u64 {
        self.epc
    }

    /// Writes the exception program counter.
    pub const fn set_epc(&mut self, value: u64) {
        self.epc = value;
    }

    /// Reads the bad virtual address register.
    #[must_use]
    pub const fn bad_vaddr(&self) -> u64 {
        self.bad_vaddr
    }

    /// Writes the bad virtual address register.
    pub const fn set_bad_vaddr(&mut self, value: u64) {
        self.bad_vaddr = value;
    }

    /// Reads the COP0 configuration register.
    #[must_use]
    pub const fn config(&self) -> u32 {
        self.config
    }

    /// Writes the COP0 configuration register.
    pub const fn set_config(&mut self, value: u32) {
        self.config = value;
    }

    /// Reads the debug control register.
    #[must_use]
    pub const fn debug(&self) -> u32 {
        self.debug
    }

    /// Writes the debug control register.
    pub const fn set_debug(&mut self, value: u32) {
        self.debug = value;
    }

    /// Reads the debug exception program counter.
    #[must_use]
    pub const fn depc(&self) -> u64 {
        self.depc
    }

    /// Writes the debug exception program counter.
    pub const fn set_depc(&mut self, value: u64) {
        self.depc = value;
    }

    /// Reads the load-linked flag.
    #[must_use]
    pub const fn llbit(&self) -> bool {
        self.llbit
    }

    /// Writes the load-linked flag.
    pub const fn set_llbit(&mut self, value: bool) {
        self.llbit = value;
    }

    /// Reads an auxiliary embedded register, or `None` when `index` is out of range.
    #[must_use]
    pub const fn aux(&self, index: usize) -> Option<u32> {
        if index < AUX_REGISTER_COUNT {
            Some(self.aux[index])
        } else {
            None
        }
    }

    /// Writes an auxiliary embedded register. Out-of-range indices are ignored.
    pub const fn set_aux(&mut self, index: usize, value: u32) {
        if index < AUX_REGISTER_COUNT {
            self.aux[index] = value;
        }
    }

    /// Schedules a branch: the next instruction runs in the delay slot, then `target` commits.
    pub fn delay_slot(&mut self, target: u64) {
        if self.flags.delay_slot {
            tracing::warn!(pc = self.pc, "branch in delay slot");
        }
        self.flags.delay_slot = true;
        self.dspc = target;
    }

    /// Schedules a linking jump with a delay slot.
    pub fn jal_delay_slot(&mut self, target: u64) {
        self.delay_slot(target);
        self.flags.jal_delay_slot = true;
    }

    /// Suppresses the next instruction, as a branch-likely that was not taken does.
    pub const fn nullify_next_instruction(&mut self) {
        self.flags.delay_slot = false;
        self.flags.skip_next = true;
    }

    /// Abandons any pending delay slot, including the current step's snapshot.
    pub const fn cancel_delay_slot(&mut self) {
        self.flags.delay_slot_snapshot = false;
        self.flags.delay_slot = false;
        self.flags.jal_delay_slot = false;
    }

    /// Returns `true` while a branch delay slot is pending.
    #[must_use]
    pub const fn in_delay_slot(&self) -> bool {
        self.flags.delay_slot
    }

    /// Returns `true` while a linking-jump delay slot is pending.
    #[must_use]
    pub const fn in_jal_delay_slot(&self) -> bool {
        self.flags.jal_delay_slot
    }
}
