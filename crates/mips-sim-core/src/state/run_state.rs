use crate::{SimFault, StopReason};

/// Per-processor run flags driving the delay-slot, skip-next and standby protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct RunFlags {
    /// A branch has scheduled a delay-slot target in `DSPC`.
    pub delay_slot: bool,
    /// The pending delay slot belongs to a linking jump.
    pub jal_delay_slot: bool,
    /// The next fetched instruction is skipped exactly once.
    pub skip_next: bool,
    /// Trace events are emitted for fetches, data accesses and exceptions.
    pub trace: bool,
    /// Processor parked by a halt instruction until the next interrupt.
    pub halted_in: bool,
    /// Processor parked by an external halt request until the next interrupt.
    pub halted_ex: bool,
    /// `delay_slot` as sampled at the top of the current step.
    pub delay_slot_snapshot: bool,
}

impl RunFlags {
    /// Returns `true` when either standby flag parks the processor.
    #[must_use]
    pub const fn is_parked(self) -> bool {
        self.halted_in || self.halted_ex
    }

    /// Releases the processor from standby.
    pub const fn unpark(&mut self) {
        self.halted_in = false;
        self.halted_ex = false;
    }
}

/// Execution-state machine for host-observable control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Ready to execute the next instruction.
    #[default]
    Running,
    /// Stopped with a reason. Calling back into the loop resumes execution.
    Halted(StopReason),
    /// An unrecoverable simulator fault is latched until the next cold reset.
    FaultLatched(SimFault),
}

impl RunState {
    /// Returns the currently latched fault, if this state is fault-latched.
    #[must_use]
    pub const fn latched_fault(self) -> Option<SimFault> {
        match self {
            Self::FaultLatched(fault) => Some(fault),
            Self::Running | Self::Halted(_) => None,
        }
    }
}
