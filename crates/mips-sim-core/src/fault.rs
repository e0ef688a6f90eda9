use thiserror::Error;

use crate::{FpFormat, StopReason};

/// Exception classes used for statistics aggregation and dispatch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ExceptionClass {
    /// Asynchronous interrupt or reset delivered from the event scheduler.
    Asynchronous,
    /// TLB, address-error and bus-error faults.
    Memory,
    /// Reserved-instruction and coprocessor-unusable faults.
    Instruction,
    /// Integer overflow and floating-point exceptions.
    Arithmetic,
    /// Breakpoint, syscall and trap instructions.
    Synchronous,
    /// Watchpoint hits.
    Watch,
    /// Debug-mode breakpoint entry.
    Debug,
}

/// Architectural exception kinds with their stable `Cause.ExcCode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ExceptionKind {
    /// External or timer interrupt.
    #[error("interrupt")]
    Interrupt = 0,
    /// Store to a TLB page marked clean.
    #[error("tlb modification")]
    TlbModification = 1,
    /// TLB miss on load or fetch.
    #[error("tlb load miss")]
    TlbLoad = 2,
    /// TLB miss on store.
    #[error("tlb store miss")]
    TlbStore = 3,
    /// Address error on load or fetch.
    #[error("address error on load")]
    AddressLoad = 4,
    /// Address error on store.
    #[error("address error on store")]
    AddressStore = 5,
    /// Bus error on instruction fetch.
    #[error("instruction fetch bus error")]
    InstructionFetch = 6,
    /// Bus error on data reference.
    #[error("data reference bus error")]
    DataReference = 7,
    /// `SYSCALL` instruction.
    #[error("system call")]
    SystemCall = 8,
    /// `BREAK` instruction.
    #[error("breakpoint")]
    BreakPoint = 9,
    /// Reserved or unimplemented instruction encoding.
    #[error("reserved instruction")]
    ReservedInstruction = 10,
    /// Coprocessor access while its `SR.CUn` bit is clear.
    #[error("coprocessor unusable")]
    CoProcessorUnusable = 11,
    /// Signed integer overflow.
    #[error("integer overflow")]
    IntegerOverflow = 12,
    /// Conditional trap instruction.
    #[error("trap")]
    Trap = 13,
    /// Floating-point exception.
    #[error("floating-point exception")]
    FloatingPoint = 15,
    /// Watchpoint reference.
    #[error("watch")]
    Watch = 23,
    /// Soft reset or non-maskable interrupt.
    #[error("nmi/reset")]
    NmiReset = 31,
    /// EJTAG-style debug breakpoint. Never written to `Cause`.
    #[error("debug breakpoint")]
    DebugBreakPoint = 0x40,
}

impl ExceptionKind {
    /// Converts an exception kind to the value stored in `Cause.ExcCode`.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a `Cause.ExcCode` value back into an exception kind.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Interrupt),
            1 => Some(Self::TlbModification),
            2 => Some(Self::TlbLoad),
            3 => Some(Self::TlbStore),
            4 => Some(Self::AddressLoad),
            5 => Some(Self::AddressStore),
            6 => Some(Self::InstructionFetch),
            7 => Some(Self::DataReference),
            8 => Some(Self::SystemCall),
            9 => Some(Self::BreakPoint),
            10 => Some(Self::ReservedInstruction),
            11 => Some(Self::CoProcessorUnusable),
            12 => Some(Self::IntegerOverflow),
            13 => Some(Self::Trap),
            15 => Some(Self::FloatingPoint),
            23 => Some(Self::Watch),
            31 => Some(Self::NmiReset),
            _ => None,
        }
    }

    /// Returns the dispatch class for this exception kind.
    #[must_use]
    pub const fn class(self) -> ExceptionClass {
        match self {
            Self::Interrupt | Self::NmiReset => ExceptionClass::Asynchronous,
            Self::TlbModification
            | Self::TlbLoad
            | Self::TlbStore
            | Self::AddressLoad
            | Self::AddressStore
            | Self::InstructionFetch
            | Self::DataReference => ExceptionClass::Memory,
            Self::ReservedInstruction | Self::CoProcessorUnusable => ExceptionClass::Instruction,
            Self::IntegerOverflow | Self::FloatingPoint => ExceptionClass::Arithmetic,
            Self::SystemCall | Self::BreakPoint | Self::Trap => ExceptionClass::Synchronous,
            Self::Watch => ExceptionClass::Watch,
            Self::DebugBreakPoint => ExceptionClass::Debug,
        }
    }

    /// Host signal reported when this kind halts the simulation, if it halts at all.
    #[must_use]
    pub const fn halt_signal(self) -> Option<Signal> {
        match self.class() {
            ExceptionClass::Asynchronous | ExceptionClass::Synchronous => None,
            ExceptionClass::Memory => Some(Signal::Bus),
            ExceptionClass::Instruction => Some(Signal::Illegal),
            ExceptionClass::Arithmetic => Some(Signal::FloatingPoint),
            ExceptionClass::Watch => Some(Signal::Trace),
            ExceptionClass::Debug => Some(Signal::Abort),
        }
    }

    /// Kinds whose halt restores `PC` to the saved `EPC` so the driver sees the faulting instruction.
    #[must_use]
    pub const fn restores_epc(self) -> bool {
        !matches!(
            self.class(),
            ExceptionClass::Asynchronous | ExceptionClass::Arithmetic | ExceptionClass::Synchronous
        )
    }
}

/// Stop signal classification reported to the embedding driver.
///
/// Values follow the debugger target-signal numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Signal {
    /// Host requested the simulation to stop.
    Interrupt = 2,
    /// Illegal instruction.
    Illegal = 4,
    /// Trace or watchpoint trap.
    Trace = 5,
    /// Unclassified abort.
    Abort = 6,
    /// Floating-point or arithmetic exception.
    FloatingPoint = 8,
    /// Bus or address error.
    Bus = 10,
}

impl Signal {
    /// Returns the target signal number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Architectural exception request raised by instruction semantics or helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("{kind}")]
pub struct Exception {
    /// Exception kind.
    pub kind: ExceptionKind,
    /// Raw instruction word for reserved-instruction style exceptions.
    pub instruction: Option<u32>,
    /// Faulting virtual address for address and bus errors.
    pub bad_vaddr: Option<u64>,
}

impl Exception {
    /// Creates an exception with no payload.
    #[must_use]
    pub const fn new(kind: ExceptionKind) -> Self {
        Self {
            kind,
            instruction: None,
            bad_vaddr: None,
        }
    }

    /// Reserved-instruction exception carrying the offending instruction word.
    #[must_use]
    pub const fn reserved_instruction(instruction: u32) -> Self {
        Self {
            kind: ExceptionKind::ReservedInstruction,
            instruction: Some(instruction),
            bad_vaddr: None,
        }
    }

    /// Coprocessor-unusable exception carrying the offending instruction word.
    #[must_use]
    pub const fn coprocessor_unusable(instruction: u32) -> Self {
        Self {
            kind: ExceptionKind::CoProcessorUnusable,
            instruction: Some(instruction),
            bad_vaddr: None,
        }
    }

    /// Address error raised by a load or fetch at `vaddr`.
    #[must_use]
    pub const fn address_load(vaddr: u64) -> Self {
        Self::with_address(ExceptionKind::AddressLoad, vaddr)
    }

    /// Address error raised by a store at `vaddr`.
    #[must_use]
    pub const fn address_store(vaddr: u64) -> Self {
        Self::with_address(ExceptionKind::AddressStore, vaddr)
    }

    /// Data bus error raised by an access to unbacked memory at `vaddr`.
    #[must_use]
    pub const fn bus_error(vaddr: u64) -> Self {
        Self::with_address(ExceptionKind::DataReference, vaddr)
    }

    const fn with_address(kind: ExceptionKind, vaddr: u64) -> Self {
        Self {
            kind,
            instruction: None,
            bad_vaddr: Some(vaddr),
        }
    }
}

impl From<ExceptionKind> for Exception {
    fn from(kind: ExceptionKind) -> Self {
        Self::new(kind)
    }
}

/// Unrecoverable simulator faults. Once raised the processor stays latched until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SimFault {
    /// The program counter does not translate to backed memory.
    #[error("cannot translate address for PC = {pc:#018x}")]
    UnmappedFetch {
        /// Untranslatable program counter.
        pc: u64,
    },
    /// A floating-point helper was asked to operate on a format it does not support.
    #[error("unsupported floating-point format {format:?} for {operation}")]
    UnsupportedFormat {
        /// Operation name.
        operation: &'static str,
        /// Rejected format.
        format: FpFormat,
    },
    /// The vector-unit micro-engine never became idle.
    #[error("vector unit still busy after {spins} issue cycles")]
    VectorUnitStalled {
        /// Number of issue cycles polled before giving up.
        spins: u32,
    },
    /// Internal consistency violation.
    #[error("simulator error \"{0}\"")]
    Internal(&'static str),
}

/// Non-local exit raised while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Trap {
    /// Architectural exception routed through the exception dispatcher.
    #[error(transparent)]
    Exception(#[from] Exception),
    /// Fatal simulator fault.
    #[error(transparent)]
    Fault(#[from] SimFault),
    /// Semantics requested an immediate halt.
    #[error("halt requested: {0:?}")]
    Halt(StopReason),
}

impl From<ExceptionKind> for Trap {
    fn from(kind: ExceptionKind) -> Self {
        Self::Exception(Exception::new(kind))
    }
}
