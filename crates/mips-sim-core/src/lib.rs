//! Core of a MIPS-family instruction-set simulator.
//!
//! The crate models the architectural state of one processor and drives it through a
//! fetch/execute loop. Per-opcode semantics are supplied by the embedder through
//! [`InstructionSemantics`]; everything around them lives here: the delay-slot-aware
//! exception dispatcher, the format-tagged floating-point engine, coprocessor 0 and 2
//! dispatch, the debugger register/memory bridge and the firmware monitor shim.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]

/// Memory model, address translation and sized access helpers.
pub mod memory;
pub use memory::{AccessWidth, Memory};

/// Architectural register state, run flags and the register descriptor table.
pub mod state;
pub use state::{
    CpuState, RegisterClass, RegisterDescriptor, RegisterTable, RunFlags, RunState, VuSpecial,
};

/// Exception, signal and fault taxonomy.
pub mod fault;
pub use fault::{Exception, ExceptionClass, ExceptionKind, SimFault, Signal, Trap};

/// Public host-facing API: configuration, run outcomes and the simulation context.
pub mod api;
pub use api::{
    CpuVariant, Endian, FloatingPoint, Mips16FrameConfig, RunBoundary, RunOutcome, SimConfig,
    Simulator, StepOutcome, StopReason, WordSize,
};

/// Floating-point register tags, arithmetic and conversion.
pub mod fpu;
pub use fpu::{FpFormat, RoundingMode};

/// Coprocessor 0 and coprocessor 2 decode and dispatch.
pub mod cop;
pub use cop::{Cop0Instruction, Cop2Instruction};

/// Vector-unit register file and micro-engine seam.
pub mod vu;
pub use vu::{LatencyMicroEngine, MicroEngine, VectorUnit, VuRegisters};

/// Delay-slot-aware exception dispatch.
pub mod exception;
pub use exception::Disposition;

/// Fetch/execute loop.
pub mod engine;
pub use engine::{Instruction, InstructionSemantics};

/// Scheduled event queue.
pub mod events;
pub use events::{EventKind, EventQueue};

/// Firmware monitor traps and host I/O callbacks.
pub mod monitor;
pub use monitor::{BufferedHost, HostCallbacks};

/// Debugger register and memory bridge.
pub mod bridge;
pub use bridge::BridgeError;

/// Execution statistics.
pub mod stats;
pub use stats::SimStats;

/// Trace events and sinks.
pub mod trace;
pub use trace::{DinTraceWriter, TraceEvent, TraceSink};

#[cfg(test)]
use proptest as _;
