//! Trace events and the classic "din" text trace writer.

use std::io;

use crate::ExceptionKind;

/// Events emitted while the trace flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// Instruction fetch.
    Fetch {
        /// Fetch address.
        pc: u64,
        /// Instruction width in bytes.
        width: u8,
    },
    /// Checked data read.
    Read {
        /// Virtual address.
        addr: u64,
        /// Access width in bytes.
        width: u8,
    },
    /// Checked data write.
    Write {
        /// Virtual address.
        addr: u64,
        /// Access width in bytes.
        width: u8,
    },
    /// Exception delivery.
    Exception {
        /// Delivered kind.
        kind: ExceptionKind,
        /// Address of the instruction that raised it.
        cia: u64,
    },
}

impl TraceEvent {
    /// "din" record type: 0 read, 1 write, 2 instruction fetch.
    #[must_use]
    pub const fn din_type(self) -> Option<u8> {
        match self {
            Self::Read { .. } => Some(0),
            Self::Write { .. } => Some(1),
            Self::Fetch { .. } => Some(2),
            Self::Exception { .. } => None,
        }
    }
}

/// Sink trait for trace hooks.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Collects events in memory.
impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Writes "din" records: `<type> <hex address> ; width <n> ; <comment>`.
///
/// Exception deliveries have no record type and are skipped. The first write error
/// is kept and later events are dropped.
#[derive(Debug)]
pub struct DinTraceWriter<W: io::Write> {
    out: W,
    error: Option<io::ErrorKind>,
}

impl<W: io::Write> DinTraceWriter<W> {
    /// Wraps `out`.
    pub const fn new(out: W) -> Self {
        Self { out, error: None }
    }

    /// Kind of the first write error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<io::ErrorKind> {
        self.error
    }

    /// Unwraps the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn record(&mut self, din: u8, addr: u64, width: u8, comment: &str) -> io::Result<()> {
        writeln!(self.out, "{din} {addr:016x} ; width {width} ; {comment}")
    }
}

impl<W: io::Write> TraceSink for DinTraceWriter<W> {
    fn on_event(&mut self, event: TraceEvent) {
        if self.error.is_some() {
            return;
        }
        let result = match event {
            TraceEvent::Fetch { pc, width } => self.record(2, pc, width, "instruction fetch"),
            TraceEvent::Read { addr, width } => self.record(0, addr, width, "load data"),
            TraceEvent::Write { addr, width } => self.record(1, addr, width, "store data"),
            TraceEvent::Exception { .. } => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "trace output failed, tracing stopped");
            self.error = Some(err.kind());
        }
    }
}
