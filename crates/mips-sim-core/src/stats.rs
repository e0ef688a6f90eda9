//! Saturating execution counters.

use crate::{ExceptionClass, ExceptionKind};

/// Execution statistics. Bridge accesses never update these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SimStats {
    instructions: u64,
    exceptions_asynchronous: u64,
    exceptions_memory: u64,
    exceptions_instruction: u64,
    exceptions_arithmetic: u64,
    exceptions_synchronous: u64,
    exceptions_watch: u64,
    exceptions_debug: u64,
    loads: u64,
    stores: u64,
    monitor_calls: u64,
    last_exception: Option<(ExceptionKind, u64)>,
}

impl SimStats {
    /// Records a retired instruction.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_instruction(&mut self) {
        self.instructions = self.instructions.saturating_add(1);
    }

    /// Records an exception delivery at `cia`, bumping the counter for its class.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_exception(&mut self, kind: ExceptionKind, cia: u64) {
        self.last_exception = Some((kind, cia));
        let counter = match kind.class() {
            ExceptionClass::Asynchronous => &mut self.exceptions_asynchronous,
            ExceptionClass::Memory => &mut self.exceptions_memory,
            ExceptionClass::Instruction => &mut self.exceptions_instruction,
            ExceptionClass::Arithmetic => &mut self.exceptions_arithmetic,
            ExceptionClass::Synchronous => &mut self.exceptions_synchronous,
            ExceptionClass::Watch => &mut self.exceptions_watch,
            ExceptionClass::Debug => &mut self.exceptions_debug,
        };
        *counter = counter.saturating_add(1);
    }

    /// Records a checked data load.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_load(&mut self) {
        self.loads = self.loads.saturating_add(1);
    }

    /// Records a checked data store.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_store(&mut self) {
        self.stores = self.stores.saturating_add(1);
    }

    /// Records a monitor service call.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_monitor_call(&mut self) {
        self.monitor_calls = self.monitor_calls.saturating_add(1);
    }

    /// Retired instructions.
    #[must_use]
    pub const fn instructions(&self) -> u64 {
        self.instructions
    }

    /// Exceptions delivered in `class`.
    #[must_use]
    pub const fn exceptions(&self, class: ExceptionClass) -> u64 {
        match class {
            ExceptionClass::Asynchronous => self.exceptions_asynchronous,
            ExceptionClass::Memory => self.exceptions_memory,
            ExceptionClass::Instruction => self.exceptions_instruction,
            ExceptionClass::Arithmetic => self.exceptions_arithmetic,
            ExceptionClass::Synchronous => self.exceptions_synchronous,
            ExceptionClass::Watch => self.exceptions_watch,
            ExceptionClass::Debug => self.exceptions_debug,
        }
    }

    /// Checked data loads.
    #[must_use]
    pub const fn loads(&self) -> u64 {
        self.loads
    }

    /// Checked data stores.
    #[must_use]
    pub const fn stores(&self) -> u64 {
        self.stores
    }

    /// Monitor service calls.
    #[must_use]
    pub const fn monitor_calls(&self) -> u64 {
        self.monitor_calls
    }

    /// Kind and instruction address of the most recent exception.
    #[must_use]
    pub const fn last_exception(&self) -> Option<(ExceptionKind, u64)> {
        self.last_exception
    }

    /// Resets every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
