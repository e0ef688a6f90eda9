use super::VuRegisters;

/// Execution engine behind the vector unit.
///
/// The core never blocks on the engine: waits poll [`MicroEngine::is_busy`] and call
/// [`MicroEngine::issue`] once per iteration.
pub trait MicroEngine {
    /// Returns `true` while a macro-instruction or micro-program is in flight.
    fn is_busy(&self) -> bool;

    /// Returns `true` while a `Q` register result is pending.
    fn is_q_busy(&self) -> bool;

    /// Advances by one issue cycle.
    fn issue(&mut self, regs: &mut VuRegisters);

    /// Starts one macro-instruction given as an upper/lower micro-instruction pair.
    fn macro_issue(&mut self, regs: &mut VuRegisters, upper: u32, lower: u32);

    /// Starts the micro-program at `address`.
    fn start_microprogram(&mut self, regs: &mut VuRegisters, address: u32);

    /// Returns `true` once a running micro-program has released the interlock.
    fn micro_interlock_released(&self) -> bool;

    /// Acknowledges a released micro-interlock.
    fn clear_micro_interlock(&mut self);
}

/// Reference engine that stays busy for a fixed number of issue cycles per request.
///
/// It models timing only; register contents are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyMicroEngine {
    macro_latency: u32,
    microprogram_latency: u32,
    q_latency: u32,
    remaining: u32,
    q_remaining: u32,
    interlock_released: bool,
    issued_macros: Vec<(u32, u32)>,
    started_at: Option<u32>,
}

impl Default for LatencyMicroEngine {
    fn default() -> Self {
        Self::new(4, 32)
    }
}

impl LatencyMicroEngine {
    /// Creates an engine with the given macro and micro-program latencies in issue cycles.
    #[must_use]
    pub const fn new(macro_latency: u32, microprogram_latency: u32) -> Self {
        Self {
            macro_latency,
            microprogram_latency,
            q_latency: macro_latency,
            remaining: 0,
            q_remaining: 0,
            interlock_released: false,
            issued_macros: Vec::new(),
            started_at: None,
        }
    }

    /// Upper/lower pairs issued so far, oldest first.
    #[must_use]
    pub fn issued_macros(&self) -> &[(u32, u32)] {
        &self.issued_macros
    }

    /// Address of the most recently started micro-program.
    #[must_use]
    pub const fn started_at(&self) -> Option<u32> {
        self.started_at
    }

    /// Marks the running micro-program as having released the interlock.
    pub const fn release_interlock(&mut self) {
        self.interlock_released = true;
    }
}

impl MicroEngine for LatencyMicroEngine {
    fn is_busy(&self) -> bool {
        self.remaining > 0
    }

    fn is_q_busy(&self) -> bool {
        self.q_remaining > 0
    }

    fn issue(&mut self, _regs: &mut VuRegisters) {
        self.remaining = self.remaining.saturating_sub(1);
        self.q_remaining = self.q_remaining.saturating_sub(1);
    }

    fn macro_issue(&mut self, _regs: &mut VuRegisters, upper: u32, lower: u32) {
        self.issued_macros.push((upper, lower));
        self.remaining = self.macro_latency;
        self.q_remaining = self.q_latency;
    }

    fn start_microprogram(&mut self, _regs: &mut VuRegisters, address: u32) {
        self.started_at = Some(address);
        self.interlock_released = false;
        self.remaining = self.microprogram_latency.max(1);
    }

    fn micro_interlock_released(&self) -> bool {
        self.interlock_released
    }

    fn clear_micro_interlock(&mut self) {
        self.interlock_released = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{LatencyMicroEngine, MicroEngine};
    use crate::vu::VuRegisters;

    #[test]
    fn macro_issue_is_busy_for_its_latency() {
        let mut engine = LatencyMicroEngine::new(2, 10);
        let mut regs = VuRegisters::default();
        engine.macro_issue(&mut regs, 0x2FF, 0x8000_0000);
        assert!(engine.is_busy());
        engine.issue(&mut regs);
        assert!(engine.is_busy());
        engine.issue(&mut regs);
        assert!(!engine.is_busy());
        assert_eq!(engine.issued_macros(), &[(0x2FF, 0x8000_0000)]);
    }

    #[test]
    fn interlock_release_is_acknowledged() {
        let mut engine = LatencyMicroEngine::default();
        let mut regs = VuRegisters::default();
        engine.start_microprogram(&mut regs, 0x10);
        assert_eq!(engine.started_at(), Some(0x10));
        assert!(!engine.micro_interlock_released());
        engine.release_interlock();
        assert!(engine.micro_interlock_released());
        engine.clear_micro_interlock();
        assert!(!engine.micro_interlock_released());
    }
}
