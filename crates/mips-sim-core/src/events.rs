//! Time-ordered event queue driven by retired cycles.

/// Kinds of scheduled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EventKind {
    /// External interrupt request, delivered once `SR.IE` allows it.
    Interrupt,
}

/// One queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ScheduledEvent {
    /// Tick at which the event becomes due.
    pub due: u64,
    /// Event kind.
    pub kind: EventKind,
}

/// Events ordered by due tick, ties in scheduling order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct EventQueue {
    now: u64,
    pending: Vec<ScheduledEvent>,
}

impl EventQueue {
    /// Current tick.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when no events are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns true when an event of `kind` is queued.
    #[must_use]
    pub fn has_pending(&self, kind: EventKind) -> bool {
        self.pending.iter().any(|event| event.kind == kind)
    }

    /// Queues `kind` to fire `delay` ticks from now.
    pub fn schedule(&mut self, delay: u64, kind: EventKind) {
        let due = self.now.saturating_add(delay);
        let at = self.pending.partition_point(|event| event.due <= due);
        self.pending.insert(at, ScheduledEvent { due, kind });
    }

    /// Advances the clock by `ticks`.
    pub const fn advance(&mut self, ticks: u64) {
        self.now = self.now.saturating_add(ticks);
    }

    /// Removes and returns the earliest event that is due.
    pub fn pop_due(&mut self) -> Option<EventKind> {
        match self.pending.first() {
            Some(event) if event.due <= self.now => Some(self.pending.remove(0).kind),
            _ => None,
        }
    }

    /// Drops every queued event. The clock keeps running.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{EventKind, EventQueue};

    #[test]
    fn events_fire_only_once_due() {
        let mut queue = EventQueue::default();
        queue.schedule(3, EventKind::Interrupt);
        assert!(queue.has_pending(EventKind::Interrupt));

        queue.advance(2);
        assert_eq!(queue.pop_due(), None);
        queue.advance(1);
        assert_eq!(queue.pop_due(), Some(EventKind::Interrupt));
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_due_ticks_keep_scheduling_order() {
        let mut queue = EventQueue::default();
        queue.schedule(5, EventKind::Interrupt);
        queue.schedule(1, EventKind::Interrupt);
        queue.schedule(5, EventKind::Interrupt);
        assert_eq!(queue.len(), 3);
        queue.advance(5);
        let mut fired = 0;
        while queue.pop_due().is_some() {
            fired += 1;
        }
        assert_eq!(fired, 3);
        assert_eq!(queue.now(), 5);
    }

    #[test]
    fn clear_keeps_the_clock() {
        let mut queue = EventQueue::default();
        queue.advance(10);
        queue.schedule(1, EventKind::Interrupt);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.now(), 10);
    }
}
