//! Debounced persistence scheduling.
//!
//! [`PendingWrite`] decides *when* a cart should be written; it never does
//! the writing. Callers report mutations and flush outcomes with explicit
//! instants, so the schedule is deterministic under test.
//!
//! ```text
//! Idle --mutation--> Scheduled(due) --due--> Flushing --done--> Idle
//!                    ^   |  mutation: due moves out        |
//!                    |___|                                 |
//!                    ^------- done, dirty or failed -------+
//! ```

use std::time::{Duration, Instant};

/// Where the pending write currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Nothing to write.
    Idle,
    /// A write is owed once `due` passes.
    Scheduled { due: Instant },
    /// A write is in flight. `dirty` records mutations that arrived since it
    /// started.
    Flushing { dirty: bool },
}

/// Debounce state machine for cart writes.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    delay: Duration,
    state: FlushState,
}

impl PendingWrite {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: FlushState::Idle,
        }
    }

    pub fn state(&self) -> FlushState {
        self.state
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Deadline of the scheduled write, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            FlushState::Scheduled { due } => Some(due),
            _ => None,
        }
    }

    /// Whether a write is owed or in flight.
    pub fn is_pending(&self) -> bool {
        self.state != FlushState::Idle
    }

    /// Record a mutation. Pushes the deadline out, or marks an in-flight
    /// write dirty.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.state = match self.state {
            FlushState::Idle | FlushState::Scheduled { .. } => FlushState::Scheduled {
                due: now + self.delay,
            },
            FlushState::Flushing { .. } => FlushState::Flushing { dirty: true },
        };
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.state, FlushState::Scheduled { due } if due <= now)
    }

    /// Start the scheduled write if its deadline has passed.
    pub fn begin_if_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.state = FlushState::Flushing { dirty: false };
            true
        } else {
            false
        }
    }

    /// Start the scheduled write regardless of its deadline.
    pub fn begin_now(&mut self) -> bool {
        match self.state {
            FlushState::Scheduled { .. } => {
                self.state = FlushState::Flushing { dirty: false };
                true
            }
            _ => false,
        }
    }

    /// Record the outcome of the in-flight write. A failed write, or one
    /// that raced with a mutation, is rescheduled.
    pub fn finish(&mut self, now: Instant, succeeded: bool) {
        if let FlushState::Flushing { dirty } = self.state {
            self.state = if dirty || !succeeded {
                FlushState::Scheduled {
                    due: now + self.delay,
                }
            } else {
                FlushState::Idle
            };
        }
    }

    /// Forget any owed write.
    pub fn cancel(&mut self) {
        self.state = FlushState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn test_mutation_schedules_after_delay() {
        let t0 = Instant::now();
        let mut pending = PendingWrite::new(DELAY);
        assert_eq!(pending.state(), FlushState::Idle);

        pending.mark_dirty(t0);
        assert_eq!(pending.deadline(), Some(t0 + DELAY));
        assert!(!pending.is_due(t0 + Duration::from_millis(499)));
        assert!(pending.is_due(t0 + DELAY));
    }

    #[test]
    fn test_mutation_while_scheduled_debounces() {
        let t0 = Instant::now();
        let mut pending = PendingWrite::new(DELAY);

        pending.mark_dirty(t0);
        pending.mark_dirty(t0 + Duration::from_millis(300));

        assert!(!pending.begin_if_due(t0 + DELAY));
        assert_eq!(pending.deadline(), Some(t0 + Duration::from_millis(800)));
    }

    #[test]
    fn test_full_cycle_returns_to_idle() {
        let t0 = Instant::now();
        let mut pending = PendingWrite::new(DELAY);

        pending.mark_dirty(t0);
        assert!(pending.begin_if_due(t0 + DELAY));
        assert_eq!(pending.state(), FlushState::Flushing { dirty: false });
        pending.finish(t0 + DELAY, true);
        assert_eq!(pending.state(), FlushState::Idle);
        assert!(!pending.is_pending());
    }

    #[test]
    fn test_mutation_during_flush_reschedules() {
        let t0 = Instant::now();
        let mut pending = PendingWrite::new(DELAY);

        pending.mark_dirty(t0);
        assert!(pending.begin_now());
        pending.mark_dirty(t0 + Duration::from_millis(10));
        assert_eq!(pending.state(), FlushState::Flushing { dirty: true });

        let done = t0 + Duration::from_millis(20);
        pending.finish(done, true);
        assert_eq!(pending.deadline(), Some(done + DELAY));
    }

    #[test]
    fn test_failed_flush_reschedules() {
        let t0 = Instant::now();
        let mut pending = PendingWrite::new(DELAY);

        pending.mark_dirty(t0);
        pending.begin_now();
        pending.finish(t0, false);
        assert_eq!(pending.deadline(), Some(t0 + DELAY));
    }

    #[test]
    fn test_begin_now_without_mutation_is_noop() {
        let mut pending = PendingWrite::new(DELAY);
        assert!(!pending.begin_now());
        assert_eq!(pending.state(), FlushState::Idle);
    }
}
