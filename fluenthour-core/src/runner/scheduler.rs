//! Tick scheduling for the runner countdown
//!
//! A scheduler delivers one tick per second for each installed handle.
//! Handles are cancelled before every state change, so a tick that arrives
//! for a cancelled handle is stale and the runner drops it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Identifies one installed repeating tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Installs and cancels the repeating one-second tick.
pub trait TickScheduler {
    /// Install a new repeating tick.
    fn install(&mut self) -> TickHandle;

    /// Cancel a tick. Unknown or already cancelled handles are ignored.
    fn cancel(&mut self, handle: TickHandle);

    /// Ticks that came due since the last call, oldest first.
    fn drain_due(&mut self) -> Vec<TickHandle>;
}

// ============================================
// ManualScheduler
// ============================================

/// Deterministic scheduler: ticks only come due when [`advance`](Self::advance) is called.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    active: Vec<TickHandle>,
    pending: VecDeque<TickHandle>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `seconds` seconds pass for every active handle.
    pub fn advance(&mut self, seconds: u32) {
        for _ in 0..seconds {
            self.pending.extend(self.active.iter().copied());
        }
    }

    /// Handles currently installed.
    pub fn active(&self) -> &[TickHandle] {
        &self.active
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl TickScheduler for ManualScheduler {
    fn install(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.active.push(handle);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.active.retain(|h| *h != handle);
        self.pending.retain(|h| *h != handle);
    }

    fn drain_due(&mut self) -> Vec<TickHandle> {
        self.pending.drain(..).collect()
    }
}

// ============================================
// IntervalScheduler
// ============================================

/// Monotonic-clock scheduler for interactive use.
///
/// Holds at most one handle; installing replaces any previous one.
#[derive(Debug)]
pub struct IntervalScheduler {
    period: Duration,
    next_id: u64,
    current: Option<(TickHandle, Instant)>,
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl IntervalScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_id: 0,
            current: None,
        }
    }

    /// How long until the next tick is due, if one is installed.
    pub fn time_until_next(&self) -> Option<Duration> {
        self.current
            .map(|(_, due)| due.saturating_duration_since(Instant::now()))
    }

    fn drain_due_at(&mut self, now: Instant) -> Vec<TickHandle> {
        let mut due = Vec::new();
        if let Some((handle, next_due)) = self.current.as_mut() {
            while *next_due <= now {
                due.push(*handle);
                *next_due += self.period;
            }
        }
        due
    }
}

impl TickScheduler for IntervalScheduler {
    fn install(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.current = Some((handle, Instant::now() + self.period));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if matches!(self.current, Some((h, _)) if h == handle) {
            self.current = None;
        }
    }

    fn drain_due(&mut self) -> Vec<TickHandle> {
        self.drain_due_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_scheduler_cancel_purges_pending() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.install();
        let b = scheduler.install();
        scheduler.advance(2);
        assert_eq!(scheduler.pending(), 4);

        scheduler.cancel(a);
        assert_eq!(scheduler.drain_due(), vec![b, b]);
        assert_eq!(scheduler.active(), &[b]);
    }

    #[test]
    fn test_manual_scheduler_handles_are_unique() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.install();
        scheduler.cancel(a);
        let b = scheduler.install();
        assert_ne!(a, b);
    }

    #[test]
    fn test_interval_scheduler_catches_up() {
        let mut scheduler = IntervalScheduler::new(Duration::from_millis(100));
        let handle = scheduler.install();
        let start = Instant::now();

        let due = scheduler.drain_due_at(start + Duration::from_millis(350));
        assert_eq!(due, vec![handle; 3]);
        assert!(scheduler
            .drain_due_at(start + Duration::from_millis(360))
            .is_empty());

        scheduler.cancel(handle);
        assert!(scheduler.time_until_next().is_none());
        assert!(scheduler
            .drain_due_at(start + Duration::from_secs(10))
            .is_empty());
    }
}
