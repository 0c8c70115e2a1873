//! Session runner state machine
//!
//! Drives one session through its phases with a one-second countdown.
//!
//! ## States
//!
//! ```text
//!            start                    remaining hits 0
//!   Idle ───────────► PhaseRunning ─────────────────────► PhaseComplete
//!    ▲                 │    ▲   ▲                           │
//!    │           pause │    │   └── acknowledge / resume ───┘
//!    │                 ▼    │ resume
//!    │             PhasePaused
//!    │
//!    └── end_early / exit / reconcile (from any state)
//!
//!   last phase done ──► SessionComplete ── mark_complete (once per run)
//! ```
//!
//! The runner does no I/O. Progress is queued as [`ProgressUpdate`]s which the
//! caller drains with [`SessionRunner::drain_updates`] and persists. Every
//! operation is total: calls that make no sense in the current state are
//! no-ops reported through the return value.
//!
//! ## Timing
//!
//! The countdown is driven by a [`TickScheduler`]. Every state change cancels
//! the installed tick before establishing the new state, and ticks for any
//! other handle are ignored. Practice time is wall-clock time spent in
//! `PhaseRunning`, measured with a [`Clock`], not a count of ticks.

mod clock;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{IntervalScheduler, ManualScheduler, TickHandle, TickScheduler};

use crate::library::Catalog;
use crate::types::{Level, Phase, PhaseBoundary, Session};
use chrono::{DateTime, Utc};

/// Where the runner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    #[default]
    Idle,
    PhaseRunning,
    PhasePaused,
    PhaseComplete,
    SessionComplete,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Idle => "idle",
            RunnerState::PhaseRunning => "running",
            RunnerState::PhasePaused => "paused",
            RunnerState::PhaseComplete => "phase complete",
            RunnerState::SessionComplete => "session complete",
        }
    }

    /// True while a phase countdown exists (running or paused).
    pub fn in_phase(&self) -> bool {
        matches!(self, RunnerState::PhaseRunning | RunnerState::PhasePaused)
    }
}

impl std::fmt::Display for RunnerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress the caller must persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// Wall-clock seconds spent in `PhaseRunning`
    PracticeTime {
        session_id: String,
        level: Level,
        seconds: u64,
        at: DateTime<Utc>,
    },
    /// The learner marked the session complete
    Completed {
        session_id: String,
        level: Level,
        at: DateTime<Utc>,
    },
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale handle or not running
    Ignored,
    /// Countdown decremented
    Counting { remaining: u32 },
    /// A phase ended and the session continues
    PhaseFinished { index: usize },
    /// The last phase ended
    SessionFinished,
}

/// State of the session being run.
#[derive(Debug)]
struct ActiveRun {
    session: Session,
    phase_index: usize,
    remaining: u32,
    phases_done: Vec<bool>,
    run_started_at: Option<DateTime<Utc>>,
    accrued_seconds: u64,
    /// Sub-second remainder carried between running stretches.
    carried_millis: u64,
    completion_emitted: bool,
}

impl ActiveRun {
    fn new(session: Session) -> Self {
        let remaining = session.phases[0].duration_seconds();
        let phases_done = vec![false; session.phases.len()];
        Self {
            session,
            phase_index: 0,
            remaining,
            phases_done,
            run_started_at: None,
            accrued_seconds: 0,
            carried_millis: 0,
            completion_emitted: false,
        }
    }

    fn phase(&self) -> &Phase {
        &self.session.phases[self.phase_index]
    }

    fn is_last_phase(&self) -> bool {
        self.session.is_last_phase(self.phase_index)
    }
}

/// Runs one session at a time.
pub struct SessionRunner<S: TickScheduler = IntervalScheduler, C: Clock = SystemClock> {
    scheduler: S,
    clock: C,
    boundary: PhaseBoundary,
    state: RunnerState,
    active: Option<ActiveRun>,
    tick: Option<TickHandle>,
    outbox: Vec<ProgressUpdate>,
}

impl<S: TickScheduler, C: Clock> SessionRunner<S, C> {
    pub fn new(scheduler: S, clock: C, boundary: PhaseBoundary) -> Self {
        Self {
            scheduler,
            clock,
            boundary,
            state: RunnerState::Idle,
            active: None,
            tick: None,
            outbox: Vec::new(),
        }
    }

    // ============================================
    // Accessors
    // ============================================

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn boundary(&self) -> PhaseBoundary {
        self.boundary
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|run| &run.session)
    }

    pub fn phase_index(&self) -> Option<usize> {
        self.active.as_ref().map(|run| run.phase_index)
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.active.as_ref().map(ActiveRun::phase)
    }

    /// Seconds left in the current phase (0 when idle).
    pub fn remaining_seconds(&self) -> u32 {
        self.active.as_ref().map(|run| run.remaining).unwrap_or(0)
    }

    pub fn is_phase_done(&self, index: usize) -> bool {
        self.active
            .as_ref()
            .and_then(|run| run.phases_done.get(index).copied())
            .unwrap_or(false)
    }

    /// Practice seconds for this run, including the running stretch.
    pub fn elapsed_seconds(&self) -> u64 {
        let Some(run) = self.active.as_ref() else {
            return 0;
        };
        let live = run
            .run_started_at
            .map(|started| millis_between(started, self.clock.now()))
            .unwrap_or(0);
        run.accrued_seconds + (run.carried_millis + live) / 1000
    }

    /// The installed tick handle, if any.
    pub fn installed_tick(&self) -> Option<TickHandle> {
        self.tick
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Take all queued progress updates.
    pub fn drain_updates(&mut self) -> Vec<ProgressUpdate> {
        std::mem::take(&mut self.outbox)
    }

    // ============================================
    // Operations
    // ============================================

    /// Start `session` at its first phase, abandoning any run in flight.
    ///
    /// Returns `false` (and changes nothing) for a session without phases.
    pub fn start(&mut self, session: Session) -> bool {
        if session.phases.is_empty() {
            return false;
        }

        self.cancel_tick();
        self.commit_elapsed();

        tracing::debug!(id = %session.id, phases = session.phases.len(), "Starting session");
        self.active = Some(ActiveRun::new(session));
        self.enter_running();
        true
    }

    /// Apply a tick for the currently installed handle.
    pub fn tick(&mut self) -> TickOutcome {
        match self.tick {
            Some(handle) => self.on_tick(handle),
            None => TickOutcome::Ignored,
        }
    }

    /// Apply a tick delivered by the scheduler. Stale handles are ignored.
    pub fn on_tick(&mut self, handle: TickHandle) -> TickOutcome {
        if self.tick != Some(handle) || self.state != RunnerState::PhaseRunning {
            return TickOutcome::Ignored;
        }
        let Some(run) = self.active.as_mut() else {
            return TickOutcome::Ignored;
        };

        run.remaining = run.remaining.saturating_sub(1);
        if run.remaining > 0 {
            return TickOutcome::Counting {
                remaining: run.remaining,
            };
        }

        self.finish_phase(true)
    }

    /// Apply every tick that came due on the scheduler, one at a time.
    pub fn pump(&mut self) -> Vec<TickOutcome> {
        self.scheduler
            .drain_due()
            .into_iter()
            .map(|handle| self.on_tick(handle))
            .filter(|outcome| *outcome != TickOutcome::Ignored)
            .collect()
    }

    /// `PhaseRunning` → `PhasePaused`. Pausing twice is a no-op.
    pub fn pause(&mut self) -> bool {
        if self.state != RunnerState::PhaseRunning {
            return false;
        }
        self.cancel_tick();
        self.commit_elapsed();
        self.set_state(RunnerState::PhasePaused);
        true
    }

    /// `PhasePaused` → `PhaseRunning`; from `PhaseComplete` acts as [`acknowledge`](Self::acknowledge).
    pub fn resume(&mut self) -> bool {
        match self.state {
            RunnerState::PhasePaused => {
                self.cancel_tick();
                self.enter_running();
                true
            }
            RunnerState::PhaseComplete => self.acknowledge(),
            _ => false,
        }
    }

    /// Pause when running, resume when paused or waiting at a phase boundary.
    pub fn toggle_pause(&mut self) -> bool {
        match self.state {
            RunnerState::PhaseRunning => self.pause(),
            _ => self.resume(),
        }
    }

    /// `PhaseComplete` → next phase `PhaseRunning`.
    pub fn acknowledge(&mut self) -> bool {
        if self.state != RunnerState::PhaseComplete {
            return false;
        }
        self.advance();
        true
    }

    /// Finish the current phase now and move on.
    ///
    /// Always starts the next phase regardless of the boundary policy; from
    /// the last phase the session completes.
    pub fn skip_to_next(&mut self) -> bool {
        match self.state {
            RunnerState::PhaseComplete => self.acknowledge(),
            RunnerState::PhaseRunning | RunnerState::PhasePaused => {
                self.finish_phase(false);
                true
            }
            _ => false,
        }
    }

    /// Add (or with a negative delta, remove) time from the current phase.
    ///
    /// Floors at zero; a running countdown at zero ends on its next tick.
    pub fn extend_time(&mut self, delta_seconds: i64) -> bool {
        if !self.state.in_phase() {
            return false;
        }
        let Some(run) = self.active.as_mut() else {
            return false;
        };
        let remaining = i64::from(run.remaining).saturating_add(delta_seconds);
        run.remaining = remaining.clamp(0, i64::from(u32::MAX)) as u32;
        tracing::debug!(delta_seconds, remaining = run.remaining, "Extended phase time");
        true
    }

    /// Record completion of a finished session. Emits once per run.
    pub fn mark_complete(&mut self) -> bool {
        if self.state != RunnerState::SessionComplete {
            return false;
        }
        let at = self.clock.now();
        let Some(run) = self.active.as_mut() else {
            return false;
        };
        if run.completion_emitted {
            return false;
        }
        run.completion_emitted = true;
        self.outbox.push(ProgressUpdate::Completed {
            session_id: run.session.id.clone(),
            level: run.session.level,
            at,
        });
        tracing::info!(id = %run.session.id, "Session marked complete");
        true
    }

    /// Abandon the run from any state. Practice time so far is kept.
    pub fn end_early(&mut self) -> bool {
        self.cancel_tick();
        self.commit_elapsed();
        let had_run = self.active.take().is_some();
        self.set_state(RunnerState::Idle);
        had_run
    }

    /// Leave the runner, e.g. after marking a session complete.
    pub fn exit(&mut self) -> bool {
        self.end_early()
    }

    /// Drop to `Idle` if the active session is no longer in `catalog`.
    pub fn reconcile(&mut self, catalog: &Catalog) -> bool {
        let vanished = self
            .active
            .as_ref()
            .map(|run| !catalog.contains(&run.session.id))
            .unwrap_or(false);
        if vanished {
            tracing::warn!("Active session disappeared from the catalog, stopping");
            self.end_early();
        }
        vanished
    }

    // ============================================
    // Transitions
    // ============================================

    fn set_state(&mut self, state: RunnerState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "Runner state change");
            self.state = state;
        }
    }

    fn cancel_tick(&mut self) {
        if let Some(handle) = self.tick.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn enter_running(&mut self) {
        let now = self.clock.now();
        if let Some(run) = self.active.as_mut() {
            run.run_started_at = Some(now);
        }
        self.set_state(RunnerState::PhaseRunning);
        self.tick = Some(self.scheduler.install());
    }

    /// Close the running stretch and queue its wall-clock seconds.
    fn commit_elapsed(&mut self) {
        let now = self.clock.now();
        let Some(run) = self.active.as_mut() else {
            return;
        };
        let Some(started) = run.run_started_at.take() else {
            return;
        };
        let millis = run.carried_millis + millis_between(started, now);
        let seconds = millis / 1000;
        run.carried_millis = millis % 1000;
        if seconds == 0 {
            return;
        }
        run.accrued_seconds += seconds;
        self.outbox.push(ProgressUpdate::PracticeTime {
            session_id: run.session.id.clone(),
            level: run.session.level,
            seconds,
            at: now,
        });
    }

    /// Mark the current phase done and move on.
    ///
    /// `from_timer` applies the boundary policy; skips always continue.
    fn finish_phase(&mut self, from_timer: bool) -> TickOutcome {
        self.cancel_tick();
        self.commit_elapsed();

        let Some(run) = self.active.as_mut() else {
            return TickOutcome::Ignored;
        };
        let index = run.phase_index;
        run.phases_done[index] = true;
        run.remaining = 0;

        if run.is_last_phase() {
            self.set_state(RunnerState::SessionComplete);
            return TickOutcome::SessionFinished;
        }

        if from_timer && self.boundary == PhaseBoundary::Autopause {
            self.set_state(RunnerState::PhaseComplete);
        } else {
            self.advance();
        }
        TickOutcome::PhaseFinished { index }
    }

    /// Start the countdown of the phase after the current one.
    fn advance(&mut self) {
        let Some(run) = self.active.as_mut() else {
            return;
        };
        if run.is_last_phase() {
            self.set_state(RunnerState::SessionComplete);
            return;
        }
        run.phase_index += 1;
        run.remaining = run.phase().duration_seconds();
        self.enter_running();
    }
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IdSource, Partner};

    type TestRunner = SessionRunner<ManualScheduler, ManualClock>;

    fn phase(title: &str, minutes: u32) -> Phase {
        Phase {
            title: title.to_string(),
            minutes,
            purpose: None,
            learner_steps: vec![],
            helper_script: None,
        }
    }

    fn session(id: &str, minutes: &[u32]) -> Session {
        Session {
            id: id.to_string(),
            id_source: IdSource::Explicit,
            title: "Order coffee".to_string(),
            level: Level::A2,
            partner: Partner::Either,
            goal: None,
            context: None,
            correction: None,
            category: None,
            twists: vec![],
            phases: minutes
                .iter()
                .enumerate()
                .map(|(i, m)| phase(&format!("Phase {}", i + 1), *m))
                .collect(),
        }
    }

    fn runner(boundary: PhaseBoundary) -> TestRunner {
        SessionRunner::new(ManualScheduler::new(), ManualClock::default(), boundary)
    }

    fn practice_seconds(updates: &[ProgressUpdate]) -> u64 {
        updates
            .iter()
            .map(|u| match u {
                ProgressUpdate::PracticeTime { seconds, .. } => *seconds,
                ProgressUpdate::Completed { .. } => 0,
            })
            .sum()
    }

    #[test]
    fn test_order_coffee_completes_after_sixty_ticks() {
        let mut runner = runner(PhaseBoundary::Autopause);
        assert!(runner.start(session("a2-path-01", &[1])));
        assert_eq!(runner.remaining_seconds(), 60);

        runner.scheduler_mut().advance(60);
        let outcomes = runner.pump();
        assert_eq!(outcomes.len(), 60);
        assert_eq!(outcomes.last(), Some(&TickOutcome::SessionFinished));
        assert_eq!(runner.state(), RunnerState::SessionComplete);
        assert!(runner.is_phase_done(0));
        assert!(runner.installed_tick().is_none());
    }

    #[test]
    fn test_five_minute_phase_has_exactly_one_boundary() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[5, 5]));

        let mut previous = runner.remaining_seconds();
        let mut boundaries = 0;
        for _ in 0..300 {
            match runner.tick() {
                TickOutcome::Counting { remaining } => {
                    assert_eq!(remaining, previous - 1);
                    previous = remaining;
                }
                TickOutcome::PhaseFinished { index } => {
                    assert_eq!(index, 0);
                    boundaries += 1;
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(boundaries, 1);
        assert_eq!(runner.state(), RunnerState::PhaseComplete);
        assert_eq!(runner.remaining_seconds(), 0);

        // Further ticks are ignored until acknowledged
        assert_eq!(runner.tick(), TickOutcome::Ignored);
        assert!(runner.acknowledge());
        assert_eq!(runner.phase_index(), Some(1));
        assert_eq!(runner.remaining_seconds(), 300);
    }

    #[test]
    fn test_auto_continue_starts_next_phase() {
        let mut runner = runner(PhaseBoundary::AutoContinue);
        runner.start(session("s", &[1, 2]));
        for _ in 0..60 {
            runner.tick();
        }
        assert_eq!(runner.state(), RunnerState::PhaseRunning);
        assert_eq!(runner.phase_index(), Some(1));
        assert_eq!(runner.remaining_seconds(), 120);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[5]));
        runner.tick();
        runner.clock().advance(10);

        assert!(runner.pause());
        let remaining = runner.remaining_seconds();
        let updates = runner.drain_updates();

        assert!(!runner.pause());
        assert_eq!(runner.state(), RunnerState::PhasePaused);
        assert_eq!(runner.remaining_seconds(), remaining);
        assert!(runner.drain_updates().is_empty());
        assert_eq!(practice_seconds(&updates), 10);

        // Ticks while paused change nothing
        assert_eq!(runner.tick(), TickOutcome::Ignored);
        assert_eq!(runner.remaining_seconds(), remaining);
    }

    #[test]
    fn test_stale_tick_handle_is_ignored() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[5]));
        let old = runner.installed_tick().unwrap();

        runner.pause();
        runner.resume();
        let new = runner.installed_tick().unwrap();
        assert_ne!(old, new);

        assert_eq!(runner.on_tick(old), TickOutcome::Ignored);
        assert_eq!(runner.remaining_seconds(), 300);
        assert_eq!(
            runner.on_tick(new),
            TickOutcome::Counting { remaining: 299 }
        );
    }

    #[test]
    fn test_start_cancels_prior_tick() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("first", &[5]));
        runner.scheduler_mut().advance(3);
        runner.start(session("second", &[1]));

        assert_eq!(runner.scheduler().active().len(), 1);
        assert_eq!(runner.scheduler().pending(), 0);
        assert_eq!(runner.session().unwrap().id, "second");
        assert_eq!(runner.remaining_seconds(), 60);
    }

    #[test]
    fn test_start_commits_time_of_abandoned_run() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("first", &[5]));
        runner.clock().advance(30);
        runner.start(session("second", &[5]));

        let updates = runner.drain_updates();
        assert_eq!(
            updates,
            vec![ProgressUpdate::PracticeTime {
                session_id: "first".to_string(),
                level: Level::A2,
                seconds: 30,
                at: runner.clock().now(),
            }]
        );
    }

    #[test]
    fn test_start_rejects_session_without_phases() {
        let mut runner = runner(PhaseBoundary::Autopause);
        assert!(!runner.start(session("empty", &[])));
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_mark_complete_emits_once() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[1]));
        assert!(!runner.mark_complete());

        runner.skip_to_next();
        assert_eq!(runner.state(), RunnerState::SessionComplete);
        assert!(runner.mark_complete());
        assert!(!runner.mark_complete());

        let completions = runner
            .drain_updates()
            .into_iter()
            .filter(|u| matches!(u, ProgressUpdate::Completed { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_end_early_commits_wall_clock_time() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[10]));
        // Ticks are not what counts
        runner.tick();
        runner.clock().advance(42);

        assert!(runner.end_early());
        assert_eq!(runner.state(), RunnerState::Idle);
        assert!(runner.session().is_none());
        assert!(runner.installed_tick().is_none());

        let updates = runner.drain_updates();
        assert_eq!(practice_seconds(&updates), 42);
        assert!(!updates
            .iter()
            .any(|u| matches!(u, ProgressUpdate::Completed { .. })));
        assert!(!runner.end_early());
    }

    #[test]
    fn test_paused_time_does_not_accrue() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[10]));
        runner.clock().advance(20);
        runner.pause();
        runner.clock().advance(600);
        runner.resume();
        runner.clock().advance(5);
        runner.end_early();

        assert_eq!(practice_seconds(&runner.drain_updates()), 25);
    }

    #[test]
    fn test_sub_second_stretches_carry_over() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[10]));
        for _ in 0..10 {
            let now = runner.clock().now();
            runner.clock().set(now + chrono::Duration::milliseconds(1900));
            assert!(runner.pause());
            assert!(runner.resume());
        }
        assert_eq!(runner.elapsed_seconds(), 19);
        runner.end_early();

        assert_eq!(practice_seconds(&runner.drain_updates()), 19);
    }

    #[test]
    fn test_extend_time_floors_at_zero() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[1, 1]));
        assert!(runner.extend_time(120));
        assert_eq!(runner.remaining_seconds(), 180);

        assert!(runner.extend_time(-1_000));
        assert_eq!(runner.remaining_seconds(), 0);
        assert_eq!(runner.tick(), TickOutcome::PhaseFinished { index: 0 });

        // Not allowed at a phase boundary
        assert!(!runner.extend_time(60));
    }

    #[test]
    fn test_skip_to_next() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[5, 5, 5]));

        assert!(runner.skip_to_next());
        assert_eq!(runner.state(), RunnerState::PhaseRunning);
        assert_eq!(runner.phase_index(), Some(1));
        assert!(runner.is_phase_done(0));

        runner.pause();
        assert!(runner.skip_to_next());
        assert_eq!(runner.phase_index(), Some(2));
        assert_eq!(runner.state(), RunnerState::PhaseRunning);

        assert!(runner.skip_to_next());
        assert_eq!(runner.state(), RunnerState::SessionComplete);
        assert!(!runner.skip_to_next());
    }

    #[test]
    fn test_resume_from_phase_complete_acknowledges() {
        let mut runner = runner(PhaseBoundary::Autopause);
        runner.start(session("s", &[1, 1]));
        runner.extend_time(-59);
        runner.tick();
        assert_eq!(runner.state(), RunnerState::PhaseComplete);

        assert!(runner.resume());
        assert_eq!(runner.state(), RunnerState::PhaseRunning);
        assert_eq!(runner.phase_index(), Some(1));
    }

    #[test]
    fn test_reconcile_drops_vanished_session() {
        let mut runner = runner(PhaseBoundary::Autopause);
        let kept = session("kept", &[5]);
        let catalog = Catalog::from_sessions([kept.clone()]);

        runner.start(kept);
        assert!(!runner.reconcile(&catalog));
        assert_eq!(runner.state(), RunnerState::PhaseRunning);

        runner.start(session("gone", &[5]));
        assert!(runner.reconcile(&catalog));
        assert_eq!(runner.state(), RunnerState::Idle);
    }

    #[test]
    fn test_idle_operations_are_noops() {
        let mut runner = runner(PhaseBoundary::Autopause);
        assert_eq!(runner.tick(), TickOutcome::Ignored);
        assert!(!runner.pause());
        assert!(!runner.resume());
        assert!(!runner.acknowledge());
        assert!(!runner.skip_to_next());
        assert!(!runner.extend_time(60));
        assert!(!runner.mark_complete());
        assert!(runner.drain_updates().is_empty());
        assert_eq!(runner.elapsed_seconds(), 0);
    }
}
