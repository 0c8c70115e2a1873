//! Interactive session runner.
//!
//! Puts the terminal in raw mode, shows one countdown bar per phase and maps
//! single keys to runner operations. Progress updates are written to the
//! database as soon as the runner emits them, so quitting at any point keeps
//! the practice time already spent.

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use fluenthour_core::format::{format_clock, format_duration};
use fluenthour_core::prompts::partner_prompt;
use fluenthour_core::runner::{IntervalScheduler, SystemClock};
use fluenthour_core::{
    PhaseBoundary, ProgressUpdate, RunnerState, Session, SessionRunner, TickOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use std::io::{IsTerminal, Write};
use std::time::Duration;

use super::{find_session, pick_session};
use crate::context::AppContext;
use crate::process_lock::acquire_run_guard;
use crate::{LibraryArgs, PickArgs};

/// Longest wait for a key before the countdown is re-checked.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const KEY_HELP: &str =
    "Keys: space pause/resume, enter next phase, n skip, +/- adjust time, ] add more, \
     h helper, a AI prompt, t twist, r reload library, q quit";

#[derive(Debug, Default)]
pub struct RunOptions {
    pub id: Option<String>,
    pub pick: PickArgs,
    pub boundary: Option<PhaseBoundary>,
    pub dry_run: bool,
}

pub fn run(ctx: &AppContext, library: &LibraryArgs, options: &RunOptions) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;

    let session = match &options.id {
        Some(id) => {
            let session = find_session(&catalog, id)?.clone();
            ctx.db.set_last_level(session.level)?;
            session
        }
        None => match pick_session(ctx, &catalog, &options.pick)? {
            Some(pick) => pick.session,
            None => {
                let level = ctx.resolve_level(options.pick.level)?;
                anyhow::bail!(
                    "No sessions available at level {}; import some with 'fluenthour import'",
                    level
                );
            }
        },
    };

    print_plan(&session);
    if options.dry_run {
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        anyhow::bail!("'fluenthour run' needs an interactive terminal (use --dry-run to preview)");
    }

    let _run_guard = acquire_run_guard(&ctx.db_path).context("failed to acquire run lock")?;

    let boundary = options.boundary.unwrap_or(ctx.config.runner.phase_boundary);
    let mut runner = SessionRunner::new(IntervalScheduler::default(), SystemClock, boundary);
    let id = session.id.clone();
    runner.start(session);
    tracing::info!(id = %id, boundary = ?boundary, "Session run started");

    println!("{}", KEY_HELP);
    println!();

    let mut run = RunLoop::new(ctx, library, runner);
    let result = {
        let _raw = RawMode::enable()?;
        run.drive()
    };

    // Whatever happened above, keep the time already practised
    let finished = run.finish();
    result.and(finished)
}

/// Session overview printed before the timer starts.
fn print_plan(session: &Session) {
    println!(
        "{}  [{} {}, {}]",
        session.title,
        session.level,
        session.id,
        format_duration(u64::from(session.total_minutes()) * 60)
    );
    if let Some(goal) = &session.goal {
        println!("Goal: {}", goal);
    }
    if let Some(context) = &session.context {
        println!("Context: {}", context);
    }
    println!("Partner: {}", session.partner.display_name());
    for (i, phase) in session.phases.iter().enumerate() {
        println!("  {}. {:<32} {:>3}m", i + 1, phase.title, phase.minutes);
    }
    println!();
}

/// Raw mode for the lifetime of the guard.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

struct RunLoop<'a> {
    ctx: &'a AppContext,
    library: &'a LibraryArgs,
    runner: SessionRunner,
    bar: ProgressBar,
    /// Phase whose introduction has been printed
    shown_phase: Option<usize>,
    /// Bar length for the current phase, grown when time is added
    phase_length: u32,
    last_state: RunnerState,
    practiced_seconds: u64,
    completed: bool,
}

impl<'a> RunLoop<'a> {
    fn new(ctx: &'a AppContext, library: &'a LibraryArgs, runner: SessionRunner) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold} [{bar:40.cyan/blue}] {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        Self {
            ctx,
            library,
            runner,
            bar,
            shown_phase: None,
            phase_length: 0,
            last_state: RunnerState::Idle,
            practiced_seconds: 0,
            completed: false,
        }
    }

    fn drive(&mut self) -> Result<()> {
        loop {
            for outcome in self.runner.pump() {
                if matches!(
                    outcome,
                    TickOutcome::PhaseFinished { .. } | TickOutcome::SessionFinished
                ) {
                    self.bell();
                }
            }
            self.persist()?;
            self.render();

            if self.runner.state() == RunnerState::Idle {
                return Ok(());
            }

            let timeout = self
                .runner
                .scheduler()
                .time_until_next()
                .map_or(POLL_INTERVAL, |due| due.min(POLL_INTERVAL));
            if event::poll(timeout).context("failed to poll terminal events")? {
                if let Event::Key(key) = event::read().context("failed to read key")? {
                    if key.kind == KeyEventKind::Press && !self.handle_key(key)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Apply one key. Returns `false` when the learner wants to leave.
    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let short = i64::from(self.ctx.config.runner.short_extend_minutes) * 60;
        let long = i64::from(self.ctx.config.runner.long_extend_minutes) * 60;

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(false),
            KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                self.runner.toggle_pause();
            }
            KeyCode::Enter => {
                self.runner.acknowledge();
            }
            KeyCode::Char('n') => {
                self.runner.skip_to_next();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.extend(short),
            KeyCode::Char(']') => self.extend(long),
            KeyCode::Char('-') => self.extend(-short),
            KeyCode::Char('h') => self.show_helper(),
            KeyCode::Char('a') => self.show_partner_prompt(),
            KeyCode::Char('t') => self.show_twist(),
            KeyCode::Char('r') => return self.reload_library(),
            KeyCode::Char('c') => {
                if self.runner.mark_complete() {
                    self.persist()?;
                    self.say("Marked complete. Well done!");
                    self.runner.exit();
                    return Ok(false);
                }
            }
            KeyCode::Char('?') => self.say(KEY_HELP),
            _ => {}
        }
        Ok(true)
    }

    fn extend(&mut self, delta_seconds: i64) {
        if self.runner.extend_time(delta_seconds) {
            let length = i64::from(self.phase_length) + delta_seconds;
            self.phase_length = length.clamp(0, i64::from(u32::MAX)) as u32;
        }
    }

    fn show_helper(&self) {
        match self.runner.current_phase() {
            Some(phase) => match &phase.helper_script {
                Some(script) => self.say(&format!("Helper script:\n{}", script)),
                None => self.say("No helper script for this phase."),
            },
            None => self.say("No phase is active."),
        }
    }

    fn show_partner_prompt(&self) {
        let prompt = self
            .runner
            .session()
            .zip(self.runner.phase_index())
            .and_then(|(session, index)| partner_prompt(session, index));
        match prompt {
            Some(prompt) => self.say(&format!("Paste this into your AI chat:\n\n{}", prompt)),
            None => self.say("No phase is active."),
        }
    }

    fn show_twist(&self) {
        let twist = self
            .runner
            .session()
            .and_then(|s| s.twists.choose(&mut rand::thread_rng()));
        match twist {
            Some(twist) => self.say(&format!("Twist: {}", twist)),
            None => self.say("This session has no twists."),
        }
    }

    /// Re-read every library source and stop if the running session is gone.
    fn reload_library(&mut self) -> Result<bool> {
        let (catalog, report) = self.ctx.load_catalog_quiet(self.library)?;
        for source in report.failed() {
            self.say(&format!("Library source {} could not be loaded.", source.origin));
        }
        if self.runner.reconcile(&catalog) {
            self.persist()?;
            self.say("This session is no longer in the library. Stopping.");
            return Ok(false);
        }
        self.say(&format!(
            "Library reloaded: {} session(s) from {} source(s).",
            catalog.len(),
            report.sources.len()
        ));
        Ok(true)
    }

    /// Write queued progress updates to the database.
    fn persist(&mut self) -> Result<()> {
        for update in self.runner.drain_updates() {
            match &update {
                ProgressUpdate::PracticeTime { seconds, .. } => self.practiced_seconds += seconds,
                ProgressUpdate::Completed { .. } => self.completed = true,
            }
            self.ctx
                .db
                .apply_update(&update)
                .context("failed to save progress")?;
        }
        Ok(())
    }

    fn render(&mut self) {
        let state = self.runner.state();
        let remaining = self.runner.remaining_seconds();

        if let (Some(index), Some(session)) = (self.runner.phase_index(), self.runner.session()) {
            if self.shown_phase != Some(index) && state.in_phase() {
                let intro = phase_intro(session, index);
                self.shown_phase = Some(index);
                self.phase_length = remaining;
                self.bar.reset();
                self.bar.set_prefix(format!("{}/{}", index + 1, session.phases.len()));
                self.say(&intro);
            }
        }

        if state != self.last_state {
            match state {
                RunnerState::PhaseComplete => self.say(
                    "Time is up for this phase. Press enter to start the next one, or + for more time.",
                ),
                RunnerState::SessionComplete => self.say(
                    "Session finished! Press c to mark it complete, or q to leave without marking.",
                ),
                _ => {}
            }
            self.last_state = state;
        }

        self.phase_length = self.phase_length.max(remaining);
        self.bar.set_length(u64::from(self.phase_length));
        self.bar
            .set_position(u64::from(self.phase_length.saturating_sub(remaining)));
        self.bar.set_message(match state {
            RunnerState::PhaseRunning => format!("{} left", format_clock(remaining)),
            RunnerState::PhasePaused => format!("{} left (paused)", format_clock(remaining)),
            RunnerState::PhaseComplete => "time is up".to_string(),
            RunnerState::SessionComplete => "done".to_string(),
            RunnerState::Idle => String::new(),
        });
    }

    /// Print above the bar. Raw mode needs explicit carriage returns.
    fn say(&self, text: &str) {
        self.bar.suspend(|| {
            let mut stdout = std::io::stdout();
            for line in text.lines() {
                let _ = write!(stdout, "{}\r\n", line);
            }
            let _ = stdout.flush();
        });
    }

    fn bell(&self) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\x07");
        let _ = stdout.flush();
    }

    /// Stop the runner and persist what is left.
    fn finish(&mut self) -> Result<()> {
        self.bar.finish_and_clear();
        if self.runner.state() != RunnerState::Idle {
            self.runner.end_early();
        }
        self.persist()?;

        println!();
        println!(
            "Practised {} this run{}.",
            format_duration(self.practiced_seconds),
            if self.completed { " and completed the session" } else { "" }
        );
        tracing::info!(
            seconds = self.practiced_seconds,
            completed = self.completed,
            "Session run ended"
        );
        Ok(())
    }
}

fn phase_intro(session: &Session, index: usize) -> String {
    let Some(phase) = session.phase(index) else {
        return String::new();
    };

    let mut intro = format!(
        "\n== Phase {}/{}: {} ({}m) ==",
        index + 1,
        session.phases.len(),
        phase.title,
        phase.minutes
    );
    if let Some(purpose) = &phase.purpose {
        intro.push_str(&format!("\n{}", purpose));
    }
    for step in &phase.learner_steps {
        intro.push_str(&format!("\n  * {}", step));
    }
    if phase.helper_script.is_some() {
        intro.push_str("\n(press h for the partner's script)");
    }
    intro
}
