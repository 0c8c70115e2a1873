//! Subcommand implementations.

pub mod library;
pub mod practice;
pub mod prompt;
pub mod run;

use anyhow::{Context, Result};
use fluenthour_core::{Catalog, Level, SelectionMode, Selector, Session};

use crate::context::AppContext;
use crate::PickArgs;

/// A session chosen by the selection strategy.
pub struct Pick {
    pub session: Session,
    pub level: Level,
    pub mode: SelectionMode,
}

/// Choose the next session at the resolved level.
///
/// Random picks update the stored recency history. The level is remembered
/// as the learner's current level whenever a session is found.
pub fn pick_session(ctx: &AppContext, catalog: &Catalog, pick: &PickArgs) -> Result<Option<Pick>> {
    let level = ctx.resolve_level(pick.level)?;
    let mode = pick.mode.unwrap_or(ctx.config.selection.mode);
    let selector = Selector::from_config(&ctx.config.selection);

    let chosen = match mode {
        SelectionMode::Random => {
            let mut history = ctx.db.load_history().context("failed to load history")?;
            let category = pick
                .category
                .as_deref()
                .or(ctx.config.selection.category.as_deref());
            let chosen = selector
                .pick_random(catalog, level, category, &mut history, &mut rand::thread_rng())
                .cloned();
            if chosen.is_some() {
                ctx.db
                    .save_history(&history)
                    .context("failed to save history")?;
            }
            chosen
        }
        SelectionMode::Path => {
            let completed = ctx
                .db
                .completed_ids(Some(level))
                .context("failed to load completions")?;
            selector.pick_path(catalog, level, &completed).cloned()
        }
    };

    let Some(session) = chosen else {
        tracing::info!(level = %level, mode = mode.as_str(), "No session available");
        return Ok(None);
    };

    ctx.db
        .set_last_level(level)
        .context("failed to remember level")?;

    Ok(Some(Pick {
        session,
        level,
        mode,
    }))
}

/// Look up a session by exact id, then by unique id prefix.
pub fn find_session<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Session> {
    let candidates = catalog
        .sessions()
        .iter()
        .filter(|s| s.id.starts_with(id))
        .count();
    if candidates > 1 && !catalog.contains(id) {
        anyhow::bail!("'{}' matches {} sessions; use a longer id", id, candidates);
    }
    Ok(catalog.resolve(id)?)
}

/// One-line summary used by `list` and `next`.
pub fn session_line(session: &Session, completed: bool) -> String {
    format!(
        "{} {:<16} {:<32} {:>3}m  {}",
        if completed { "✓" } else { " " },
        session.id,
        truncate(&session.title, 32),
        session.total_minutes(),
        session.category.as_deref().unwrap_or("-")
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
