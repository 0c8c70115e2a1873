//! Progress commands: next, complete, stats, reset.

use anyhow::{Context, Result};
use chrono::Utc;
use fluenthour_core::format::{format_duration, format_hours, format_relative_time_opt};
use fluenthour_core::progress::ProgressSummary;
use fluenthour_core::{Level, RecentHistory};

use super::{find_session, pick_session, session_line};
use crate::context::AppContext;
use crate::{LibraryArgs, PickArgs};

const BAR_WIDTH: usize = 30;

pub fn next(ctx: &AppContext, library: &LibraryArgs, pick: &PickArgs) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;

    let Some(chosen) = pick_session(ctx, &catalog, pick)? else {
        let level = ctx.resolve_level(pick.level)?;
        println!("No sessions available at level {}.", level);
        println!("Import sessions for this level with 'fluenthour import', or pick another with --level.");
        return Ok(());
    };

    let completed = ctx.db.is_completed(&chosen.session.id)?;
    println!(
        "Next {} session ({} mode):",
        chosen.level,
        chosen.mode.as_str()
    );
    println!("  {}", session_line(&chosen.session, completed));
    println!();
    println!("Start it with: fluenthour run {}", chosen.session.id);
    Ok(())
}

pub fn complete(ctx: &AppContext, library: &LibraryArgs, id: &str) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let session = find_session(&catalog, id)?;

    let recorded = ctx
        .db
        .record_completion(&session.id, session.level, Utc::now())
        .context("failed to record completion")?;
    if recorded {
        tracing::info!(id = %session.id, "Session marked complete by hand");
        println!("Marked '{}' ({}) complete.", session.title, session.id);
    } else {
        println!("'{}' ({}) was already complete.", session.title, session.id);
    }
    Ok(())
}

pub fn stats(ctx: &AppContext, library: &LibraryArgs, json: bool) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let summary = ProgressSummary::load(&ctx.db, &catalog, ctx.config.goal.hours)
        .context("failed to load progress")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let goal = &summary.goal;
    println!(
        "Practice: {} of {}h goal",
        format_hours(goal.practiced_seconds),
        goal.goal_hours
    );
    println!("  {} {}%", progress_bar(goal.fraction()), goal.percent());
    if goal.is_reached() {
        println!("  Goal reached!");
    } else {
        println!("  {} to go", format_duration(goal.remaining_seconds()));
    }
    println!(
        "  Last practice: {}",
        format_relative_time_opt(summary.last_practice_at)
    );

    println!();
    println!("{:<6} {:>10} {:>10}", "Level", "Sessions", "Practice");
    for level in Level::ALL {
        let Some(progress) = summary.levels.get(&level) else {
            continue;
        };
        println!(
            "{:<6} {:>10} {:>10}",
            level.as_str(),
            format!("{}/{}", progress.completed, progress.available),
            format_duration(progress.practiced_seconds)
        );
    }

    let recent = ctx.db.recent_completions(5)?;
    if !recent.is_empty() {
        println!();
        println!("Recently completed:");
        for record in recent {
            let title = catalog
                .get(&record.session_id)
                .map(|s| s.title.as_str())
                .unwrap_or("(no longer in library)");
            println!(
                "  {} {:<16} {}",
                record.completed_at.format("%Y-%m-%d"),
                record.session_id,
                title
            );
        }
    }
    Ok(())
}

fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

pub struct ResetOptions {
    pub level: Option<Level>,
    pub history: bool,
    pub practice: bool,
    pub yes: bool,
}

pub fn reset(ctx: &AppContext, options: &ResetOptions) -> Result<()> {
    if !options.yes {
        anyhow::bail!("refusing to reset progress without --yes");
    }
    if options.practice && options.level.is_some() {
        anyhow::bail!("practice time can only be cleared for all levels; drop --level");
    }

    let scope = options
        .level
        .map(|l| format!("level {}", l))
        .unwrap_or_else(|| "all levels".to_string());

    let cleared = ctx
        .db
        .clear_completions(options.level)
        .context("failed to clear completions")?;
    println!("Cleared {} completion(s) for {}.", cleared, scope);

    if options.history {
        match options.level {
            Some(level) => {
                let mut history = ctx.db.load_history()?;
                history.clear_level(level);
                ctx.db.save_history(&history)?;
            }
            None => ctx.db.save_history(&RecentHistory::new())?,
        }
        println!("Cleared recent-selection history for {}.", scope);
    }

    if options.practice {
        let rows = ctx
            .db
            .clear_practice_log()
            .context("failed to clear practice log")?;
        println!("Cleared {} practice log entr{}.", rows, if rows == 1 { "y" } else { "ies" });
    }

    tracing::info!(
        scope = %scope,
        history = options.history,
        practice = options.practice,
        "Progress reset"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "-".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(1.0), format!("[{}]", "#".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(0.5).matches('#').count(), BAR_WIDTH / 2);
    }
}
