//! Library commands: list, show, check, import, imports.

use anyhow::{Context, Result};
use fluenthour_core::format::{format_duration, format_relative_time};
use fluenthour_core::library::{parse_library, SourceStatus};
use fluenthour_core::{Catalog, Level, LibrarySource, LoadReport, Session};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

use super::{find_session, session_line};
use crate::context::AppContext;
use crate::LibraryArgs;

#[derive(Serialize)]
struct ListedSession<'a> {
    #[serde(flatten)]
    session: &'a Session,
    completed: bool,
}

pub fn list(
    ctx: &AppContext,
    library: &LibraryArgs,
    level: Option<Level>,
    json: bool,
) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let completed = ctx
        .db
        .completed_ids(level)
        .context("failed to load completions")?;

    let sessions: Vec<&Session> = match level {
        Some(level) => catalog.by_level(level),
        None => catalog.sessions().iter().collect(),
    };

    if json {
        let listed: Vec<ListedSession> = sessions
            .iter()
            .map(|s| ListedSession {
                session: s,
                completed: completed.contains(&s.id),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions found.");
        println!("Add library files under [library] sources in the config, or run 'fluenthour import'.");
        return Ok(());
    }

    for level in Level::ALL {
        let at_level: Vec<&&Session> = sessions.iter().filter(|s| s.level == level).collect();
        if at_level.is_empty() {
            continue;
        }
        let done = at_level.iter().filter(|s| completed.contains(&s.id)).count();
        println!(
            "{} {} ({}/{} complete)",
            level,
            level.display_name(),
            done,
            at_level.len()
        );
        for session in at_level {
            println!("  {}", session_line(session, completed.contains(&session.id)));
        }
        println!();
    }
    println!("{} session(s)", sessions.len());
    Ok(())
}

pub fn show(ctx: &AppContext, library: &LibraryArgs, id: &str, json: bool) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let session = find_session(&catalog, id)?;
    let completed = ctx.db.is_completed(&session.id)?;

    if json {
        let listed = ListedSession { session, completed };
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    println!("{}", session.title);
    println!("  ID:       {}", session.id);
    println!("  Level:    {} ({})", session.level, session.level.display_name());
    println!("  Partner:  {}", session.partner.display_name());
    println!(
        "  Length:   {} ({} phases)",
        format_duration(u64::from(session.total_minutes()) * 60),
        session.phases.len()
    );
    if let Some(category) = &session.category {
        println!("  Category: {}", category);
    }
    println!("  Status:   {}", if completed { "complete" } else { "not yet complete" });

    for (label, value) in [
        ("Goal", &session.goal),
        ("Context", &session.context),
        ("Correction", &session.correction),
    ] {
        if let Some(value) = value {
            println!("\n{}:\n  {}", label, value);
        }
    }

    for (i, phase) in session.phases.iter().enumerate() {
        println!("\nPhase {}: {} ({}m)", i + 1, phase.title, phase.minutes);
        if let Some(purpose) = &phase.purpose {
            println!("  Purpose: {}", purpose);
        }
        for step in &phase.learner_steps {
            println!("  * {}", step);
        }
        if let Some(script) = &phase.helper_script {
            println!("  Helper:");
            for line in script.lines() {
                println!("    {}", line);
            }
        }
    }

    if !session.twists.is_empty() {
        println!("\nTwists:");
        for twist in &session.twists {
            println!("  * {}", twist);
        }
    }
    Ok(())
}

/// Parse sources and print what loaded and what did not.
///
/// Fails when any source is unreadable or any block was dropped, so the
/// command can guard library files in scripts.
pub fn check(ctx: &AppContext, library: &LibraryArgs, files: &[std::path::PathBuf]) -> Result<()> {
    let (catalog, report) = if files.is_empty() {
        ctx.load_catalog_quiet(library)?
    } else {
        let sources = files
            .iter()
            .map(|path| -> Result<LibrarySource> {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(LibrarySource::Text {
                    origin: path.display().to_string(),
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Catalog::load(&sources, ctx.config.library.default_level)
    };

    let problems = print_load_report(&report);

    let combined = report.combined();
    println!();
    println!(
        "Total: {} session(s) loaded from {} block(s), {} duplicate id(s) skipped",
        catalog.len(),
        combined.blocks_seen,
        report.duplicates()
    );

    if problems > 0 {
        anyhow::bail!("library check found {} problem(s)", problems);
    }
    println!("Library OK");
    Ok(())
}

/// Print per-source diagnostics. Returns the number of problems found.
fn print_load_report(report: &LoadReport) -> usize {
    let mut problems = 0;

    for source in &report.sources {
        let parse = &source.parse;
        match &source.status {
            SourceStatus::Failed(message) => {
                problems += 1;
                println!("{}: failed to read ({})", source.origin, message);
                continue;
            }
            SourceStatus::NoMatches => {
                problems += 1;
                println!("{}: no files match", source.origin);
                continue;
            }
            SourceStatus::Empty => {
                println!("{}: no session blocks", source.origin);
            }
            SourceStatus::NoValidSessions | SourceStatus::Loaded => {
                println!(
                    "{}: {} session(s) from {} block(s)",
                    source.origin, parse.sessions_parsed, parse.blocks_seen
                );
            }
        }

        if parse.unterminated_blocks > 0 {
            problems += parse.unterminated_blocks;
            println!(
                "    {} block(s) missing an END line were ignored",
                parse.unterminated_blocks
            );
        }
        for dropped in &parse.dropped {
            problems += 1;
            match &dropped.title {
                Some(title) => println!(
                    "    block {} \"{}\" dropped: {}",
                    dropped.index + 1,
                    title,
                    dropped.reason
                ),
                None => println!("    block {} dropped: {}", dropped.index + 1, dropped.reason),
            }
        }
        if source.duplicates > 0 {
            println!(
                "    {} session(s) skipped: id already loaded from an earlier source",
                source.duplicates
            );
        }
    }
    problems
}

/// Store library text so it loads on every run.
pub fn import(ctx: &AppContext, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            text
        }
    };

    let outcome = parse_library(&text, ctx.config.library.default_level);
    if outcome.sessions.is_empty() {
        anyhow::bail!(
            "no valid sessions found ({} block(s) seen, {} dropped, {} unterminated)",
            outcome.report.blocks_seen,
            outcome.report.dropped.len(),
            outcome.report.unterminated_blocks
        );
    }

    let inserted = ctx
        .db
        .insert_import(&text, outcome.sessions.len())
        .context("failed to store import")?;
    if !inserted {
        println!("Already imported; nothing changed.");
        return Ok(());
    }

    let hash = fluenthour_core::db::import_hash(&text);
    tracing::info!(hash = %hash, sessions = outcome.sessions.len(), "Imported library text");
    println!(
        "Imported {} session(s) ({})",
        outcome.sessions.len(),
        &hash[..12]
    );
    for session in &outcome.sessions {
        println!("  {} {:<16} {}", session.level, session.id, session.title);
    }
    if !outcome.report.is_clean() {
        println!(
            "Note: {} block(s) were skipped; run 'fluenthour check <file>' for details.",
            outcome.report.dropped.len() + outcome.report.unterminated_blocks
        );
    }
    Ok(())
}

pub fn imports(ctx: &AppContext, remove: Option<&str>) -> Result<()> {
    let imports = ctx.db.list_imports().context("failed to list imports")?;

    if let Some(prefix) = remove {
        let prefix = prefix.trim().to_lowercase();
        let matches: Vec<_> = imports
            .iter()
            .filter(|i| !prefix.is_empty() && i.hash.starts_with(&prefix))
            .collect();
        match matches.as_slice() {
            [import] => {
                ctx.db.delete_import(&import.hash)?;
                println!("Removed import {}", &import.hash[..12]);
                return Ok(());
            }
            [] => anyhow::bail!("No import matches '{}'", prefix),
            _ => anyhow::bail!("'{}' matches {} imports; use a longer hash", prefix, matches.len()),
        }
    }

    if imports.is_empty() {
        println!("No imports yet. Paste sessions into 'fluenthour import' to add some.");
        return Ok(());
    }
    for import in &imports {
        println!(
            "{}  {:>3} session(s)  imported {}",
            &import.hash[..12],
            import.session_count,
            format_relative_time(import.imported_at)
        );
    }
    Ok(())
}
