//! Session library loading
//!
//! Turns library text from several sources into one [`Catalog`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │ LibrarySource   │ ──► │  parse_library   │ ──► │     Catalog     │
//! │ ├─ Starter      │     │ (never fails)    │     │ (dedup by id,   │
//! │ ├─ Files(glob)  │     └──────────────────┘     │  first wins)    │
//! │ └─ Text         │              │               └─────────────────┘
//! └─────────────────┘              ▼
//!                           ┌──────────────┐
//!                           │  LoadReport  │
//!                           └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fluenthour_core::library::{Catalog, LibrarySource};
//! use fluenthour_core::Level;
//!
//! let sources = vec![LibrarySource::Files("~/fluenthour/*.txt".into()), LibrarySource::Starter];
//! let (catalog, report) = Catalog::load(&sources, Level::A2);
//! println!("{} sessions from {} sources", catalog.len(), report.sources.len());
//! ```

pub mod identity;
pub mod parser;

pub use parser::{
    detect_level, parse_library, parse_partner, DropReason, DroppedBlock, ParseOutcome,
    ParseReport, BEGIN_MARKER, END_MARKER,
};

use crate::error::{Error, Result};
use crate::types::{Level, Session};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Library bundled with the binary so a fresh install has sessions.
pub const STARTER_LIBRARY: &str = include_str!("../../library/starter.txt");

// ============================================
// Sources
// ============================================

/// Where library text comes from.
#[derive(Debug, Clone)]
pub enum LibrarySource {
    /// The bundled starter library
    Starter,
    /// Every file matching a glob pattern
    Files(String),
    /// Text already in memory (imported blocks, stdin)
    Text { origin: String, text: String },
}

impl LibrarySource {
    /// Short label used in reports.
    pub fn name(&self) -> String {
        match self {
            LibrarySource::Starter => "starter".to_string(),
            LibrarySource::Files(pattern) => pattern.clone(),
            LibrarySource::Text { origin, .. } => origin.clone(),
        }
    }

    /// Fetch raw texts as `(origin, text)` pairs.
    ///
    /// A glob yields one pair per readable file. Unreadable files are
    /// returned as `Err` entries so the caller can report them individually.
    pub fn fetch(&self) -> Result<Vec<(String, Result<String>)>> {
        match self {
            LibrarySource::Starter => Ok(vec![(self.name(), Ok(STARTER_LIBRARY.to_string()))]),
            LibrarySource::Text { origin, text } => Ok(vec![(origin.clone(), Ok(text.clone()))]),
            LibrarySource::Files(pattern) => {
                let entries = glob::glob(pattern).map_err(|e| Error::Library {
                    source_name: pattern.clone(),
                    message: format!("invalid glob pattern: {}", e),
                })?;

                let mut paths: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
                paths.sort();

                Ok(paths
                    .into_iter()
                    .map(|path| {
                        let origin = path.display().to_string();
                        let text = std::fs::read(&path)
                            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                            .map_err(|e| Error::Library {
                                source_name: origin.clone(),
                                message: e.to_string(),
                            });
                        (origin, text)
                    })
                    .collect())
            }
        }
    }
}

// ============================================
// Load report
// ============================================

/// Outcome for one fetched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// At least one session was added
    Loaded,
    /// Blocks were found but none passed the validity gate
    NoValidSessions,
    /// No blocks at all
    Empty,
    /// A file glob that matched no files
    NoMatches,
    /// The source could not be read
    Failed(String),
}

impl SourceStatus {
    /// True when the source itself could not be fetched.
    pub fn is_failure(&self) -> bool {
        matches!(self, SourceStatus::Failed(_) | SourceStatus::NoMatches)
    }
}

/// Per-source diagnostics.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub origin: String,
    pub status: SourceStatus,
    pub parse: ParseReport,
    /// Sessions skipped because an earlier source had the same id
    pub duplicates: usize,
}

/// Diagnostics for a whole catalog build.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub sources: Vec<SourceReport>,
}

impl LoadReport {
    /// Parse reports of all sources folded together.
    pub fn combined(&self) -> ParseReport {
        let mut total = ParseReport::default();
        for source in &self.sources {
            total.merge(&source.parse);
        }
        total
    }

    /// Sources that could not be fetched, including globs matching nothing.
    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.status.is_failure())
    }

    pub fn duplicates(&self) -> usize {
        self.sources.iter().map(|s| s.duplicates).sum()
    }
}

// ============================================
// Catalog
// ============================================

/// All sessions available for selection, keyed by id.
///
/// Insertion order is preserved; it is the tie-breaker for path ordering.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sessions: Vec<Session>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from sessions, keeping the first of any duplicate ids.
    pub fn from_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let mut catalog = Self::new();
        for session in sessions {
            catalog.insert(session);
        }
        catalog
    }

    /// Add a session. Returns `false` when the id is already present.
    pub fn insert(&mut self, session: Session) -> bool {
        if self.index.contains_key(&session.id) {
            return false;
        }
        self.index.insert(session.id.clone(), self.sessions.len());
        self.sessions.push(session);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.index.get(id).map(|&i| &self.sessions[i])
    }

    /// Exact id, else the only session whose id starts with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Result<&Session> {
        if let Some(session) = self.get(prefix) {
            return Ok(session);
        }
        let mut matches = self.sessions.iter().filter(|s| s.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(session), None) if !prefix.is_empty() => Ok(session),
            _ => Err(Error::SessionNotFound(prefix.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Sessions at `level`, in catalog order.
    pub fn by_level(&self, level: Level) -> Vec<&Session> {
        self.sessions.iter().filter(|s| s.level == level).collect()
    }

    /// Session count per level (levels with no sessions are omitted).
    pub fn level_counts(&self) -> BTreeMap<Level, usize> {
        let mut counts = BTreeMap::new();
        for session in &self.sessions {
            *counts.entry(session.level).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Load every source in order. Earlier sources win id collisions.
    ///
    /// Never fails: unreadable sources are logged and reported.
    pub fn load(sources: &[LibrarySource], default_level: Level) -> (Catalog, LoadReport) {
        let mut catalog = Catalog::new();
        let mut report = LoadReport::default();

        for source in sources {
            let texts = match source.fetch() {
                Ok(texts) => texts,
                Err(e) => {
                    tracing::warn!(
                        source = %source.name(),
                        error = %e,
                        "Failed to load library source"
                    );
                    report.sources.push(SourceReport {
                        origin: source.name(),
                        status: SourceStatus::Failed(e.to_string()),
                        parse: ParseReport::default(),
                        duplicates: 0,
                    });
                    continue;
                }
            };

            if texts.is_empty() {
                tracing::warn!(source = %source.name(), "Library source matched no files");
                report.sources.push(SourceReport {
                    origin: source.name(),
                    status: SourceStatus::NoMatches,
                    parse: ParseReport::default(),
                    duplicates: 0,
                });
                continue;
            }

            for (origin, text) in texts {
                let source_report = match text {
                    Ok(text) => catalog.add_text(&origin, &text, default_level),
                    Err(e) => {
                        tracing::warn!(origin = %origin, error = %e, "Failed to read library file");
                        SourceReport {
                            origin,
                            status: SourceStatus::Failed(e.to_string()),
                            parse: ParseReport::default(),
                            duplicates: 0,
                        }
                    }
                };
                report.sources.push(source_report);
            }
        }

        tracing::info!(
            sessions = catalog.len(),
            sources = report.sources.len(),
            duplicates = report.duplicates(),
            "Session catalog loaded"
        );

        (catalog, report)
    }

    /// Parse one text and merge its sessions.
    fn add_text(&mut self, origin: &str, text: &str, default_level: Level) -> SourceReport {
        let outcome = parse_library(text, default_level);
        let mut added = 0;
        let mut duplicates = 0;

        for session in outcome.sessions {
            let id = session.id.clone();
            if self.insert(session) {
                added += 1;
            } else {
                tracing::debug!(origin, id = %id, "Skipping duplicate session id");
                duplicates += 1;
            }
        }

        // A source whose sessions were all duplicates still counts as loaded
        let status = if added > 0 || outcome.report.sessions_parsed > 0 {
            SourceStatus::Loaded
        } else if outcome.report.blocks_seen + outcome.report.unterminated_blocks > 0 {
            SourceStatus::NoValidSessions
        } else {
            SourceStatus::Empty
        };

        SourceReport {
            origin: origin.to_string(),
            status,
            parse: outcome.report,
            duplicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_library_parses_cleanly() {
        let outcome = parse_library(STARTER_LIBRARY, Level::A2);
        assert!(outcome.report.is_clean(), "{:?}", outcome.report);
        assert!(outcome.sessions.len() >= 5);

        let coffee = outcome
            .sessions
            .iter()
            .find(|s| s.id == "a2-path-01")
            .unwrap();
        assert_eq!(coffee.title, "Order coffee");
        assert_eq!(coffee.total_minutes(), 60);
        assert_eq!(coffee.twists.len(), 2);
    }

    #[test]
    fn test_first_source_wins_on_duplicate_id() {
        let override_text = "\
BEGIN PERFECT HOUR SESSION
ID: a2-path-01
Title: My own coffee session
Level: A2
PHASE 1: Talk (10m)
END PERFECT HOUR SESSION";
        let sources = vec![
            LibrarySource::Text {
                origin: "mine".to_string(),
                text: override_text.to_string(),
            },
            LibrarySource::Starter,
        ];
        let (catalog, report) = Catalog::load(&sources, Level::A2);

        assert_eq!(catalog.get("a2-path-01").unwrap().title, "My own coffee session");
        assert_eq!(report.sources[1].duplicates, 1);
        assert_eq!(report.duplicates(), 1);
    }

    #[test]
    fn test_load_report_statuses() {
        let sources = vec![
            LibrarySource::Text {
                origin: "empty".to_string(),
                text: "just notes".to_string(),
            },
            LibrarySource::Text {
                origin: "invalid".to_string(),
                text: "BEGIN PERFECT HOUR SESSION\nLevel: B1\nEND PERFECT HOUR SESSION".to_string(),
            },
            LibrarySource::Files("[".to_string()),
        ];
        let (catalog, report) = Catalog::load(&sources, Level::A2);

        assert!(catalog.is_empty());
        assert_eq!(report.sources[0].status, SourceStatus::Empty);
        assert_eq!(report.sources[1].status, SourceStatus::NoValidSessions);
        assert!(matches!(report.sources[2].status, SourceStatus::Failed(_)));
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_files_source_reads_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("one.txt"),
            "BEGIN PERFECT HOUR SESSION\nTitle: From file\nLevel: C1\nPHASE 1: Talk (10m)\nEND PERFECT HOUR SESSION",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.md"), "BEGIN PERFECT HOUR SESSION").unwrap();

        let pattern = dir.path().join("*.txt").to_string_lossy().into_owned();
        let (catalog, report) = Catalog::load(&[LibrarySource::Files(pattern)], Level::A2);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.by_level(Level::C1).len(), 1);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].status, SourceStatus::Loaded);
    }

    #[test]
    fn test_glob_without_matches_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir
            .path()
            .join("missing/*.txt")
            .to_string_lossy()
            .into_owned();
        let sources = vec![LibrarySource::Files(pattern.clone()), LibrarySource::Starter];
        let (catalog, report) = Catalog::load(&sources, Level::A2);

        assert!(!catalog.is_empty());
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[0].origin, pattern);
        assert_eq!(report.sources[0].status, SourceStatus::NoMatches);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.sources[1].status, SourceStatus::Loaded);
    }

    #[test]
    fn test_level_counts() {
        let (catalog, _) = Catalog::load(&[LibrarySource::Starter], Level::A2);
        let counts = catalog.level_counts();
        assert_eq!(counts.get(&Level::A2), Some(&2));
        assert!(!counts.contains_key(&Level::C2));
    }

    #[test]
    fn test_resolve_by_id_or_unique_prefix() {
        let (catalog, _) = Catalog::load(&[LibrarySource::Starter], Level::A2);
        assert_eq!(catalog.resolve("a2-path-02").unwrap().title, "Ask for directions");
        assert_eq!(catalog.resolve("b1-").unwrap().id, "b1-path-01");
        assert!(matches!(
            catalog.resolve("a2-path"),
            Err(Error::SessionNotFound(_))
        ));
        assert!(catalog.resolve("").is_err());
    }
}
