//! Database repository layer
//!
//! Persists learner progress: completions, practice time, selection history,
//! imported library text and small key/value settings.

use crate::error::Result;
use crate::runner::ProgressUpdate;
use crate::selection::RecentHistory;
use crate::types::Level;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key holding the serialized [`RecentHistory`].
pub const HISTORY_KEY: &str = "selection.history";

/// Key holding the last level the learner practised at.
pub const LAST_LEVEL_KEY: &str = "selection.last_level";

/// A completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub session_id: String,
    pub level: Level,
    pub completed_at: DateTime<Utc>,
}

/// Library text imported by the learner.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    /// Hex sha256 of the normalized content
    pub hash: String,
    pub content: String,
    /// Sessions the text parsed to when imported
    pub session_count: i64,
    pub imported_at: DateTime<Utc>,
}

/// Database handle (single connection)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// A panic while holding the lock leaves the connection itself usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Runner updates
    // ============================================

    /// Persist one update drained from the session runner.
    ///
    /// Returns `false` for a completion that was already recorded.
    pub fn apply_update(&self, update: &ProgressUpdate) -> Result<bool> {
        match update {
            ProgressUpdate::PracticeTime {
                session_id,
                level,
                seconds,
                at,
            } => {
                self.add_practice_time(session_id, *level, *seconds, *at)?;
                Ok(true)
            }
            ProgressUpdate::Completed {
                session_id,
                level,
                at,
            } => self.record_completion(session_id, *level, *at),
        }
    }

    // ============================================
    // Completions
    // ============================================

    /// Record a completion. Returns `false` if the session was already complete.
    pub fn record_completion(
        &self,
        session_id: &str,
        level: Level,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO completions (session_id, level, completed_at) VALUES (?1, ?2, ?3)",
            params![session_id, level.as_str(), at.to_rfc3339()],
        )?;
        if inserted == 0 {
            tracing::debug!(session_id, "Completion already recorded");
        }
        Ok(inserted > 0)
    }

    /// Ids of completed sessions, optionally limited to one level.
    pub fn completed_ids(&self, level: Option<Level>) -> Result<HashSet<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id FROM completions WHERE ?1 IS NULL OR level = ?1",
        )?;
        let ids = stmt
            .query_map([level.map(|l| l.as_str())], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    pub fn is_completed(&self, session_id: &str) -> Result<bool> {
        let conn = self.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM completions WHERE session_id = ?",
                [session_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Completed session count per level.
    pub fn completion_counts(&self) -> Result<BTreeMap<Level, u64>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT level, COUNT(*) FROM completions GROUP BY level")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .filter_map(|r| r.ok())
            .filter_map(|(level, count)| Some((level.parse().ok()?, count.max(0) as u64)))
            .collect();
        Ok(counts)
    }

    /// Most recent completions first.
    pub fn recent_completions(&self, limit: usize) -> Result<Vec<CompletionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id, level, completed_at FROM completions
             ORDER BY completed_at DESC LIMIT ?",
        )?;
        let records = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(session_id, level, completed_at)| {
                Some(CompletionRecord {
                    session_id,
                    level: level.parse().ok()?,
                    completed_at: parse_timestamp(&completed_at),
                })
            })
            .collect();
        Ok(records)
    }

    /// Forget completions at one level, or all of them.
    pub fn clear_completions(&self, level: Option<Level>) -> Result<usize> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM completions WHERE ?1 IS NULL OR level = ?1",
            [level.map(|l| l.as_str())],
        )?;
        tracing::info!(removed, level = ?level, "Cleared completions");
        Ok(removed)
    }

    // ============================================
    // Practice time
    // ============================================

    pub fn add_practice_time(
        &self,
        session_id: &str,
        level: Level,
        seconds: u64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if seconds == 0 {
            return Ok(());
        }
        let conn = self.lock();
        conn.execute(
            "INSERT INTO practice_log (session_id, level, seconds, logged_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                level.as_str(),
                i64::try_from(seconds).unwrap_or(i64::MAX),
                at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn total_practice_seconds(&self) -> Result<u64> {
        let conn = self.lock();
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(seconds), 0) FROM practice_log",
            [],
            |r| r.get(0),
        )?;
        Ok(total.max(0) as u64)
    }

    pub fn practice_seconds_by_level(&self) -> Result<BTreeMap<Level, u64>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT level, SUM(seconds) FROM practice_log GROUP BY level")?;
        let totals = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .filter_map(|r| r.ok())
            .filter_map(|(level, seconds)| Some((level.parse().ok()?, seconds.max(0) as u64)))
            .collect();
        Ok(totals)
    }

    /// When the learner last practised.
    pub fn last_practice_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock();
        let last: Option<String> = conn.query_row(
            "SELECT MAX(logged_at) FROM practice_log",
            [],
            |r| r.get(0),
        )?;
        Ok(last.map(|s| parse_timestamp(&s)))
    }

    pub fn clear_practice_log(&self) -> Result<usize> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM practice_log", [])?)
    }

    // ============================================
    // Key/value
    // ============================================

    pub fn get_kv(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn put_kv(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_kv(&self, key: &str) -> Result<bool> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM kv WHERE key = ?", [key])? > 0)
    }

    /// Load the selection history. A corrupt value is logged and replaced by an empty history.
    pub fn load_history(&self) -> Result<RecentHistory> {
        let Some(json) = self.get_kv(HISTORY_KEY)? else {
            return Ok(RecentHistory::default());
        };
        match serde_json::from_str(&json) {
            Ok(history) => Ok(history),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable selection history");
                Ok(RecentHistory::default())
            }
        }
    }

    pub fn save_history(&self, history: &RecentHistory) -> Result<()> {
        let json = serde_json::to_string(history)?;
        self.put_kv(HISTORY_KEY, &json)
    }

    pub fn last_level(&self) -> Result<Option<Level>> {
        Ok(self.get_kv(LAST_LEVEL_KEY)?.and_then(|v| v.parse().ok()))
    }

    pub fn set_last_level(&self, level: Level) -> Result<()> {
        self.put_kv(LAST_LEVEL_KEY, level.as_str())
    }

    // ============================================
    // Imports
    // ============================================

    /// Store imported text. Returns `false` when identical text is already stored.
    pub fn insert_import(&self, text: &str, session_count: usize) -> Result<bool> {
        let content = normalize_import(text);
        let hash = import_hash(&content);
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO imports (hash, content, session_count, imported_at) VALUES (?1, ?2, ?3, ?4)",
            params![hash, content, session_count as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    /// Imports in the order they were added.
    pub fn list_imports(&self) -> Result<Vec<ImportRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT hash, content, session_count, imported_at FROM imports ORDER BY imported_at, rowid",
        )?;
        let imports = stmt
            .query_map([], |row| {
                let imported_at: String = row.get(3)?;
                Ok(ImportRecord {
                    hash: row.get(0)?,
                    content: row.get(1)?,
                    session_count: row.get(2)?,
                    imported_at: parse_timestamp(&imported_at),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(imports)
    }

    /// Delete an import by full hash or unique prefix.
    pub fn delete_import(&self, hash_prefix: &str) -> Result<usize> {
        let conn = self.lock();
        let pattern = format!("{}%", hash_prefix.trim().to_lowercase());
        Ok(conn.execute("DELETE FROM imports WHERE hash LIKE ?", [pattern])?)
    }
}

/// Line endings unified and surrounding whitespace trimmed.
fn normalize_import(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

/// Hex sha256 used to de-duplicate imports.
pub fn import_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_import(text).as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_completion_insert_is_idempotent() {
        let db = test_db();
        assert!(db.record_completion("a2-path-01", Level::A2, at(9)).unwrap());
        assert!(!db.record_completion("a2-path-01", Level::A2, at(10)).unwrap());

        let recent = db.recent_completions(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].completed_at, at(9));
        assert!(db.is_completed("a2-path-01").unwrap());
    }

    #[test]
    fn test_completed_ids_by_level() {
        let db = test_db();
        db.record_completion("a", Level::A2, at(1)).unwrap();
        db.record_completion("b", Level::B1, at(2)).unwrap();

        assert_eq!(db.completed_ids(None).unwrap().len(), 2);
        let a2 = db.completed_ids(Some(Level::A2)).unwrap();
        assert!(a2.contains("a") && !a2.contains("b"));

        let counts = db.completion_counts().unwrap();
        assert_eq!(counts.get(&Level::B1), Some(&1));

        assert_eq!(db.clear_completions(Some(Level::A2)).unwrap(), 1);
        assert_eq!(db.completed_ids(None).unwrap().len(), 1);
        assert_eq!(db.clear_completions(None).unwrap(), 1);
    }

    #[test]
    fn test_apply_runner_updates() {
        let db = test_db();
        let updates = [
            ProgressUpdate::PracticeTime {
                session_id: "s".to_string(),
                level: Level::A2,
                seconds: 300,
                at: at(8),
            },
            ProgressUpdate::PracticeTime {
                session_id: "s".to_string(),
                level: Level::A2,
                seconds: 60,
                at: at(9),
            },
            ProgressUpdate::Completed {
                session_id: "s".to_string(),
                level: Level::A2,
                at: at(9),
            },
        ];
        for update in &updates {
            assert!(db.apply_update(update).unwrap());
        }
        assert!(!db.apply_update(&updates[2]).unwrap());

        assert_eq!(db.total_practice_seconds().unwrap(), 360);
        assert_eq!(
            db.practice_seconds_by_level().unwrap().get(&Level::A2),
            Some(&360)
        );
        assert_eq!(db.last_practice_at().unwrap(), Some(at(9)));
    }

    #[test]
    fn test_zero_practice_time_is_not_logged() {
        let db = test_db();
        db.add_practice_time("s", Level::C1, 0, at(1)).unwrap();
        assert_eq!(db.total_practice_seconds().unwrap(), 0);
        assert_eq!(db.last_practice_at().unwrap(), None);
    }

    #[test]
    fn test_history_round_trip() {
        let db = test_db();
        assert!(db.load_history().unwrap().is_empty());

        let mut history = RecentHistory::new();
        history.record(Level::B2, "x", 24);
        db.save_history(&history).unwrap();
        assert_eq!(db.load_history().unwrap(), history);

        db.put_kv(HISTORY_KEY, "not json").unwrap();
        assert!(db.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_kv_and_last_level() {
        let db = test_db();
        assert_eq!(db.last_level().unwrap(), None);
        db.set_last_level(Level::C1).unwrap();
        db.set_last_level(Level::B1).unwrap();
        assert_eq!(db.last_level().unwrap(), Some(Level::B1));
        assert!(db.delete_kv(LAST_LEVEL_KEY).unwrap());
        assert!(!db.delete_kv(LAST_LEVEL_KEY).unwrap());
    }

    #[test]
    fn test_import_dedup_by_content_hash() {
        let db = test_db();
        let text = "BEGIN PERFECT HOUR SESSION\nTitle: x\nEND PERFECT HOUR SESSION\n";
        assert!(db.insert_import(text, 1).unwrap());
        assert!(!db.insert_import(&text.replace('\n', "\r\n"), 1).unwrap());

        let imports = db.list_imports().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].hash, import_hash(text));
        assert_eq!(imports[0].hash.len(), 64);

        assert_eq!(db.delete_import(&imports[0].hash[..8]).unwrap(), 1);
        assert!(db.list_imports().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert!(path.exists());
    }
}
