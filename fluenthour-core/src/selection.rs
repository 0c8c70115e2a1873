//! Session selection strategy
//!
//! Two ways to choose the next session at a level:
//!
//! - **Random with variety**: uniform pick that avoids the last few sessions
//!   shown at that level, optionally biased towards a category.
//! - **Path**: deterministic walk in path order; the first session not yet
//!   completed wins.
//!
//! Selection never fails. An empty level yields `None`.

use crate::config::SelectionConfig;
use crate::library::{identity, Catalog};
use crate::types::{IdSource, Level, Session};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};

pub const DEFAULT_RECENT_WINDOW: usize = 6;
pub const DEFAULT_RECENT_CAP: usize = 24;

// ============================================
// Recency history
// ============================================

/// Ids shown per level, most recent first.
///
/// Persisted as JSON in the progress store between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentHistory {
    levels: BTreeMap<Level, VecDeque<String>>,
}

impl RecentHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recent ids at `level`, most recent first.
    pub fn recent(&self, level: Level) -> impl Iterator<Item = &str> {
        self.levels
            .get(&level)
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    /// Move `id` to the front of the level's list and trim to `cap`.
    pub fn record(&mut self, level: Level, id: &str, cap: usize) {
        let ids = self.levels.entry(level).or_default();
        ids.retain(|existing| existing != id);
        ids.push_front(id.to_string());
        ids.truncate(cap.max(1));
    }

    pub fn clear_level(&mut self, level: Level) {
        self.levels.remove(&level);
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.levels.values().all(VecDeque::is_empty)
    }
}

// ============================================
// Path order
// ============================================

/// Sort key for path mode.
///
/// Explicit ids with a numeric suffix come first in numeric order; everything
/// else follows, ordered by case-insensitive title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PathKey {
    Numbered(u64),
    Titled(String),
}

fn path_key(session: &Session) -> PathKey {
    let numbered = match session.id_source {
        IdSource::Explicit => identity::numeric_suffix(&session.id),
        IdSource::Derived => None,
    };
    match numbered {
        Some(n) => PathKey::Numbered(n),
        None => PathKey::Titled(session.title.to_lowercase()),
    }
}

/// Stable sort into path order; ties keep their incoming order.
pub fn path_order<'a>(mut sessions: Vec<&'a Session>) -> Vec<&'a Session> {
    sessions.sort_by_key(|s| path_key(s));
    sessions
}

// ============================================
// Selector
// ============================================

/// Selection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    /// Recent ids at a level excluded from random picks
    pub recent_window: usize,
    /// Length the per-level recency list is trimmed to
    pub recent_cap: usize,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW, DEFAULT_RECENT_CAP)
    }
}

impl Selector {
    /// The cap never drops below the window.
    pub fn new(recent_window: usize, recent_cap: usize) -> Self {
        Self {
            recent_window,
            recent_cap: recent_cap.max(recent_window),
        }
    }

    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.recent_window, config.recent_cap)
    }

    /// Random-with-variety pick. Records the pick in `history`.
    pub fn pick_random<'a, R: Rng + ?Sized>(
        &self,
        catalog: &'a Catalog,
        level: Level,
        category: Option<&str>,
        history: &mut RecentHistory,
        rng: &mut R,
    ) -> Option<&'a Session> {
        let pool = catalog.by_level(level);
        if pool.is_empty() {
            return None;
        }

        // Category bias only applies when it leaves something to pick from
        let pool = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(category) => {
                let biased: Vec<_> = pool
                    .iter()
                    .copied()
                    .filter(|s| s.in_category(category))
                    .collect();
                if biased.is_empty() {
                    pool
                } else {
                    biased
                }
            }
            None => pool,
        };

        let excluded: HashSet<&str> = history.recent(level).take(self.recent_window).collect();
        let fresh: Vec<&Session> = pool
            .iter()
            .copied()
            .filter(|s| !excluded.contains(s.id.as_str()))
            .collect();
        let candidates = if fresh.is_empty() { &pool } else { &fresh };

        let chosen = *candidates.choose(rng)?;
        history.record(level, &chosen.id, self.recent_cap);

        tracing::debug!(
            level = %level,
            id = %chosen.id,
            candidates = candidates.len(),
            "Picked random session"
        );

        Some(chosen)
    }

    /// Path pick: first session in path order not in `completed`, else the first.
    pub fn pick_path<'a>(
        &self,
        catalog: &'a Catalog,
        level: Level,
        completed: &HashSet<String>,
    ) -> Option<&'a Session> {
        let ordered = path_order(catalog.by_level(level));
        let chosen = ordered
            .iter()
            .copied()
            .find(|s| !completed.contains(&s.id))
            .or_else(|| ordered.first().copied())?;

        tracing::debug!(level = %level, id = %chosen.id, "Picked path session");
        Some(chosen)
    }
}
