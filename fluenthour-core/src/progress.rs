//! Progress statistics for the stats view.
//!
//! Combines the progress store with the loaded catalog: hours practised
//! against the goal, and completed versus available sessions per level.

use crate::db::Database;
use crate::error::Result;
use crate::library::Catalog;
use crate::types::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Practice hours measured against the configured goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub goal_hours: u32,
    pub practiced_seconds: u64,
}

impl GoalProgress {
    pub fn new(goal_hours: u32, practiced_seconds: u64) -> Self {
        Self {
            goal_hours,
            practiced_seconds,
        }
    }

    pub fn practiced_hours(&self) -> f64 {
        self.practiced_seconds as f64 / 3600.0
    }

    /// Fraction of the goal reached, capped at 1.0.
    pub fn fraction(&self) -> f64 {
        if self.goal_hours == 0 {
            return 1.0;
        }
        (self.practiced_hours() / f64::from(self.goal_hours)).min(1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }

    pub fn remaining_seconds(&self) -> u64 {
        (u64::from(self.goal_hours) * 3600).saturating_sub(self.practiced_seconds)
    }

    pub fn is_reached(&self) -> bool {
        self.remaining_seconds() == 0
    }
}

/// Per-level counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    /// Sessions available in the catalog
    pub available: usize,
    /// Available sessions already completed
    pub completed: usize,
    pub practiced_seconds: u64,
}

/// Everything the stats view shows.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSummary {
    pub goal: GoalProgress,
    pub levels: BTreeMap<Level, LevelProgress>,
    pub last_practice_at: Option<DateTime<Utc>>,
}

impl ProgressSummary {
    /// Build the summary. Completions of sessions no longer in the catalog
    /// still count towards practice time but not towards level coverage.
    pub fn load(db: &Database, catalog: &Catalog, goal_hours: u32) -> Result<Self> {
        let goal = GoalProgress::new(goal_hours, db.total_practice_seconds()?);
        let completed = db.completed_ids(None)?;
        let practice = db.practice_seconds_by_level()?;

        let mut levels: BTreeMap<Level, LevelProgress> = BTreeMap::new();
        for session in catalog.sessions() {
            let entry = levels.entry(session.level).or_default();
            entry.available += 1;
            if completed.contains(&session.id) {
                entry.completed += 1;
            }
        }
        for (level, seconds) in practice {
            levels.entry(level).or_default().practiced_seconds = seconds;
        }

        Ok(Self {
            goal,
            levels,
            last_practice_at: db.last_practice_at()?,
        })
    }
}
