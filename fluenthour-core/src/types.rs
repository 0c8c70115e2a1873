//! Core domain types for fluenthour
//!
//! These are the records produced by the library parser and consumed by the
//! selection strategy and the session runner.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One guided speaking exercise (nominally an hour) made of ordered phases |
//! | **Phase** | A timed segment of a session with its own purpose, steps and helper script |
//! | **Level** | One of six proficiency tiers used to bucket sessions and progress |
//! | **Partner** | Who the learner practises with: a human, an AI, or either |
//! | **Twist** | An optional complication the partner can throw in to raise difficulty |
//!
//! Sessions are immutable once parsed. Parsing the same block twice yields the
//! same id and the same content, so sessions from several sources can be merged
//! by id.

use serde::{Deserialize, Serialize};

// ============================================
// Level
// ============================================

/// Proficiency tier, ordered from beginner to near-native.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Level {
    A1,
    #[default]
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 6] = [
        Level::A1,
        Level::A2,
        Level::B1,
        Level::B2,
        Level::C1,
        Level::C2,
    ];

    /// Canonical code as written in library files ("A1" .. "C2")
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
            Level::C1 => "C1",
            Level::C2 => "C2",
        }
    }

    /// Human-friendly tier name
    pub fn display_name(&self) -> &'static str {
        match self {
            Level::A1 => "Beginner",
            Level::A2 => "Elementary",
            Level::B1 => "Intermediate",
            Level::B2 => "Upper intermediate",
            Level::C1 => "Advanced",
            Level::C2 => "Near-native",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A1" => Ok(Level::A1),
            "A2" => Ok(Level::A2),
            "B1" => Ok(Level::B1),
            "B2" => Ok(Level::B2),
            "C1" => Ok(Level::C1),
            "C2" => Ok(Level::C2),
            _ => Err(format!("unknown level: {}", s)),
        }
    }
}

// ============================================
// Partner
// ============================================

/// Who the learner practises with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partner {
    Human,
    Ai,
    #[default]
    Either,
}

impl Partner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partner::Human => "human",
            Partner::Ai => "ai",
            Partner::Either => "either",
        }
    }

    /// Returns the display name for this partner kind
    pub fn display_name(&self) -> &'static str {
        match self {
            Partner::Human => "Human partner",
            Partner::Ai => "AI partner",
            Partner::Either => "Human or AI partner",
        }
    }
}

impl std::fmt::Display for Partner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Session & Phase
// ============================================

/// Where a session id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// Written as an `ID:` field in the source text
    Explicit,
    /// Hashed from level, title and context
    Derived,
}

/// A timed segment of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Display name ("Phase N" when the source gives none)
    pub title: String,
    /// Duration in minutes, always within 1..=90
    pub minutes: u32,
    /// One-line rationale shown to the learner
    pub purpose: Option<String>,
    /// Steps in execution order
    pub learner_steps: Vec<String>,
    /// Instructions for the human or AI partner, lines joined with `\n`
    pub helper_script: Option<String>,
}

impl Phase {
    /// Countdown length for this phase.
    pub fn duration_seconds(&self) -> u32 {
        self.minutes.max(1) * 60
    }
}

/// One guided speaking exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier (explicit `ID:` or `{level}_{hash}`)
    pub id: String,
    /// Whether `id` was written in the source or derived
    pub id_source: IdSource,
    pub title: String,
    pub level: Level,
    pub partner: Partner,
    /// Goal statement, often tied to a benchmark such as CLB
    pub goal: Option<String>,
    /// Scenario the learner is placed in
    pub context: Option<String>,
    /// What the partner should correct and how
    pub correction: Option<String>,
    /// Topic bucket used as an optional selection bias
    pub category: Option<String>,
    pub twists: Vec<String>,
    /// Never empty
    pub phases: Vec<Phase>,
}

impl Session {
    /// Sum of all phase durations in minutes.
    pub fn total_minutes(&self) -> u32 {
        self.phases.iter().map(|p| p.minutes).sum()
    }

    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn is_last_phase(&self, index: usize) -> bool {
        index + 1 >= self.phases.len()
    }

    /// Case-insensitive category match.
    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case(category.trim()))
            .unwrap_or(false)
    }
}

// ============================================
// Modes
// ============================================

/// How the next session is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Uniform pick that avoids recently shown sessions
    #[default]
    Random,
    /// Deterministic walk through the level, first incomplete session wins
    Path,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Random => "random",
            SelectionMode::Path => "path",
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SelectionMode::Random),
            "path" => Ok(SelectionMode::Path),
            _ => Err(format!("unknown selection mode: {}", s)),
        }
    }
}

/// What the runner does when a phase countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseBoundary {
    /// Stop in `PhaseComplete` until the learner acknowledges
    #[default]
    Autopause,
    /// Start the next phase countdown immediately
    AutoContinue,
}

impl std::str::FromStr for PhaseBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "autopause" | "pause" => Ok(PhaseBoundary::Autopause),
            "auto_continue" | "continue" => Ok(PhaseBoundary::AutoContinue),
            _ => Err(format!("unknown phase boundary: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(minutes: u32) -> Phase {
        Phase {
            title: "Warm-up".to_string(),
            minutes,
            purpose: None,
            learner_steps: vec![],
            helper_script: None,
        }
    }

    #[test]
    fn test_level_ordering_and_parse() {
        assert!(Level::A1 < Level::C2);
        assert_eq!(Level::ALL.len(), 6);
        assert_eq!("b2".parse::<Level>().unwrap(), Level::B2);
        assert!("D1".parse::<Level>().is_err());
        assert_eq!(Level::C2.display_name(), "Near-native");
    }

    #[test]
    fn test_level_serde_uses_codes() {
        let json = serde_json::to_string(&Level::B1).unwrap();
        assert_eq!(json, "\"B1\"");
    }

    #[test]
    fn test_session_totals() {
        let session = Session {
            id: "a2_deadbeef".to_string(),
            id_source: IdSource::Derived,
            title: "Order coffee".to_string(),
            level: Level::A2,
            partner: Partner::Either,
            goal: None,
            context: None,
            correction: None,
            category: Some("Food".to_string()),
            twists: vec![],
            phases: vec![phase(5), phase(10)],
        };
        assert_eq!(session.total_minutes(), 15);
        assert!(session.is_last_phase(1));
        assert!(!session.is_last_phase(0));
        assert!(session.in_category(" food "));
        assert_eq!(session.phases[0].duration_seconds(), 300);
    }

    #[test]
    fn test_selection_mode_parse() {
        assert_eq!("PATH".parse::<SelectionMode>().unwrap(), SelectionMode::Path);
        assert!("shuffle".parse::<SelectionMode>().is_err());
    }

    #[test]
    fn test_phase_boundary_parse() {
        assert_eq!(
            "auto-continue".parse::<PhaseBoundary>().unwrap(),
            PhaseBoundary::AutoContinue
        );
        assert_eq!(
            "Autopause".parse::<PhaseBoundary>().unwrap(),
            PhaseBoundary::Autopause
        );
        assert!("later".parse::<PhaseBoundary>().is_err());
    }
}
