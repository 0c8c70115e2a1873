//! Session library text parser
//!
//! Converts a library text blob into [`Session`] records.
//!
//! ## Format
//!
//! ```text
//! BEGIN PERFECT HOUR SESSION
//! ID: a2-path-01            (optional)
//! Title: Order coffee
//! Level: A2
//! Partner: human or AI
//! Goal (CLB): ...
//! Context: ...
//!
//! PHASE 1: Warm-up (5m)
//! Purpose: ...
//! Human steps:
//! * Say hello
//! AI helper script: ...
//!
//! Twists:
//! * The cafe is out of milk
//! END PERFECT HOUR SESSION
//! ```
//!
//! # Error Handling
//!
//! The parser never fails. It is written for text authored by people and by
//! AI models, so it degrades instead of rejecting:
//!
//! - **Text outside BEGIN/END pairs**: ignored.
//! - **Unterminated blocks** (EOF or a second BEGIN before END): dropped and
//!   counted in [`ParseReport::unterminated_blocks`].
//! - **Blocks without a title or without phases**: dropped and recorded in
//!   [`ParseReport::dropped`].
//! - **Missing, zero or absurd minutes**: clamped to 1..=90 or inferred from the
//!   phase position and name.
//! - **Unknown `Key: value` lines**: ignored, or kept as content while a step
//!   list, twist list or helper script is open.

use crate::library::identity;
use crate::types::{Level, Partner, Phase, Session};
use once_cell::sync::Lazy;
use regex::Regex;

/// Line that opens a session block.
pub const BEGIN_MARKER: &str = "BEGIN PERFECT HOUR SESSION";
/// Line that closes a session block.
pub const END_MARKER: &str = "END PERFECT HOUR SESSION";

/// Shortest accepted phase.
pub const MIN_PHASE_MINUTES: u32 = 1;
/// Longest accepted phase.
pub const MAX_PHASE_MINUTES: u32 = 90;

static LEVEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b([abc][12])\b").unwrap());

/// `PHASE <n>` optionally followed by a separator, or a bracketed duration.
static PHASE_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^phase\s*(\d{1,3})\s*(?:$|[:.)\-–—]\s*(.*)$|([(\[].*)$)").unwrap()
});

/// `<name> (<n>m)` with `m`, `min`, `mins` or `minutes`, in round or square brackets.
static BRACKETED_MINUTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s*[(\[]\s*(\d{1,6})\s*(?:m|mins?|minutes?)\.?\s*[)\]]\s*$").unwrap()
});

/// `<name> - <n> min` without brackets.
static TRAILING_MINUTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)\s*[\-–—:,]\s*(\d{1,6})\s*(?:m|mins?|minutes?)\.?\s*$").unwrap()
});

static FIRST_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// ============================================
// Report types
// ============================================

/// Why a complete block did not become a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingTitle,
    NoPhases,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::MissingTitle => write!(f, "missing title"),
            DropReason::NoPhases => write!(f, "no phases"),
        }
    }
}

/// A complete block that failed the validity gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedBlock {
    /// Zero-based position among the complete blocks of the input
    pub index: usize,
    pub reason: DropReason,
    /// Title, when the block had one
    pub title: Option<String>,
}

/// Diagnostics for one parse: blocks seen versus sessions produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Complete BEGIN/END blocks found
    pub blocks_seen: usize,
    /// BEGIN markers never closed before EOF or the next BEGIN
    pub unterminated_blocks: usize,
    /// Blocks that became sessions
    pub sessions_parsed: usize,
    /// Complete blocks rejected by the validity gate
    pub dropped: Vec<DroppedBlock>,
}

impl ParseReport {
    /// True when every block seen became a session.
    pub fn is_clean(&self) -> bool {
        self.unterminated_blocks == 0 && self.dropped.is_empty()
    }

    /// Fold another report into this one (for multi-source loads).
    pub fn merge(&mut self, other: &ParseReport) {
        let offset = self.blocks_seen;
        self.blocks_seen += other.blocks_seen;
        self.unterminated_blocks += other.unterminated_blocks;
        self.sessions_parsed += other.sessions_parsed;
        self.dropped
            .extend(other.dropped.iter().cloned().map(|mut d| {
                d.index += offset;
                d
            }));
    }
}

/// Sessions plus the report describing how they were obtained.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub sessions: Vec<Session>,
    pub report: ParseReport,
}

// ============================================
// Block extraction
// ============================================

/// Raw content lines of complete blocks, plus the unterminated count.
#[derive(Debug, Default)]
pub struct BlockScan<'a> {
    pub blocks: Vec<Vec<&'a str>>,
    pub unterminated: usize,
}

/// Trim marker decoration such as `===`, `###` or `**` around a line.
fn strip_decoration(line: &str) -> &str {
    line.trim_matches(|c: char| matches!(c, '#' | '*' | '_' | '=' | '`' | '>') || c.is_whitespace())
}

/// If `line` starts with `marker` (case-insensitive), return the rest of the line.
fn after_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    if !head.eq_ignore_ascii_case(marker) {
        return None;
    }
    let rest = &line[marker.len()..];
    if rest.starts_with(|c: char| c.is_alphanumeric()) {
        return None;
    }
    Some(strip_decoration(rest))
}

/// If `line` ends with `marker` (case-insensitive), return what precedes it.
fn before_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let split = line.len().checked_sub(marker.len())?;
    let tail = line.get(split..)?;
    if !tail.eq_ignore_ascii_case(marker) {
        return None;
    }
    let before = &line[..split];
    if before.ends_with(|c: char| c.is_alphanumeric()) {
        return None;
    }
    Some(strip_decoration(before))
}

/// Split library text into the content lines of complete blocks.
///
/// Two-state scan: outside a block everything is ignored; inside, lines are
/// collected until END. A BEGIN inside a block abandons the open block.
pub fn extract_blocks(text: &str) -> BlockScan<'_> {
    let mut scan = BlockScan::default();
    let mut current: Option<Vec<&str>> = None;

    for raw in text.lines() {
        let line = raw.trim();
        let bare = strip_decoration(line);

        if let Some(rest) = after_marker(bare, BEGIN_MARKER) {
            if current.take().is_some() {
                scan.unterminated += 1;
            }
            let mut lines = Vec::new();
            if !rest.is_empty() {
                lines.push(rest);
            }
            current = Some(lines);
            continue;
        }

        if let Some(before) = before_marker(bare, END_MARKER) {
            if let Some(mut lines) = current.take() {
                if !before.is_empty() {
                    lines.push(before);
                }
                scan.blocks.push(lines);
            }
            continue;
        }

        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }

    if current.is_some() {
        scan.unterminated += 1;
    }

    scan
}

// ============================================
// Field table
// ============================================

/// Every label the grammar recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Level,
    Partner,
    Goal,
    Context,
    Correction,
    Category,
    Twists,
    PhaseName,
    PhaseMinutes,
    Purpose,
    LearnerSteps,
    HelperScript,
}

impl Field {
    /// Fields that open a multi-line capture and may appear without a colon.
    fn opens_capture(self) -> bool {
        matches!(self, Field::Twists | Field::LearnerSteps | Field::HelperScript)
    }
}

/// Normalized label to field, tried in order.
const FIELD_LABELS: &[(&str, Field)] = &[
    ("id", Field::Id),
    ("session id", Field::Id),
    ("title", Field::Title),
    ("session title", Field::Title),
    ("level", Field::Level),
    ("cefr level", Field::Level),
    ("target level", Field::Level),
    ("partner", Field::Partner),
    ("partner type", Field::Partner),
    ("practice partner", Field::Partner),
    ("goal", Field::Goal),
    ("goals", Field::Goal),
    ("context", Field::Context),
    ("scenario", Field::Context),
    ("situation", Field::Context),
    ("correction", Field::Correction),
    ("corrections", Field::Correction),
    ("correction focus", Field::Correction),
    ("correction style", Field::Correction),
    ("category", Field::Category),
    ("topic", Field::Category),
    ("twists", Field::Twists),
    ("twist", Field::Twists),
    ("optional twists", Field::Twists),
    ("complications", Field::Twists),
    ("name", Field::PhaseName),
    ("phase name", Field::PhaseName),
    ("phase title", Field::PhaseName),
    ("minutes", Field::PhaseMinutes),
    ("duration", Field::PhaseMinutes),
    ("length", Field::PhaseMinutes),
    ("purpose", Field::Purpose),
    ("why", Field::Purpose),
    ("human steps", Field::LearnerSteps),
    ("learner steps", Field::LearnerSteps),
    ("student steps", Field::LearnerSteps),
    ("your steps", Field::LearnerSteps),
    ("steps", Field::LearnerSteps),
    ("ai helper script", Field::HelperScript),
    ("ai helper", Field::HelperScript),
    ("helper script", Field::HelperScript),
    ("helper role", Field::HelperScript),
    ("helper", Field::HelperScript),
    ("helper prompt", Field::HelperScript),
    ("ai script", Field::HelperScript),
    ("partner script", Field::HelperScript),
    ("ai partner script", Field::HelperScript),
];

const MAX_LABEL_CHARS: usize = 40;

/// Lowercase, drop parentheticals and markdown emphasis, collapse whitespace.
fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut depth = 0usize;
    for c in label.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '*' | '_' | '#' | '`' | '>' => {}
            _ if depth == 0 => out.extend(c.to_lowercase()),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lookup_field(label: &str) -> Option<Field> {
    let normalized = normalize_label(label);
    FIELD_LABELS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, field)| *field)
}

/// Recognize a `Label: value` line, or a bare capture label such as `Twists`.
fn split_field(line: &str) -> Option<(Field, &str)> {
    let (label, value, has_colon) = match line.split_once(':') {
        Some((label, value)) => (label, value, true),
        None => (line, "", false),
    };
    if label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    let field = lookup_field(label)?;
    if !has_colon && !field.opens_capture() {
        return None;
    }
    Some((field, clean_value(value)))
}

/// Trim whitespace, leftover emphasis after `**Label:**`, and wrapping quotes.
fn clean_value(value: &str) -> &str {
    let value = value
        .trim()
        .trim_start_matches(['*', '_'])
        .trim_end_matches(['*', '_'])
        .trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('\'', '\'')] {
        if value.len() >= 2 && value.starts_with(open) && value.ends_with(close) {
            return value[open.len_utf8()..value.len() - close.len_utf8()].trim();
        }
    }
    value
}

// ============================================
// Line classification
// ============================================

/// Values read from a compact `PHASE n: Name (5m)` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CompactHeader {
    number: Option<u32>,
    name: Option<String>,
    minutes: Option<u32>,
}

/// Grammar 1: the compact phase header.
fn parse_compact_header(line: &str) -> Option<CompactHeader> {
    let caps = PHASE_HEADER_RE.captures(strip_decoration(line))?;
    let number = caps.get(1).and_then(|m| m.as_str().parse().ok());
    let rest = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| strip_decoration(m.as_str()))
        .unwrap_or_default();

    let (name, minutes) = match BRACKETED_MINUTES_RE
        .captures(rest)
        .or_else(|| TRAILING_MINUTES_RE.captures(rest))
    {
        Some(c) => (
            c.get(1).map(|m| m.as_str()).unwrap_or_default(),
            c.get(2).and_then(|m| parse_minutes(m.as_str())),
        ),
        None => (rest, None),
    };

    let name = name.trim().trim_end_matches(['-', '–', '—', ':', ',']).trim();
    Some(CompactHeader {
        number,
        name: (!name.is_empty()).then(|| name.to_string()),
        minutes,
    })
}

/// Strip one leading bullet marker (`*`, `-`, `+`, `•`, `1.`, `1)`).
fn strip_bullet(line: &str) -> Option<&str> {
    strip_spaced_bullet(line).or_else(|| strip_flush_bullet(line))
}

/// A marker followed by whitespace, such as `- item` or `1. item`.
fn strip_spaced_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let followed_by_space = |rest: &str| rest.is_empty() || rest.starts_with(char::is_whitespace);

    for marker in ['*', '-', '+', '•'] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            if followed_by_space(rest) {
                return Some(rest.trim());
            }
        }
    }

    let digits = trimmed.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=3).contains(&digits) {
        let rest = &trimmed[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if followed_by_space(after) {
                return Some(after.trim());
            }
        }
    }

    None
}

/// A `*`, `-` or `•` written flush against the text, such as `-Ask for coffee`.
///
/// Doubled markers (`**bold**`, `--`) and negative numbers (`-5`) are not bullets.
fn strip_flush_bullet(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in ['*', '-', '•'] {
        let Some(rest) = trimmed.strip_prefix(marker) else {
            continue;
        };
        let first = rest.chars().next()?;
        let is_marker = matches!(first, '*' | '-' | '•' | '+');
        let is_number = marker == '-' && first.is_ascii_digit();
        if first.is_whitespace() || is_marker || is_number {
            return None;
        }
        return Some(rest.trim_end());
    }
    None
}

#[derive(Debug)]
enum Line<'a> {
    Blank,
    PhaseHeader(CompactHeader),
    Bullet(&'a str),
    Field(Field, &'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(header) = parse_compact_header(line) {
        return Line::PhaseHeader(header);
    }
    if let Some(item) = strip_spaced_bullet(line) {
        return Line::Bullet(item);
    }
    if let Some((field, value)) = split_field(line) {
        return Line::Field(field, value);
    }
    // After fields, so `*Minutes:* 10` stays a field
    if let Some(item) = strip_flush_bullet(line) {
        return Line::Bullet(item);
    }
    Line::Text(line)
}

// ============================================
// Value parsers
// ============================================

/// First integer in `value`; oversized numbers saturate so they clamp later.
fn parse_minutes(value: &str) -> Option<u32> {
    let digits = FIRST_NUMBER_RE.find(value)?.as_str();
    Some(digits.parse::<u32>().unwrap_or(u32::MAX))
}

/// Detect one of the six level codes anywhere in the value.
pub fn detect_level(value: &str) -> Option<Level> {
    LEVEL_RE
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Read the partner kind from free text such as "Human or AI".
pub fn parse_partner(value: &str) -> Partner {
    let lower = value.to_lowercase();
    let has_word = |word: &str| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word)
    };

    let human = ["human", "person", "tutor", "teacher", "friend"]
        .iter()
        .any(|w| has_word(w));
    let ai = ["ai", "bot", "chatbot"].iter().any(|w| has_word(w));

    if has_word("either") || has_word("any") || has_word("both") || (human && ai) {
        Partner::Either
    } else if human {
        Partner::Human
    } else if ai {
        Partner::Ai
    } else {
        Partner::Either
    }
}

/// Duration for a phase whose minutes are missing or zero.
fn inferred_minutes(index: usize, title: &str) -> u32 {
    let lower = title.to_lowercase();
    let short = ["warm", "review", "wrap", "reflect", "cool"]
        .iter()
        .any(|w| lower.contains(w));
    if index == 0 || short {
        5
    } else {
        10
    }
}

fn resolve_minutes(raw: Option<u32>, index: usize, title: &str) -> u32 {
    match raw {
        Some(minutes) if minutes > 0 => minutes.clamp(MIN_PHASE_MINUTES, MAX_PHASE_MINUTES),
        _ => inferred_minutes(index, title),
    }
}

// ============================================
// Block parser
// ============================================

/// Grammar 2: structured sub-fields inside a phase body.
#[derive(Debug, Default)]
struct StructuredFields {
    name: Option<String>,
    minutes: Option<u32>,
    purpose: Option<String>,
}

#[derive(Debug)]
struct PhaseDraft {
    header: CompactHeader,
    fields: StructuredFields,
    steps: Vec<String>,
    helper_lines: Vec<String>,
}

impl PhaseDraft {
    fn new(header: CompactHeader) -> Self {
        Self {
            header,
            fields: StructuredFields::default(),
            steps: Vec::new(),
            helper_lines: Vec::new(),
        }
    }

    /// Structured sub-fields override the compact header.
    fn finish(self, index: usize) -> Phase {
        let title = self
            .fields
            .name
            .or(self.header.name)
            .unwrap_or_else(|| {
                let number = self.header.number.unwrap_or(index as u32 + 1);
                format!("Phase {}", number)
            });
        let minutes = resolve_minutes(self.fields.minutes.or(self.header.minutes), index, &title);
        let helper_script = (!self.helper_lines.is_empty()).then(|| self.helper_lines.join("\n"));

        Phase {
            title,
            minutes,
            purpose: self.fields.purpose,
            learner_steps: self.steps,
            helper_script,
        }
    }
}

/// What multi-line content is currently being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Steps,
    Helper,
    Twists,
}

#[derive(Debug, Default)]
struct SessionFields {
    id: Option<String>,
    title: Option<String>,
    level: Option<String>,
    partner: Option<String>,
    goal: Option<String>,
    context: Option<String>,
    correction: Option<String>,
    category: Option<String>,
}

/// First non-empty value wins.
fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

struct BlockParser {
    fields: SessionFields,
    twists: Vec<String>,
    phases: Vec<Phase>,
    current: Option<PhaseDraft>,
    capture: Capture,
}

impl BlockParser {
    fn new() -> Self {
        Self {
            fields: SessionFields::default(),
            twists: Vec::new(),
            phases: Vec::new(),
            current: None,
            capture: Capture::None,
        }
    }

    fn close_phase(&mut self) {
        if let Some(draft) = self.current.take() {
            let index = self.phases.len();
            self.phases.push(draft.finish(index));
        }
    }

    fn feed(&mut self, line: &str) {
        match classify(line) {
            Line::Blank => {}
            Line::PhaseHeader(header) => {
                self.close_phase();
                self.current = Some(PhaseDraft::new(header));
                self.capture = Capture::None;
            }
            Line::Field(field, value) => self.apply_field(field, value),
            Line::Bullet(item) => self.capture_item(item, line),
            Line::Text(text) => self.capture_item(text, text),
        }
    }

    fn apply_field(&mut self, field: Field, value: &str) {
        self.capture = Capture::None;

        match field {
            Field::Id => set_once(&mut self.fields.id, value),
            Field::Title => set_once(&mut self.fields.title, value),
            Field::Level => set_once(&mut self.fields.level, value),
            Field::Partner => set_once(&mut self.fields.partner, value),
            Field::Goal => set_once(&mut self.fields.goal, value),
            Field::Context => set_once(&mut self.fields.context, value),
            Field::Correction => set_once(&mut self.fields.correction, value),
            Field::Category => set_once(&mut self.fields.category, value),
            Field::Twists => {
                self.capture = Capture::Twists;
                if !value.is_empty() && !value.eq_ignore_ascii_case("none") {
                    self.push_item(strip_bullet(value).unwrap_or(value));
                }
            }
            Field::PhaseName | Field::PhaseMinutes | Field::Purpose => {
                let Some(phase) = self.current.as_mut() else {
                    return;
                };
                match field {
                    Field::PhaseName if !value.is_empty() => {
                        phase.fields.name = Some(value.to_string())
                    }
                    Field::PhaseMinutes => {
                        if let Some(minutes) = parse_minutes(value) {
                            phase.fields.minutes = Some(minutes);
                        }
                    }
                    Field::Purpose if !value.is_empty() => {
                        phase.fields.purpose = Some(value.to_string())
                    }
                    _ => {}
                }
            }
            Field::LearnerSteps | Field::HelperScript => {
                if self.current.is_none() {
                    return;
                }
                self.capture = if field == Field::LearnerSteps {
                    Capture::Steps
                } else {
                    Capture::Helper
                };
                if !value.is_empty() {
                    let item = if field == Field::LearnerSteps {
                        strip_bullet(value).unwrap_or(value)
                    } else {
                        value
                    };
                    self.push_item(item);
                }
            }
        }
    }

    /// Route list items and free text to the open capture.
    ///
    /// Helper scripts keep the whole line (bullets included); lists take the
    /// stripped item.
    fn capture_item(&mut self, item: &str, whole_line: &str) {
        match self.capture {
            Capture::Helper => self.push_item(whole_line),
            Capture::Steps | Capture::Twists => self.push_item(item),
            Capture::None => {}
        }
    }

    fn push_item(&mut self, item: &str) {
        let item = item.trim();
        if item.is_empty() {
            return;
        }
        match self.capture {
            Capture::Twists => self.twists.push(item.to_string()),
            Capture::Steps => {
                if let Some(phase) = self.current.as_mut() {
                    phase.steps.push(item.to_string());
                }
            }
            Capture::Helper => {
                if let Some(phase) = self.current.as_mut() {
                    phase.helper_lines.push(item.to_string());
                }
            }
            Capture::None => {}
        }
    }

    fn finish(mut self, default_level: Level) -> Result<Session, (DropReason, Option<String>)> {
        self.close_phase();

        let fields = self.fields;
        let Some(title) = fields.title else {
            return Err((DropReason::MissingTitle, None));
        };
        if self.phases.is_empty() {
            return Err((DropReason::NoPhases, Some(title)));
        }

        let level = fields
            .level
            .as_deref()
            .and_then(detect_level)
            .unwrap_or(default_level);
        let partner = fields
            .partner
            .as_deref()
            .map(parse_partner)
            .unwrap_or_default();
        let (id, id_source) =
            identity::session_id(fields.id.as_deref(), level, &title, fields.context.as_deref());

        Ok(Session {
            id,
            id_source,
            title,
            level,
            partner,
            goal: fields.goal,
            context: fields.context,
            correction: fields.correction,
            category: fields.category,
            twists: self.twists,
            phases: self.phases,
        })
    }
}

/// Parse a full library, or a pasted excerpt with one or more blocks.
///
/// Never fails: invalid blocks are dropped and described in the report.
pub fn parse_library(text: &str, default_level: Level) -> ParseOutcome {
    let scan = extract_blocks(text);
    let mut outcome = ParseOutcome {
        sessions: Vec::with_capacity(scan.blocks.len()),
        report: ParseReport {
            blocks_seen: scan.blocks.len(),
            unterminated_blocks: scan.unterminated,
            ..Default::default()
        },
    };

    for (index, lines) in scan.blocks.iter().enumerate() {
        let mut parser = BlockParser::new();
        for line in lines {
            parser.feed(line.trim());
        }
        match parser.finish(default_level) {
            Ok(session) => outcome.sessions.push(session),
            Err((reason, title)) => {
                tracing::debug!(index, %reason, title = ?title, "Dropping invalid session block");
                outcome.report.dropped.push(DroppedBlock {
                    index,
                    reason,
                    title,
                });
            }
        }
    }

    outcome.report.sessions_parsed = outcome.sessions.len();

    if outcome.report.unterminated_blocks > 0 {
        tracing::debug!(
            count = outcome.report.unterminated_blocks,
            "Ignored unterminated session blocks"
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IdSource;

    const COFFEE: &str = "\
BEGIN PERFECT HOUR SESSION
Title: Order coffee
Level: A2
PHASE 1: Fluency loop (1m)
Human steps:
* Say hello
* Ask for coffee
END PERFECT HOUR SESSION
";

    fn parse(text: &str) -> ParseOutcome {
        parse_library(text, Level::B1)
    }

    fn only(text: &str) -> Session {
        let outcome = parse(text);
        assert_eq!(outcome.sessions.len(), 1, "report: {:?}", outcome.report);
        outcome.sessions.into_iter().next().unwrap()
    }

    #[test]
    fn test_order_coffee_example() {
        let session = only(COFFEE);
        assert_eq!(session.title, "Order coffee");
        assert_eq!(session.level, Level::A2);
        assert_eq!(session.phases.len(), 1);
        assert_eq!(session.phases[0].title, "Fluency loop");
        assert_eq!(session.phases[0].minutes, 1);
        assert_eq!(
            session.phases[0].learner_steps,
            vec!["Say hello", "Ask for coffee"]
        );
        assert_eq!(session.id_source, IdSource::Derived);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let a = only(COFFEE);
        let b = only(COFFEE);
        assert_eq!(a.id, b.id);
        assert_eq!(a, b);
    }

    #[test]
    fn test_bullet_fidelity() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Bullets
PHASE 1: Drill (5m)
Human steps:
*   first step
- second - with dash
* * starred twice
-\tTabbed
*Say hello
-Ask for coffee
•Pay
-5 euros is the limit
**Stay polite**
END PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(
            session.phases[0].learner_steps,
            vec![
                "first step",
                "second - with dash",
                "* starred twice",
                "Tabbed",
                "Say hello",
                "Ask for coffee",
                "Pay",
                "-5 euros is the limit",
                "**Stay polite**",
            ]
        );
    }

    #[test]
    fn test_text_outside_blocks_is_ignored() {
        let text = "\
Title: Preamble title
PHASE 9: Outside (3m)
BEGIN PERFECT HOUR SESSION
Title: First
PHASE 1: One (5m)
END PERFECT HOUR SESSION
Notes between blocks: Title: Between
* stray bullet
BEGIN PERFECT HOUR SESSION
Title: Second
PHASE 1: Two (5m)
END PERFECT HOUR SESSION
Trailing commentary PHASE 2: After (4m)
";
        let outcome = parse(text);
        let titles: Vec<_> = outcome.sessions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        for session in &outcome.sessions {
            assert_eq!(session.phases.len(), 1);
            assert!(session.twists.is_empty());
            assert!(session.phases[0].learner_steps.is_empty());
        }
        assert!(outcome.report.is_clean());
    }

    #[test]
    fn test_invalid_blocks_are_dropped() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Level: A1
PHASE 1: No title (5m)
END PERFECT HOUR SESSION
BEGIN PERFECT HOUR SESSION
Title: No phases
Human steps:
* orphan step
END PERFECT HOUR SESSION
BEGIN PERFECT HOUR SESSION
Title: Valid
PHASE 1
END PERFECT HOUR SESSION";
        let outcome = parse(text);
        assert_eq!(outcome.sessions.len(), 1);
        assert_eq!(outcome.sessions[0].title, "Valid");
        assert_eq!(outcome.report.blocks_seen, 3);
        assert_eq!(outcome.report.sessions_parsed, 1);
        assert_eq!(outcome.report.dropped.len(), 2);
        assert_eq!(outcome.report.dropped[0].reason, DropReason::MissingTitle);
        assert_eq!(outcome.report.dropped[1].reason, DropReason::NoPhases);
        assert_eq!(outcome.report.dropped[1].title.as_deref(), Some("No phases"));
    }

    #[test]
    fn test_unterminated_and_nested_begin() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Abandoned
PHASE 1: A (5m)
BEGIN PERFECT HOUR SESSION
Title: Kept
PHASE 1: B (5m)
END PERFECT HOUR SESSION
BEGIN PERFECT HOUR SESSION
Title: Never closed
PHASE 1: C (5m)
";
        let outcome = parse(text);
        assert_eq!(outcome.sessions.len(), 1);
        assert_eq!(outcome.sessions[0].title, "Kept");
        assert_eq!(outcome.report.unterminated_blocks, 2);
        assert_eq!(outcome.report.blocks_seen, 1);
    }

    #[test]
    fn test_garbage_input_yields_nothing() {
        for text in ["", "   \n\n", "END PERFECT HOUR SESSION", "\u{0}\u{1}binary\u{fffd}"] {
            let outcome = parse(text);
            assert!(outcome.sessions.is_empty());
            assert_eq!(outcome.report.blocks_seen, 0);
        }
    }

    #[test]
    fn test_crlf_and_casing_tolerance() {
        let text = "begin perfect hour session\r\n  TITLE:  Book a table  \r\nlevel: b2\r\nPhase 1 - Warm up (3 min)\r\nLEARNER STEPS:\r\n- Greet\r\nend perfect hour session\r\n";
        let session = only(text);
        assert_eq!(session.title, "Book a table");
        assert_eq!(session.level, Level::B2);
        assert_eq!(session.phases[0].title, "Warm up");
        assert_eq!(session.phases[0].minutes, 3);
        assert_eq!(session.phases[0].learner_steps, vec!["Greet"]);
    }

    #[test]
    fn test_markers_on_same_line_as_content() {
        let text = "BEGIN PERFECT HOUR SESSION Title: Inline markers\nPHASE 1: Only (2m)\nHuman steps: * Talk END PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(session.title, "Inline markers");
        assert_eq!(session.phases[0].learner_steps, vec!["Talk"]);
    }

    #[test]
    fn test_decorated_markers() {
        let text = "=== BEGIN PERFECT HOUR SESSION ===\nTitle: Fenced\n### PHASE 1: Chat (4m)\n=== END PERFECT HOUR SESSION ===";
        let session = only(text);
        assert_eq!(session.phases[0].title, "Chat");
        assert_eq!(session.phases[0].minutes, 4);
    }

    #[test]
    fn test_structured_fields_override_compact_header() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Structured
PHASE 1: Header name (5m)
Name: Field name
Minutes: 12
Purpose: Build confidence
PHASE 2
Name: Only fields
Duration: 8 minutes
END PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(session.phases[0].title, "Field name");
        assert_eq!(session.phases[0].minutes, 12);
        assert_eq!(session.phases[0].purpose.as_deref(), Some("Build confidence"));
        assert_eq!(session.phases[1].title, "Only fields");
        assert_eq!(session.phases[1].minutes, 8);
    }

    #[test]
    fn test_compact_header_variants() {
        let cases = [
            ("PHASE 1: Shadowing (7m)", Some("Shadowing"), Some(7)),
            ("Phase 2 — Role play (15 minutes)", Some("Role play"), Some(15)),
            ("**PHASE 3: Feedback [6 min]**", Some("Feedback"), Some(6)),
            ("PHASE 4. Retell - 9 min", Some("Retell"), Some(9)),
            ("PHASE 5", None, None),
            ("PHASE 6: Free talk", Some("Free talk"), None),
        ];
        for (line, name, minutes) in cases {
            let header = parse_compact_header(line).unwrap_or_else(|| panic!("{line}"));
            assert_eq!(header.name.as_deref(), name, "{line}");
            assert_eq!(header.minutes, minutes, "{line}");
        }
        assert!(parse_compact_header("Phase 2 is harder, so relax").is_none());
        assert!(parse_compact_header("Phases are timed").is_none());
    }

    #[test]
    fn test_minutes_are_clamped_or_inferred() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Minutes
PHASE 1: Opening
PHASE 2: Marathon (500m)
PHASE 3: Zero (0m)
PHASE 4: Wrap-up
PHASE 5: Huge
Minutes: 99999999999999
END PERFECT HOUR SESSION";
        let session = only(text);
        let minutes: Vec<_> = session.phases.iter().map(|p| p.minutes).collect();
        assert_eq!(minutes, vec![5, 90, 10, 5, 90]);
        assert!(session.phases.iter().all(|p| p.minutes >= 1));
    }

    #[test]
    fn test_default_phase_title() {
        let text = "BEGIN PERFECT HOUR SESSION\nTitle: Untitled phases\nPHASE 1\nPHASE 2 (5m)\nEND PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(session.phases[0].title, "Phase 1");
        assert_eq!(session.phases[1].title, "Phase 2");
    }

    #[test]
    fn test_implicit_steps_until_next_field() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Tolerant
PHASE 1: Talk (5m)
Human steps:
Describe your morning

* Ask a follow-up question
Unknown label: still a step
AI helper script: You are a barista.
Keep answers short.
- Offer oat milk
Purpose: Late purpose
END PERFECT HOUR SESSION";
        let session = only(text);
        let phase = &session.phases[0];
        assert_eq!(
            phase.learner_steps,
            vec![
                "Describe your morning",
                "Ask a follow-up question",
                "Unknown label: still a step"
            ]
        );
        assert_eq!(
            phase.helper_script.as_deref(),
            Some("You are a barista.\nKeep answers short.\n- Offer oat milk")
        );
        assert_eq!(phase.purpose.as_deref(), Some("Late purpose"));
    }

    #[test]
    fn test_helper_label_variants() {
        for label in ["AI helper script:", "Helper role:", "Helper:", "AI Helper (optional):"] {
            let text = format!(
                "BEGIN PERFECT HOUR SESSION\nTitle: Helper\nPHASE 1: A (5m)\n{label} Be kind\nEND PERFECT HOUR SESSION"
            );
            let session = only(&text);
            assert_eq!(
                session.phases[0].helper_script.as_deref(),
                Some("Be kind"),
                "{label}"
            );
        }
    }

    #[test]
    fn test_twists_end_at_phase_header() {
        let text = "\
BEGIN PERFECT HOUR SESSION
Title: Twisty
Twists:
* The card is declined
- The shop closes early
PHASE 1: Main (20m)
Human steps:
* Pay
Twists: * Power cut
END PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(
            session.twists,
            vec!["The card is declined", "The shop closes early", "Power cut"]
        );
        assert_eq!(session.phases[0].learner_steps, vec!["Pay"]);
    }

    #[test]
    fn test_session_fields_and_explicit_id() {
        let text = "\
BEGIN PERFECT HOUR SESSION
ID:  A2-Path-03
**Title:** \"Return a jacket\"
Level: CEFR A2 (CLB 4)
Partner: human tutor
Goal (CLB): Explain a problem politely
Context: A clothing store
Correction: Only fix past tense
Category: Shopping
Favourite colour: blue
PHASE 1: Explain (10m)
END PERFECT HOUR SESSION";
        let session = only(text);
        assert_eq!(session.id, "a2-path-03");
        assert_eq!(session.id_source, IdSource::Explicit);
        assert_eq!(session.title, "Return a jacket");
        assert_eq!(session.level, Level::A2);
        assert_eq!(session.partner, Partner::Human);
        assert_eq!(session.goal.as_deref(), Some("Explain a problem politely"));
        assert_eq!(session.context.as_deref(), Some("A clothing store"));
        assert_eq!(session.correction.as_deref(), Some("Only fix past tense"));
        assert_eq!(session.category.as_deref(), Some("Shopping"));
    }

    #[test]
    fn test_level_falls_back_to_default() {
        let text = "BEGIN PERFECT HOUR SESSION\nTitle: No level\nLevel: advanced-ish\nPHASE 1: A (5m)\nEND PERFECT HOUR SESSION";
        assert_eq!(parse_library(text, Level::C1).sessions[0].level, Level::C1);
    }

    #[test]
    fn test_partner_parsing() {
        assert_eq!(parse_partner("Human"), Partner::Human);
        assert_eq!(parse_partner("AI (voice mode)"), Partner::Ai);
        assert_eq!(parse_partner("Human or AI"), Partner::Either);
        assert_eq!(parse_partner("either"), Partner::Either);
        assert_eq!(parse_partner("said"), Partner::Either);
    }

    #[test]
    fn test_detect_level() {
        assert_eq!(detect_level("B1 / CLB 5"), Some(Level::B1));
        assert_eq!(detect_level("level c2"), Some(Level::C2));
        assert_eq!(detect_level("AB12"), None);
        assert_eq!(detect_level("D1"), None);
    }

    #[test]
    fn test_report_merge_offsets_indexes() {
        let mut a = parse("BEGIN PERFECT HOUR SESSION\nPHASE 1\nEND PERFECT HOUR SESSION").report;
        let b = parse("BEGIN PERFECT HOUR SESSION\nTitle: x\nEND PERFECT HOUR SESSION").report;
        a.merge(&b);
        assert_eq!(a.blocks_seen, 2);
        assert_eq!(a.dropped[1].index, 1);
        assert!(!a.is_clean());
    }
}
