//! Session identity derivation
//!
//! An explicit `ID:` field wins. Without one, the id is
//! `{level}_{fnv1a32(level|title|context):08x}` with the level code lowercased,
//! so re-parsing identical text always yields the identical id and two sessions
//! that only differ in context never collide.

use crate::types::{IdSource, Level};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
pub fn fnv1a32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Canonical key hashed for derived ids.
///
/// Whitespace runs are collapsed and text is lowercased so cosmetic edits
/// (re-wrapping, trailing spaces, capitalisation) keep the id stable.
fn canonical_key(level: Level, title: &str, context: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        level.as_str(),
        normalize(title),
        normalize(context.unwrap_or_default())
    )
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve the id for a parsed session.
pub fn session_id(
    explicit: Option<&str>,
    level: Level,
    title: &str,
    context: Option<&str>,
) -> (String, IdSource) {
    if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
        return (id.to_lowercase(), IdSource::Explicit);
    }

    let hash = fnv1a32(&canonical_key(level, title, context));
    (
        format!("{}_{:08x}", level.as_str().to_lowercase(), hash),
        IdSource::Derived,
    )
}

/// Trailing number of an id such as `a2-path-07` or `b1_12`.
///
/// Only meaningful for explicit ids; derived ids end in a hex hash.
pub fn numeric_suffix(id: &str) -> Option<u64> {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    id[digits_start..].parse().ok()
}
