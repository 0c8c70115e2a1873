//! Prompts for AI chats: session generation and partner briefings.

use anyhow::Result;
use fluenthour_core::library::identity::numeric_suffix;
use fluenthour_core::prompts::{generator_prompt, partner_prompt, GeneratorRequest};
use fluenthour_core::{Catalog, IdSource, Level};

use super::find_session;
use crate::context::AppContext;
use crate::LibraryArgs;

pub fn generate(
    ctx: &AppContext,
    library: &LibraryArgs,
    level: Option<Level>,
    topic: Option<String>,
    count: u32,
) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let level = ctx.resolve_level(level)?;

    let request = GeneratorRequest {
        level,
        topic,
        count,
        next_path_number: next_path_number(&catalog, level),
    };
    print!("{}", generator_prompt(&request));
    Ok(())
}

pub fn partner(ctx: &AppContext, library: &LibraryArgs, id: &str, phase: usize) -> Result<()> {
    let (catalog, _) = ctx.load_catalog(library)?;
    let session = find_session(&catalog, id)?;

    let Some(prompt) = phase
        .checked_sub(1)
        .and_then(|index| partner_prompt(session, index))
    else {
        anyhow::bail!(
            "'{}' has {} phase(s); pick --phase between 1 and {}",
            session.id,
            session.phases.len(),
            session.phases.len()
        );
    };
    print!("{}", prompt);
    Ok(())
}

/// Number after the highest explicit path id at `level`, if any exist.
fn next_path_number(catalog: &Catalog, level: Level) -> Option<u64> {
    catalog
        .by_level(level)
        .into_iter()
        .filter(|s| s.id_source == IdSource::Explicit)
        .filter_map(|s| numeric_suffix(&s.id))
        .max()
        .map(|n| n + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluenthour_core::LibrarySource;

    #[test]
    fn test_next_path_number_follows_explicit_ids() {
        let (catalog, _) = Catalog::load(&[LibrarySource::Starter], Level::A2);
        assert_eq!(next_path_number(&catalog, Level::A2), Some(3));
        // The B2 starter session has a derived id only
        assert_eq!(next_path_number(&catalog, Level::B2), None);
        assert_eq!(next_path_number(&catalog, Level::C1), None);
    }
}
