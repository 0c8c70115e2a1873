//! Prompt text for AI partners.
//!
//! Two prompts are produced:
//! - a **generator** prompt asking an AI to write new sessions in the library
//!   format, ready to paste into `fluenthour import`;
//! - a **partner** prompt briefing an AI helper on one phase of a session.

use crate::library::{BEGIN_MARKER, END_MARKER};
use crate::types::{Level, Session};
use std::fmt::Write;

const MAX_GENERATED_SESSIONS: u32 = 10;

/// Options for the generator prompt.
#[derive(Debug, Clone)]
pub struct GeneratorRequest {
    pub level: Level,
    pub topic: Option<String>,
    /// Clamped to 1..=10
    pub count: u32,
    /// Ids already in use, so the AI can continue the path numbering
    pub next_path_number: Option<u64>,
}

/// Prompt asking an AI to author sessions in the library grammar.
pub fn generator_prompt(request: &GeneratorRequest) -> String {
    let count = request.count.clamp(1, MAX_GENERATED_SESSIONS);
    let level = request.level;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Write {} speaking-practice session{} for a language learner at CEFR level {} ({}).",
        count,
        if count == 1 { "" } else { "s" },
        level.as_str(),
        level.display_name()
    );
    if let Some(topic) = request.topic.as_deref().filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(prompt, "Every session is about: {}.", topic.trim());
    }
    prompt.push_str(
        "Each session fills one hour of conversation with a partner (a human or an AI). \
         Phases should add up to about 60 minutes.\n\n",
    );
    prompt.push_str("Use exactly this plain-text format and nothing else:\n\n");

    let first_id = request
        .next_path_number
        .map(|n| format!("{}-path-{:02}", level.as_str().to_lowercase(), n));

    let _ = writeln!(prompt, "{}", BEGIN_MARKER);
    if let Some(id) = &first_id {
        let _ = writeln!(prompt, "ID: {}", id);
    }
    let _ = writeln!(prompt, "Title: <short title>");
    let _ = writeln!(prompt, "Level: {}", level.as_str());
    prompt.push_str(
        "Partner: Human or AI\n\
         Category: <one word topic>\n\
         Goal (CLB): <what the learner can do at the end>\n\
         Context: <the situation and who the partner plays>\n\
         Correction: <what the partner corrects and how often>\n\
         \n\
         PHASE 1: <name> (<minutes>m)\n\
         Purpose: <one sentence>\n\
         Human steps:\n\
         * <step>\n\
         * <step>\n\
         AI helper script: <instructions for the partner>\n\
         \n\
         PHASE 2: ...\n\
         \n\
         Twists:\n\
         * <optional complication>\n",
    );
    let _ = writeln!(prompt, "{}", END_MARKER);

    prompt.push_str(
        "\nRules:\n\
         - Start every session with the BEGIN line and end it with the END line.\n\
         - Use 3 to 6 phases; the first is a short warm-up and the last a short review.\n\
         - Write minutes as a whole number between 1 and 90.\n\
         - Start every step with \"* \".\n",
    );
    if first_id.is_some() {
        prompt.push_str("- Number the IDs consecutively from the one shown.\n");
    }
    prompt
}

/// Prompt briefing an AI partner on one phase of a session.
///
/// Returns `None` when `phase_index` is out of range.
pub fn partner_prompt(session: &Session, phase_index: usize) -> Option<String> {
    let phase = session.phase(phase_index)?;
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are my speaking partner for a {} practice session: \"{}\".",
        session.level.as_str(),
        session.title
    );
    prompt.push_str("Speak only in the language I am learning. Keep your turns short so I talk more than you.\n");

    if let Some(context) = &session.context {
        let _ = writeln!(prompt, "\nSituation: {}", context);
    }
    if let Some(goal) = &session.goal {
        let _ = writeln!(prompt, "My goal: {}", goal);
    }
    if let Some(correction) = &session.correction {
        let _ = writeln!(prompt, "Corrections: {}", correction);
    }

    let _ = writeln!(
        prompt,
        "\nWe are in phase {} of {}: {} ({} minutes).",
        phase_index + 1,
        session.phases.len(),
        phase.title,
        phase.minutes
    );
    if let Some(purpose) = &phase.purpose {
        let _ = writeln!(prompt, "Purpose: {}", purpose);
    }
    if !phase.learner_steps.is_empty() {
        prompt.push_str("I will:\n");
        for step in &phase.learner_steps {
            let _ = writeln!(prompt, "- {}", step);
        }
    }
    if let Some(script) = &phase.helper_script {
        let _ = writeln!(prompt, "\nYour role:\n{}", script);
    }
    if !session.twists.is_empty() {
        prompt.push_str("\nWhen I am doing well, add one of these twists:\n");
        for twist in &session.twists {
            let _ = writeln!(prompt, "- {}", twist);
        }
    }
    prompt.push_str("\nStart now with your first line.\n");

    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::parse_library;
    use crate::library::STARTER_LIBRARY;

    #[test]
    fn test_generator_prompt_mentions_format() {
        let prompt = generator_prompt(&GeneratorRequest {
            level: Level::B1,
            topic: Some("Renting a flat".to_string()),
            count: 50,
            next_path_number: Some(4),
        });
        assert!(prompt.starts_with("Write 10 speaking-practice sessions"));
        assert!(prompt.contains("Renting a flat"));
        assert!(prompt.contains(BEGIN_MARKER));
        assert!(prompt.contains(END_MARKER));
        assert!(prompt.contains("ID: b1-path-04"));
    }

    #[test]
    fn test_generator_template_is_parseable() {
        // The format example itself must round-trip through the parser
        let prompt = generator_prompt(&GeneratorRequest {
            level: Level::A1,
            topic: None,
            count: 1,
            next_path_number: None,
        });
        let outcome = parse_library(&prompt, Level::C2);
        assert_eq!(outcome.sessions.len(), 1);
        assert_eq!(outcome.sessions[0].level, Level::A1);
        assert_eq!(outcome.sessions[0].phases.len(), 2);
    }

    #[test]
    fn test_partner_prompt() {
        let outcome = parse_library(STARTER_LIBRARY, Level::A2);
        let coffee = outcome
            .sessions
            .iter()
            .find(|s| s.id == "a2-path-01")
            .unwrap();

        let prompt = partner_prompt(coffee, 1).unwrap();
        assert!(prompt.contains("\"Order coffee\""));
        assert!(prompt.contains("phase 2 of 5: Fluency loop (15 minutes)"));
        assert!(prompt.contains("You are a friendly barista"));
        assert!(prompt.contains("The card machine is broken"));
        assert!(partner_prompt(coffee, 9).is_none());
    }
}
