//! System prompt rendering.
//!
//! Templates use `{placeholder}` markers that are filled from the persona and
//! the current conversation state.

use crate::{persona::PersonaDescriptor, state::ConversationState};

/// Renders the session instructions for `persona` given the current state.
pub fn render_instructions(persona: &PersonaDescriptor, state: &ConversationState) -> String {
    let participant = state.participant_name.as_deref().unwrap_or("there");
    let session_context = if state.resuming {
        "We spoke earlier. Continue from where the conversation left off."
    } else {
        "This is the first conversation."
    };

    let items = persona
        .items
        .all()
        .enumerate()
        .map(|(i, id)| {
            let marker = if state.is_completed(id) { " (answered)" } else { "" };
            format!("{}. {}{}", i + 1, id, marker)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let (owner, headline, contact, knowledge) = match &persona.profile {
        Some(profile) => (
            profile.owner.as_str(),
            profile.headline.as_str(),
            profile.contact.as_deref().unwrap_or("available on request"),
            profile
                .sections
                .iter()
                .map(|(category, text)| format!("## {}\n{}", category, text))
                .collect::<Vec<_>>()
                .join("\n\n"),
        ),
        None => ("", "", "available on request", String::new()),
    };

    persona
        .prompt_template
        .replace("{label}", persona.label)
        .replace("{participant_name}", participant)
        .replace("{session_context}", session_context)
        .replace("{language}", &state.language.as_str().to_uppercase())
        .replace("{items}", &items)
        .replace("{owner}", owner)
        .replace("{headline}", headline)
        .replace("{contact}", contact)
        .replace("{knowledge}", &knowledge)
}

/// Context message telling the remote party what already happened, sent once
/// after the configuration when a stored session is resumed.
pub fn resume_context(persona: &PersonaDescriptor, state: &ConversationState) -> String {
    let mut text = format!(
        "IMPORTANT: This is a RESUMED session. {} item(s) have already been answered",
        state.completed().len()
    );
    if state.completed().is_empty() {
        text.push('.');
    } else {
        text.push_str(&format!(": {}.", state.completed().join(", ")));
    }

    if !state.answers().is_empty() {
        text.push_str("\nPrior answers:");
        for id in state.completed() {
            if let Some(answer) = state.answer(id) {
                text.push_str(&format!("\n- {}: {}", id, answer.response));
            }
        }
    }

    if !persona.items.is_empty() {
        text.push_str(
            "\nAsk the next question from the remaining unanswered items. \
             Do not restart from the introduction.",
        );
    }
    text.push_str("\nContinue naturally from where the conversation left off.");
    text
}
