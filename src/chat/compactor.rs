//! Sliding-window compaction of the conversation history.
//!
//! A turn is a user message immediately followed by an assistant message.  Before each send
//! the history is cut down to the most recent turns, the new user message and an assistant
//! placeholder are appended, and the system prompt is pinned to the front.

use crate::types::{ChatMessage, Role};

/// Build the history for a new turn.
///
/// `memory_turns` bounds how many complete prior turns survive; the system message is never
/// counted against it.  The result always ends with `user` followed by an assistant
/// placeholder, and holds at most one system message, at index 0.
pub fn compact(
    previous: &[ChatMessage],
    user: ChatMessage,
    memory_turns: usize,
    system_prompt: Option<&str>,
) -> Vec<ChatMessage> {
    let mut prior = previous;
    if prior.last().is_some_and(ChatMessage::is_stale_placeholder) {
        prior = &prior[..prior.len() - 1];
    }

    let (system, rest) = match prior.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first), rest),
        _ => (None, prior),
    };

    let turns = pair_turns(rest);
    let keep = turns.len().min(memory_turns.saturating_sub(1));
    let retained = &turns[turns.len() - keep..];

    let mut history = Vec::with_capacity(retained.len() * 2 + 3);
    if let Some(system) = system {
        history.push(system.clone());
    } else if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
        history.push(ChatMessage::system(prompt));
    }
    for (question, answer) in retained {
        history.push((*question).clone());
        history.push((*answer).clone());
    }
    history.push(user);
    history.push(ChatMessage::placeholder());
    history
}

/// Pair entries positionally, two at a time, keeping only `(user, assistant)` pairs.
///
/// A user message that is not directly followed by an assistant message at an even offset
/// is not a complete turn and is dropped.
fn pair_turns(messages: &[ChatMessage]) -> Vec<(&ChatMessage, &ChatMessage)> {
    messages
        .chunks(2)
        .filter_map(|pair| match pair {
            [user, assistant] if user.role == Role::User && assistant.role == Role::Assistant => {
                Some((user, assistant))
            }
            _ => None,
        })
        .collect()
}
