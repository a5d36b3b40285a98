//! Prompt composition for retrieval-augmented answers.
//!
//! A prompt has two layers. The inner layer wraps the question in the
//! retrieved context (when there is any). The outer layer replays the
//! conversation so far and frames the inner prompt as the new question.

use crate::models::Turn;

/// Characters kept from each retrieved document.
pub const DEFAULT_CONTEXT_CHARS: usize = 1000;

/// Compose the final prompt with the default per-document context budget.
pub fn compose(query: &str, retrieved_docs: &[&str], history: &[Turn]) -> String {
    compose_with_limit(query, retrieved_docs, history, DEFAULT_CONTEXT_CHARS)
}

/// Compose the final prompt, keeping the first `context_chars` characters
/// of each retrieved document.
///
/// `history` holds only the turns before the question being answered.
pub fn compose_with_limit(
    query: &str,
    retrieved_docs: &[&str],
    history: &[Turn],
    context_chars: usize,
) -> String {
    let effective = if retrieved_docs.is_empty() {
        query.to_string()
    } else {
        let context = retrieved_docs
            .iter()
            .map(|doc| truncate_chars(doc, context_chars))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Based on the following context:\n\n{}\n\nAnswer the following question: {}",
            context, query
        )
    };

    let mut prompt = String::from("Previous conversation:\n");
    for turn in history {
        prompt.push_str(turn.role.label());
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nNew question: {}\n\nPlease provide a response that takes into account the previous conversation.",
        effective
    ));
    prompt
}

/// Prompt asking for a summary of every document in the corpus.
pub fn summary_prompt(documents: &[&str]) -> String {
    format!(
        "Summarize the following documents:\n\n{}",
        documents.join("\n\n")
    )
}

/// First `max` characters of `text`. Not word-aware.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
