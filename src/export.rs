//! Export the chat transcript as plain text.
//!
//! One line per transcript entry, `"{User|Assistant}: {message}"`, in
//! transcript order. Line breaks inside a message are written as a literal
//! `\n` so every entry stays on exactly one line.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::ChatEntry;

/// Default file name used by `/export` without an argument.
pub const DEFAULT_EXPORT_FILE: &str = "chat_history.txt";

/// Render the transcript. Pure; an empty transcript renders as `""`.
pub fn format_transcript(entries: &[ChatEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.role.label(), single_line(&e.message)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn single_line(message: &str) -> String {
    message.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}

/// Write the transcript to `path`, creating parent directories.
///
/// Returns the number of lines written; an empty transcript writes nothing
/// and returns `0`.
pub fn write_transcript(path: &Path, entries: &[ChatEntry]) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut text = format_transcript(entries);
    text.push('\n');
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    tracing::info!(path = %path.display(), lines = entries.len(), "exported transcript");
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn sample() -> Vec<ChatEntry> {
        vec![
            ChatEntry::new(Role::User, "What is the capital of France?"),
            ChatEntry::new(Role::Assistant, "Paris."),
            ChatEntry::new(Role::User, "And Japan?"),
        ]
    }

    #[test]
    fn one_line_per_entry_in_order() {
        let text = format_transcript(&sample());
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "User: What is the capital of France?");
        assert_eq!(lines[1], "Assistant: Paris.");
        assert_eq!(lines[2], "User: And Japan?");
    }

    #[test]
    fn multiline_messages_stay_on_one_line() {
        let entries = vec![
            ChatEntry::new(Role::Assistant, "line one\nline two\r\nline three"),
            ChatEntry::new(Role::User, "ok"),
        ];
        let text = format_transcript(&entries);
        assert_eq!(text.split('\n').count(), entries.len());
        assert!(text.starts_with("Assistant: line one\\nline two\\nline three"));
    }

    #[test]
    fn empty_transcript_is_empty_string() {
        assert_eq!(format_transcript(&[]), "");
    }

    #[test]
    fn write_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("chat.txt");
        assert_eq!(write_transcript(&path, &sample()).unwrap(), 3);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn write_skips_empty_transcript() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chat.txt");
        assert_eq!(write_transcript(&path, &[]).unwrap(), 0);
        assert!(!path.exists());
    }
}
