//! Embedding progress reporting.
//!
//! Embedding a corpus with a local model can take a while, so the session
//! reports each finished batch. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// A single progress event for an embedding run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedProgressEvent {
    /// Model doing the work.
    pub model: String,
    /// Documents embedded so far.
    pub n: u64,
    pub total: u64,
}

/// Reports embedding progress. Implementations write to stderr (human or JSON).
pub trait EmbedProgressReporter: Send + Sync {
    fn report(&self, event: EmbedProgressEvent);
}

/// Human-friendly progress on stderr: "embed all-minilm-l6-v2  12 / 40 documents".
pub struct StderrProgress;

impl EmbedProgressReporter for StderrProgress {
    fn report(&self, event: EmbedProgressEvent) {
        let line = format!(
            "embed {}  {} / {} documents\n",
            event.model,
            format_number(event.n),
            format_number(event.total)
        );
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl EmbedProgressReporter for JsonProgress {
    fn report(&self, event: EmbedProgressEvent) {
        let obj = serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "model": event.model,
            "n": event.n,
            "total": event.total
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl EmbedProgressReporter for NoProgress {
    fn report(&self, _event: EmbedProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn EmbedProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
