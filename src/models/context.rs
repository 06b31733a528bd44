use crate::models::RuleSet;
use camino::{Utf8Path, Utf8PathBuf};
use std::time::SystemTime;

/// One entry of the append-only processing audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub step: String,
    pub description: String,
    pub before_len: usize,
    pub after_len: usize,
    pub timestamp: SystemTime,
}

/// Input format, derived from the file extension.
///
/// Only pagination removal cares about the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markup,
    Unknown,
}

/// Single owner of all mutable state for one document run.
///
/// Created when a file is loaded, mutated step by step by the pipeline and
/// the interactive engines, and dropped when another file is loaded. Only
/// one component mutates `text` at a time; [`crate::state::StateManager`]
/// enforces that when the context is shared between threads.
///
/// Interactive cursors are not stored here. Each engine owns its own cursor
/// and is constructed fresh for every pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingContext {
    /// Current full document content
    pub text: String,

    /// Original input path, if the text came from a file
    pub filepath: Option<Utf8PathBuf>,

    /// Rule sets loaded from the data file at run start
    pub rules: RuleSet,

    /// Append-only audit trail of steps performed
    pub processing_log: Vec<LogEntry>,
}

impl ProcessingContext {
    pub fn new(text: impl Into<String>, filepath: Option<Utf8PathBuf>, rules: RuleSet) -> Self {
        Self {
            text: text.into(),
            filepath,
            rules,
            processing_log: Vec::new(),
        }
    }

    /// Determine the document format from the file extension (case-insensitive).
    pub fn format(&self) -> DocumentFormat {
        let Some(ext) = self.filepath.as_deref().and_then(Utf8Path::extension) else {
            return DocumentFormat::Unknown;
        };

        if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("xhtml") {
            DocumentFormat::Markup
        } else if ext.eq_ignore_ascii_case("txt") {
            DocumentFormat::PlainText
        } else {
            DocumentFormat::Unknown
        }
    }

    /// Append an entry to the processing log.
    pub fn log_change(
        &mut self,
        step: &str,
        description: impl Into<String>,
        before_len: usize,
        after_len: usize,
    ) {
        let description = description.into();
        tracing::debug!("{}: {}", step, description);

        self.processing_log.push(LogEntry {
            step: step.to_string(),
            description,
            before_len,
            after_len,
            timestamp: SystemTime::now(),
        });
    }

    /// Numbered summary of every logged step.
    pub fn processing_summary(&self) -> String {
        if self.processing_log.is_empty() {
            return "No processing steps completed.".to_string();
        }

        let mut summary = String::from("Processing Summary:\n");
        for (i, entry) in self.processing_log.iter().enumerate() {
            summary.push_str(&format!("{}. {}: {}\n", i + 1, entry.step, entry.description));
        }
        summary
    }
}
