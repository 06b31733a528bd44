use crate::config::{ConfigError, ConfigManager};
use crate::engines::span_is_valid;
use crate::models::ProcessingContext;
use crate::services::text::apply_upper_to_lower;
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;

/// The four dispositions for an all-caps sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapsDecision {
    /// Lowercase this occurrence and every other whole-word occurrence
    Lowercase,
    /// Leave it as it is for the rest of this run
    Keep,
    /// Never ask again (persisted to `# CAP_IGNORE`)
    Ignore,
    /// Always lowercase (persisted to `# UPPER_TO_LOWER`)
    AutoLowercase,
}

impl CapsDecision {
    pub const ALL: [CapsDecision; 4] = [
        CapsDecision::Lowercase,
        CapsDecision::Keep,
        CapsDecision::Ignore,
        CapsDecision::AutoLowercase,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CapsDecision::Lowercase => "Yes (lowercase)",
            CapsDecision::Keep => "No (keep uppercase)",
            CapsDecision::Ignore => "Add to Ignore",
            CapsDecision::AutoLowercase => "Auto Lowercase",
        }
    }

    /// Option labels in prompt order
    pub fn labels() -> Vec<String> {
        Self::ALL.iter().map(|d| d.label().to_string()).collect()
    }

    /// Parse a label, a short keyword (`y`, `no`, `add`, `auto`, ...) or a
    /// 0-based option index.
    pub fn parse(input: &str) -> Option<CapsDecision> {
        let input = input.trim();
        if let Some(decision) = Self::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(input))
        {
            return Some(decision);
        }

        match input.to_ascii_lowercase().as_str() {
            "y" | "yes" | "0" => Some(CapsDecision::Lowercase),
            "n" | "no" | "1" => Some(CapsDecision::Keep),
            "a" | "add" | "2" => Some(CapsDecision::Ignore),
            "i" | "auto" | "3" => Some(CapsDecision::AutoLowercase),
            _ => None,
        }
    }
}

/// A pending decision for one detected sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsPrompt {
    pub sequence: String,
    /// Span in the snapshot taken when the pass started
    pub span: (usize, usize),
    pub index: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapsSummary {
    pub detected: usize,
    pub decisions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapsStep {
    Prompt(CapsPrompt),
    Finished(CapsSummary),
}

/// Interactive all-caps disposition.
///
/// Sequences are detected once, in a snapshot of the text taken at
/// [`AllCapsEngine::start`]; those spans are the coordinate space for all
/// bookkeeping and are never re-derived during the pass. Every edit this engine
/// makes is an ASCII case change, so snapshot spans stay aligned with the live
/// text.
///
/// Decisions are keyed by the sequence text: once a text is decided, identical
/// sequences elsewhere are not prompted for again this run.
///
/// When constructed with a [`ConfigManager`], `Add to Ignore` and
/// `Auto Lowercase` rewrite the caps sections of the data file immediately.
/// Write failures are queued for the caller (see [`AllCapsEngine::take_errors`]).
pub struct AllCapsEngine {
    pattern: Regex,
    config: Option<ConfigManager>,
    detected: Vec<(Range<usize>, String)>,
    index: usize,
    decided_sequences_text: BTreeSet<String>,
    lowercased_original_spans: BTreeSet<(usize, usize)>,
    decisions: usize,
    config_writes: usize,
    errors: Vec<ConfigError>,
    start_len: usize,
    finished: bool,
}

impl AllCapsEngine {
    pub fn new(config: Option<ConfigManager>) -> Self {
        Self {
            pattern: Regex::new(r"\b[A-Z](?:[A-Z ]*[A-Z])\b").expect("Invalid all-caps regex"),
            config,
            detected: Vec::new(),
            index: 0,
            decided_sequences_text: BTreeSet::new(),
            lowercased_original_spans: BTreeSet::new(),
            decisions: 0,
            config_writes: 0,
            errors: Vec::new(),
            start_len: 0,
            finished: true,
        }
    }

    /// Snapshot the sequences, apply the persisted lowercase list, and find the
    /// first undecided sequence.
    pub fn start(&mut self, ctx: &mut ProcessingContext) -> CapsStep {
        self.detected = self
            .pattern
            .find_iter(&ctx.text)
            .map(|m| (m.range(), m.as_str().to_string()))
            .collect();
        self.index = 0;
        self.decided_sequences_text.clear();
        self.lowercased_original_spans.clear();
        self.decisions = 0;
        self.start_len = ctx.text.len();
        self.finished = false;

        tracing::info!("All-caps sequences detected: {}", self.detected.len());
        tracing::debug!(
            "Detected: {}",
            self.detected
                .iter()
                .map(|(_, s)| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let (text, count) = apply_upper_to_lower(
            &ctx.text,
            ctx.rules.lowercase_set.iter().map(String::as_str),
        );
        if count > 0 {
            tracing::info!("Pre-pass lowercased {} known sequence occurrence(s)", count);
            ctx.text = text;
        }

        self.settle(ctx)
    }

    /// Apply a decision to the current sequence and move on.
    pub fn decide(&mut self, ctx: &mut ProcessingContext, decision: CapsDecision) -> CapsStep {
        if self.finished {
            tracing::warn!("Decision {:?} received after all-caps pass finished", decision);
            return self.summary_step();
        }
        let Some((span, sequence)) = self.detected.get(self.index).cloned() else {
            tracing::warn!("Decision {:?} received with no current sequence", decision);
            return self.settle(ctx);
        };

        tracing::debug!("'{}' -> {}", sequence, decision.label());
        match decision {
            CapsDecision::Lowercase => {
                if span_is_valid(&ctx.text, &span) {
                    ctx.text.replace_range(span.clone(), &sequence.to_lowercase());
                } else {
                    tracing::warn!(
                        "Stale span {}..{} for '{}', lowercasing by text only",
                        span.start,
                        span.end,
                        sequence
                    );
                }
                if let Some(first) = self
                    .detected
                    .iter()
                    .find(|(r, s)| *s == sequence && !self.lowercased_original_spans.contains(&(r.start, r.end)))
                    .map(|(r, _)| (r.start, r.end))
                {
                    self.lowercased_original_spans.insert(first);
                }
                let (text, count) = apply_upper_to_lower(&ctx.text, [sequence.as_str()]);
                ctx.text = text;
                tracing::info!("Bulk-lowercased {} remaining instance(s) of '{}'", count, sequence);
            }
            CapsDecision::Keep => {}
            CapsDecision::Ignore => {
                ctx.rules.ignore_set.insert(sequence.clone());
                self.persist(ctx);
            }
            CapsDecision::AutoLowercase => {
                ctx.rules.lowercase_set.insert(sequence.clone());
                self.persist(ctx);

                let (text, count) = apply_upper_to_lower(
                    &ctx.text,
                    ctx.rules.lowercase_set.iter().map(String::as_str),
                );
                ctx.text = text;
                tracing::info!("Auto-lowercase applied, {} occurrence(s) changed", count);

                for (range, _) in self.detected.iter().filter(|(_, s)| *s == sequence) {
                    self.lowercased_original_spans.insert((range.start, range.end));
                }
            }
        }

        self.decided_sequences_text.insert(sequence);
        self.decisions += 1;
        self.index += 1;
        self.settle(ctx)
    }

    /// Skipping is the same as keeping the sequence.
    pub fn skip(&mut self, ctx: &mut ProcessingContext) -> CapsStep {
        self.decide(ctx, CapsDecision::Keep)
    }

    /// Sequence texts decided this run
    pub fn decided_sequences_text(&self) -> &BTreeSet<String> {
        &self.decided_sequences_text
    }

    /// Snapshot spans that were lowercased this run
    pub fn lowercased_original_spans(&self) -> &BTreeSet<(usize, usize)> {
        &self.lowercased_original_spans
    }

    /// Number of data file rewrites made this run
    pub fn config_writes(&self) -> usize {
        self.config_writes
    }

    /// Drain persistence failures collected since the last call.
    pub fn take_errors(&mut self) -> Vec<ConfigError> {
        std::mem::take(&mut self.errors)
    }

    fn settle(&mut self, ctx: &mut ProcessingContext) -> CapsStep {
        while let Some((span, sequence)) = self.detected.get(self.index) {
            if ctx.rules.ignore_set.contains(sequence) {
                tracing::debug!("Skipping ignored sequence '{}'", sequence);
            } else if self.decided_sequences_text.contains(sequence) {
                tracing::debug!("Skipping already decided sequence '{}'", sequence);
            } else {
                return CapsStep::Prompt(CapsPrompt {
                    sequence: sequence.clone(),
                    span: (span.start, span.end),
                    index: self.index,
                    total: self.detected.len(),
                });
            }
            self.index += 1;
        }

        self.finish(ctx)
    }

    fn finish(&mut self, ctx: &mut ProcessingContext) -> CapsStep {
        self.finished = true;
        ctx.log_change(
            "all_caps_processing",
            "Processed all-caps sequences interactively",
            self.start_len,
            ctx.text.len(),
        );
        tracing::info!("Finished all-caps processing: {} decisions", self.decisions);
        self.summary_step()
    }

    fn summary_step(&self) -> CapsStep {
        CapsStep::Finished(CapsSummary {
            detected: self.detected.len(),
            decisions: self.decisions,
        })
    }

    fn persist(&mut self, ctx: &ProcessingContext) {
        let Some(config) = &self.config else {
            return;
        };
        match config.save_caps_data(&ctx.rules.ignore_set, &ctx.rules.lowercase_set) {
            Ok(()) => self.config_writes += 1,
            Err(e) => {
                tracing::error!("Failed to persist caps data: {}", e);
                self.errors.push(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleSet;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn context(text: &str) -> ProcessingContext {
        ProcessingContext::new(text, None, RuleSet::default())
    }

    fn expect_prompt(step: CapsStep) -> CapsPrompt {
        match step {
            CapsStep::Prompt(prompt) => prompt,
            CapsStep::Finished(summary) => panic!("expected prompt, got {:?}", summary),
        }
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!(CapsDecision::parse("Yes (lowercase)"), Some(CapsDecision::Lowercase));
        assert_eq!(CapsDecision::parse("auto lowercase"), Some(CapsDecision::AutoLowercase));
        assert_eq!(CapsDecision::parse("n"), Some(CapsDecision::Keep));
        assert_eq!(CapsDecision::parse("2"), Some(CapsDecision::Ignore));
        assert_eq!(CapsDecision::parse("i"), Some(CapsDecision::AutoLowercase));
        assert_eq!(CapsDecision::parse("maybe"), None);
        assert_eq!(CapsDecision::labels().len(), 4);
    }

    #[test]
    fn test_detection_needs_two_letters() {
        let mut ctx = context("A quick NOTE: I SAID no. X");
        let mut engine = AllCapsEngine::new(None);

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.sequence, "NOTE");
        assert_eq!(prompt.total, 2);

        let prompt = expect_prompt(engine.decide(&mut ctx, CapsDecision::Keep));
        assert_eq!(prompt.sequence, "I SAID");
    }

    #[test]
    fn test_auto_lowercase_reaches_unvisited_occurrences() {
        let mut ctx = context("SHE SAID STOP. STOP, he said. Later STOP.");
        let mut engine = AllCapsEngine::new(None);

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.sequence, "SHE SAID STOP");
        let prompt = expect_prompt(engine.decide(&mut ctx, CapsDecision::Keep));
        assert_eq!(prompt.sequence, "STOP");
        assert_eq!(prompt.span, (15, 19));

        let step = engine.decide(&mut ctx, CapsDecision::AutoLowercase);
        assert!(matches!(step, CapsStep::Finished(CapsSummary { detected: 3, decisions: 2 })));
        assert_eq!(ctx.text, "SHE SAID stop. stop, he said. Later stop.");
        assert!(ctx.rules.lowercase_set.contains("STOP"));
        assert!(engine.lowercased_original_spans().contains(&(15, 19)));
        assert!(engine.lowercased_original_spans().contains(&(36, 40)));
    }

    #[test]
    fn test_yes_bulk_lowercases_identical_sequences() {
        let mut ctx = context("THE END. Then THE END again, and END.");
        let mut engine = AllCapsEngine::new(None);

        expect_prompt(engine.start(&mut ctx));
        let prompt = expect_prompt(engine.decide(&mut ctx, CapsDecision::Lowercase));
        assert_eq!(prompt.sequence, "END");
        assert_eq!(ctx.text, "the end. Then the end again, and END.");
        assert!(engine.decided_sequences_text().contains("THE END"));
        assert_eq!(engine.lowercased_original_spans().len(), 1);
    }

    #[test]
    fn test_ignore_set_and_prepass() {
        let mut ctx = context("NASA said HELLO and CHAPTER ONE");
        ctx.rules.ignore_set.insert("NASA".to_string());
        ctx.rules.lowercase_set.insert("HELLO".to_string());
        let mut engine = AllCapsEngine::new(None);

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(ctx.text, "NASA said hello and CHAPTER ONE");
        // HELLO was detected in the snapshot but is still undecided
        assert_eq!(prompt.sequence, "HELLO");

        let prompt = expect_prompt(engine.skip(&mut ctx));
        assert_eq!(prompt.sequence, "CHAPTER ONE");
    }

    #[test]
    fn test_ignore_persists_to_data_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let config = ConfigManager::new(&dir).unwrap();
        std::fs::write(config.data_file_path(), "# PERIODS\nMr\n").unwrap();

        let mut ctx = context("ACME and ACME");
        let mut engine = AllCapsEngine::new(Some(config.clone()));

        expect_prompt(engine.start(&mut ctx));
        let step = engine.decide(&mut ctx, CapsDecision::Ignore);

        assert!(matches!(step, CapsStep::Finished(_)));
        assert_eq!(ctx.text, "ACME and ACME");
        assert_eq!(engine.config_writes(), 1);
        assert!(engine.take_errors().is_empty());
        assert!(config.load_rules().ignore_set.contains("ACME"));
    }
}
