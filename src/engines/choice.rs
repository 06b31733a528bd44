use crate::engines::span_is_valid;
use crate::models::ProcessingContext;
use crate::services::diagnostics::{SideLog, SideLogs};
use crate::services::text::whole_word_regex;
use regex::Regex;
use std::ops::Range;

/// A pending decision for one match of one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicePrompt {
    pub word: String,
    /// Replacement options in configured order
    pub options: Vec<String>,
    /// Byte span of the match in the live text
    pub span: (usize, usize),
    /// The matched text as it currently reads
    pub matched: String,
    pub match_index: usize,
    pub match_count: usize,
    pub processed_words: usize,
    pub total_words: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceSummary {
    pub words: usize,
    pub replacements: usize,
}

/// What the engine needs next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceStep {
    Prompt(ChoicePrompt),
    Finished(ChoiceSummary),
}

/// Interactive per-word replacement.
///
/// Walks the `# CHOICE` words in file order. For each word the match list is
/// derived from the live text, and re-derived after every edit so that no span
/// is ever reused across a splice. Each public operation handles exactly one
/// decision and returns the next [`ChoiceStep`].
///
/// Every transition is written to the `matches.txt` side log with the full
/// match list, and every replacement to `debug.txt` as `word -> choice`.
pub struct ChoiceEngine {
    side_logs: SideLogs,
    words: Vec<String>,
    word_index: usize,
    word_loaded: bool,
    pattern: Option<Regex>,
    matches: Vec<Range<usize>>,
    match_index: usize,
    replacements: usize,
    start_len: usize,
    finished: bool,
}

impl ChoiceEngine {
    pub fn new(side_logs: SideLogs) -> Self {
        Self {
            side_logs,
            words: Vec::new(),
            word_index: 0,
            word_loaded: false,
            pattern: None,
            matches: Vec::new(),
            match_index: 0,
            replacements: 0,
            start_len: 0,
            finished: true,
        }
    }

    /// Reset all cursors and move to the first word with a match.
    pub fn start(&mut self, ctx: &mut ProcessingContext) -> ChoiceStep {
        self.words = ctx.rules.choices.keys().cloned().collect();
        self.word_index = 0;
        self.word_loaded = false;
        self.pattern = None;
        self.matches.clear();
        self.match_index = 0;
        self.replacements = 0;
        self.start_len = ctx.text.len();
        self.finished = false;

        tracing::info!("Starting interactive choices for {} words", self.words.len());
        self.settle(ctx)
    }

    /// Apply `option` to the current match.
    ///
    /// Choosing the text that is already there leaves the document untouched and
    /// moves on. With no current match this just advances.
    pub fn choose(&mut self, ctx: &mut ProcessingContext, option: &str) -> ChoiceStep {
        if self.finished {
            tracing::warn!("Choice '{}' received after interactive choices finished", option);
            return self.summary_step();
        }
        let Some(span) = self.matches.get(self.match_index).cloned() else {
            tracing::warn!("Choice '{}' received with no current match", option);
            return self.settle(ctx);
        };
        let word = self.words[self.word_index].clone();

        if !span_is_valid(&ctx.text, &span) {
            tracing::warn!(
                "Stale span {}..{} for '{}' (text length {}), rescanning",
                span.start,
                span.end,
                word,
                ctx.text.len()
            );
            self.rescan(ctx);
            self.match_index = self
                .matches
                .iter()
                .position(|m| m.start >= span.start)
                .unwrap_or(self.matches.len());
            self.record_matches(ctx, "rescanned after stale span");
            return self.settle(ctx);
        }

        let matched = &ctx.text[span.clone()];
        if matched.to_lowercase() == option.to_lowercase() {
            tracing::debug!("'{}' kept as '{}'", word, matched);
            self.matches.remove(self.match_index);
            self.record_matches(ctx, &format!("kept '{}'", option));
            return self.settle(ctx);
        }

        ctx.text.replace_range(span.clone(), option);
        self.replacements += 1;
        self.side_logs
            .append(SideLog::Replacements, &format!("{} -> {}", word, option));
        tracing::debug!("Replaced '{}' with '{}' at {}", word, option, span.start);

        let resume_at = span.start + option.len();
        self.rescan(ctx);
        self.match_index = self
            .matches
            .iter()
            .position(|m| m.start >= resume_at)
            .unwrap_or(self.matches.len());
        self.record_matches(ctx, &format!("replaced with '{}'", option));

        self.settle(ctx)
    }

    /// Leave the remaining matches of the current word untouched.
    pub fn skip_word(&mut self, ctx: &mut ProcessingContext) -> ChoiceStep {
        if self.finished {
            return self.summary_step();
        }
        if let Some(word) = self.words.get(self.word_index) {
            tracing::debug!("Skipping remaining matches of '{}'", word);
        }
        self.matches.clear();
        self.match_index = 0;
        self.record_matches(ctx, "word skipped");
        self.settle(ctx)
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Return the current prompt, advancing past exhausted words.
    fn settle(&mut self, ctx: &mut ProcessingContext) -> ChoiceStep {
        loop {
            if let Some(span) = self.matches.get(self.match_index).cloned() {
                if span_is_valid(&ctx.text, &span) {
                    return ChoiceStep::Prompt(self.prompt(ctx, span));
                }
                tracing::warn!("Dropping stale span {}..{}", span.start, span.end);
                self.matches.remove(self.match_index);
                continue;
            }

            if self.word_loaded {
                self.word_loaded = false;
                self.word_index += 1;
            }
            if self.word_index >= self.words.len() {
                return self.finish(ctx);
            }
            self.load_word(ctx);
        }
    }

    fn load_word(&mut self, ctx: &ProcessingContext) {
        let word = self.words[self.word_index].clone();
        self.pattern = whole_word_regex(&word, true);
        self.word_loaded = true;
        self.match_index = 0;
        self.rescan(ctx);

        if self.matches.is_empty() {
            tracing::debug!("No matches for '{}'", word);
        } else {
            self.record_matches(ctx, "word started");
        }
    }

    fn rescan(&mut self, ctx: &ProcessingContext) {
        self.matches = match &self.pattern {
            Some(pattern) => pattern.find_iter(&ctx.text).map(|m| m.range()).collect(),
            None => Vec::new(),
        };
    }

    fn prompt(&self, ctx: &ProcessingContext, span: Range<usize>) -> ChoicePrompt {
        let word = self.words[self.word_index].clone();
        let options = ctx.rules.choices.get(&word).cloned().unwrap_or_default();
        ChoicePrompt {
            matched: ctx.text[span.clone()].to_string(),
            span: (span.start, span.end),
            word,
            options,
            match_index: self.match_index,
            match_count: self.matches.len(),
            processed_words: self.word_index,
            total_words: self.words.len(),
        }
    }

    fn finish(&mut self, ctx: &mut ProcessingContext) -> ChoiceStep {
        self.finished = true;
        self.matches.clear();
        ctx.log_change(
            "interactive_choices",
            format!("Processed {} words with interactive choices", self.words.len()),
            self.start_len,
            ctx.text.len(),
        );
        tracing::info!(
            "Finished interactive choices: {} replacements",
            self.replacements
        );
        self.summary_step()
    }

    fn summary_step(&self) -> ChoiceStep {
        ChoiceStep::Finished(ChoiceSummary {
            words: self.words.len(),
            replacements: self.replacements,
        })
    }

    fn record_matches(&self, ctx: &ProcessingContext, reason: &str) {
        if !self.side_logs.is_enabled() {
            return;
        }
        let word = self.words.get(self.word_index).map(String::as_str).unwrap_or("");
        let mut entry = format!(
            "--- {} ---\nword: '{}' ({}/{})\ncurrent match: {} of {}\n",
            reason,
            word,
            self.word_index + 1,
            self.words.len(),
            self.match_index,
            self.matches.len()
        );
        for (i, m) in self.matches.iter().enumerate() {
            let text = ctx.text.get(m.clone()).unwrap_or("<out of range>");
            entry.push_str(&format!("  [{}] {}..{} '{}'\n", i, m.start, m.end, text));
        }
        self.side_logs.append(SideLog::Matches, &entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleSet;
    use camino::Utf8PathBuf;
    use std::fs;
    use tempfile::TempDir;

    fn context(text: &str, choices: &[(&str, &[&str])]) -> ProcessingContext {
        let mut rules = RuleSet::default();
        for (word, options) in choices {
            rules.choices.insert(
                word.to_string(),
                options.iter().map(|s| s.to_string()).collect(),
            );
        }
        ProcessingContext::new(text, None, rules)
    }

    fn expect_prompt(step: ChoiceStep) -> ChoicePrompt {
        match step {
            ChoiceStep::Prompt(prompt) => prompt,
            ChoiceStep::Finished(summary) => panic!("expected prompt, got {:?}", summary),
        }
    }

    #[test]
    fn test_no_words_finishes_immediately() {
        let mut ctx = context("anything", &[]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());
        assert_eq!(
            engine.start(&mut ctx),
            ChoiceStep::Finished(ChoiceSummary {
                words: 0,
                replacements: 0
            })
        );
        assert_eq!(
            ctx.processing_log[0].description,
            "Processed 0 words with interactive choices"
        );
    }

    #[test]
    fn test_keep_then_replace() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let side_logs = SideLogs::new(&dir);

        let mut ctx = context("red red red", &[("red", &["blue", "red"])]);
        let mut engine = ChoiceEngine::new(side_logs.clone());

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.span, (0, 3));
        assert_eq!(prompt.options, vec!["blue", "red"]);
        assert_eq!(prompt.match_count, 3);

        let prompt = expect_prompt(engine.choose(&mut ctx, "red"));
        assert_eq!(prompt.span, (4, 7));
        assert_eq!(ctx.text, "red red red");

        let prompt = expect_prompt(engine.choose(&mut ctx, "blue"));
        assert_eq!(prompt.span, (9, 12));
        assert_eq!(ctx.text, "red blue red");

        let step = engine.choose(&mut ctx, "blue");
        assert_eq!(
            step,
            ChoiceStep::Finished(ChoiceSummary {
                words: 1,
                replacements: 2
            })
        );
        assert_eq!(ctx.text, "red blue blue");

        let audit = fs::read_to_string(side_logs.path(SideLog::Replacements).unwrap()).unwrap();
        assert_eq!(audit, "red -> blue\nred -> blue\n");
        let matches = fs::read_to_string(side_logs.path(SideLog::Matches).unwrap()).unwrap();
        assert!(matches.contains("replaced with 'blue'"));
    }

    #[test]
    fn test_shorter_replacement_does_not_skip_neighbour() {
        let mut ctx = context("red red red", &[("red", &["x"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        expect_prompt(engine.start(&mut ctx));
        let prompt = expect_prompt(engine.choose(&mut ctx, "x"));
        assert_eq!(ctx.text, "x red red");
        assert_eq!(prompt.span, (2, 5));
    }

    #[test]
    fn test_replacement_containing_word_is_not_offered_again() {
        let mut ctx = context("red x", &[("red", &["red red"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        expect_prompt(engine.start(&mut ctx));
        let step = engine.choose(&mut ctx, "red red");
        assert!(matches!(step, ChoiceStep::Finished(summary) if summary.replacements == 1));
        assert_eq!(ctx.text, "red red x");
    }

    #[test]
    fn test_case_insensitive_matching_and_keep() {
        let mut ctx = context("Colour and colour", &[("colour", &["color"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.matched, "Colour");

        let prompt = expect_prompt(engine.choose(&mut ctx, "COLOUR"));
        assert_eq!(prompt.matched, "colour");
        assert_eq!(prompt.match_index, 0);
        assert_eq!(prompt.match_count, 1);
    }

    #[test]
    fn test_words_without_matches_are_skipped() {
        let mut ctx = context("only grey here", &[("red", &["blue"]), ("grey", &["gray"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.word, "grey");
        assert_eq!(prompt.processed_words, 1);
        assert_eq!(prompt.total_words, 2);
    }

    #[test]
    fn test_skip_word_moves_to_next_word() {
        let mut ctx = context("red red grey", &[("red", &["blue"]), ("grey", &["gray"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        expect_prompt(engine.start(&mut ctx));
        let prompt = expect_prompt(engine.skip_word(&mut ctx));
        assert_eq!(prompt.word, "grey");

        let step = engine.choose(&mut ctx, "gray");
        assert!(matches!(step, ChoiceStep::Finished(_)));
        assert_eq!(ctx.text, "red red gray");
    }

    #[test]
    fn test_stale_span_is_not_used() {
        let mut ctx = context("red red", &[("red", &["blue"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        expect_prompt(engine.start(&mut ctx));
        ctx.text = "re".to_string();

        let step = engine.choose(&mut ctx, "blue");
        assert!(matches!(step, ChoiceStep::Finished(_)));
        assert_eq!(ctx.text, "re");
        assert_eq!(engine.replacements(), 0);
    }

    #[test]
    fn test_choose_after_finish_is_harmless() {
        let mut ctx = context("red", &[("red", &["blue"])]);
        let mut engine = ChoiceEngine::new(SideLogs::disabled());

        expect_prompt(engine.start(&mut ctx));
        engine.choose(&mut ctx, "blue");
        let step = engine.choose(&mut ctx, "green");

        assert!(matches!(step, ChoiceStep::Finished(_)));
        assert_eq!(ctx.text, "blue");
        assert_eq!(ctx.processing_log.len(), 1);
    }
}
