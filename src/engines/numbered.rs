use crate::models::ProcessingContext;
use regex::Regex;
use std::collections::BTreeMap;

/// One line offered for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePrompt {
    /// Position among the qualifying lines
    pub index: usize,
    pub total: usize,
    /// 0-based line number in the document
    pub line_no: usize,
    pub text: String,
    /// Byte spans of each 3+ digit run within `text`
    pub spans: Vec<(usize, usize)>,
    /// Edit already stored for this line, if any
    pub pending_edit: Option<String>,
}

/// Host response to a [`LinePrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    /// Store this text for the line and advance
    Apply(String),
    /// Advance without storing anything
    Skip,
    Previous,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSummary {
    pub candidates: usize,
    pub edits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStep {
    Prompt(LinePrompt),
    Finished(LineSummary),
}

/// Manual editor for lines containing numbers of three or more digits.
///
/// Edits are keyed by line number and survive navigation in both directions.
/// Nothing touches the text until the user moves past the last line, when all
/// stored edits are applied in one pass.
pub struct NumberedLineEngine {
    pattern: Regex,
    lines: Vec<String>,
    candidates: Vec<usize>,
    index: usize,
    edits: BTreeMap<usize, String>,
    start_len: usize,
    finished: bool,
}

impl NumberedLineEngine {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"\d{3,}").expect("Invalid numbered line regex"),
            lines: Vec::new(),
            candidates: Vec::new(),
            index: 0,
            edits: BTreeMap::new(),
            start_len: 0,
            finished: true,
        }
    }

    /// Scan the current text and present the first qualifying line.
    pub fn start(&mut self, ctx: &mut ProcessingContext) -> LineStep {
        self.lines = ctx
            .text
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        self.candidates = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| self.pattern.is_match(line))
            .map(|(i, _)| i)
            .collect();
        self.index = 0;
        self.edits.clear();
        self.start_len = ctx.text.len();
        self.finished = false;

        tracing::info!("Numbered line editor: {} qualifying lines", self.candidates.len());
        self.current_or_finish(ctx)
    }

    /// Handle one navigation or edit.
    pub fn respond(&mut self, ctx: &mut ProcessingContext, edit: LineEdit) -> LineStep {
        if self.finished {
            tracing::warn!("Line edit received after the numbered line editor finished");
            return self.summary_step();
        }
        let Some(&line_no) = self.candidates.get(self.index) else {
            return self.finish(ctx);
        };

        match edit {
            LineEdit::Apply(edited) => {
                let original = self.lines[line_no].trim();
                let edited = edited.trim();
                if edited != original {
                    tracing::debug!("Line {} edited", line_no + 1);
                    self.edits.insert(line_no, edited.to_string());
                } else {
                    self.edits.remove(&line_no);
                }
                self.index += 1;
            }
            LineEdit::Skip | LineEdit::Next => self.index += 1,
            LineEdit::Previous => self.index = self.index.saturating_sub(1),
        }

        self.current_or_finish(ctx)
    }

    /// Edits stored so far, keyed by 0-based line number
    pub fn edits(&self) -> &BTreeMap<usize, String> {
        &self.edits
    }

    fn current_or_finish(&mut self, ctx: &mut ProcessingContext) -> LineStep {
        let Some(&line_no) = self.candidates.get(self.index) else {
            return self.finish(ctx);
        };

        let text = self.lines[line_no].clone();
        let spans = self
            .pattern
            .find_iter(&text)
            .map(|m| (m.start(), m.end()))
            .collect();

        LineStep::Prompt(LinePrompt {
            index: self.index,
            total: self.candidates.len(),
            line_no,
            spans,
            pending_edit: self.edits.get(&line_no).cloned(),
            text,
        })
    }

    fn finish(&mut self, ctx: &mut ProcessingContext) -> LineStep {
        self.finished = true;

        if !self.edits.is_empty() {
            let mut lines: Vec<String> = ctx.text.split('\n').map(str::to_string).collect();
            for (&line_no, edited) in &self.edits {
                match lines.get_mut(line_no) {
                    Some(line) => {
                        let carriage_return = line.ends_with('\r');
                        *line = edited.clone();
                        if carriage_return {
                            line.push('\r');
                        }
                    }
                    None => tracing::warn!("Line {} no longer exists, edit dropped", line_no + 1),
                }
            }
            ctx.text = lines.join("\n");
        }

        ctx.log_change(
            "numbered_line_edit",
            format!("Applied {} line edits from numbered line editor", self.edits.len()),
            self.start_len,
            ctx.text.len(),
        );
        tracing::info!("Numbered line editor finished: {} edits", self.edits.len());
        self.summary_step()
    }

    fn summary_step(&self) -> LineStep {
        LineStep::Finished(LineSummary {
            candidates: self.candidates.len(),
            edits: self.edits.len(),
        })
    }
}

impl Default for NumberedLineEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleSet;

    fn context(text: &str) -> ProcessingContext {
        ProcessingContext::new(text, None, RuleSet::default())
    }

    fn expect_prompt(step: LineStep) -> LinePrompt {
        match step {
            LineStep::Prompt(prompt) => prompt,
            LineStep::Finished(summary) => panic!("expected prompt, got {:?}", summary),
        }
    }

    #[test]
    fn test_detects_three_digit_runs() {
        let mut ctx = context("no numbers here\nsee page 1234 now\nanother 56 small");
        let mut engine = NumberedLineEngine::new();

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.total, 1);
        assert_eq!(prompt.line_no, 1);
        assert_eq!(prompt.spans, vec![(9, 13)]);

        let step = engine.respond(&mut ctx, LineEdit::Apply("see page 12 now".to_string()));
        assert_eq!(step, LineStep::Finished(LineSummary { candidates: 1, edits: 1 }));
        assert_eq!(ctx.text, "no numbers here\nsee page 12 now\nanother 56 small");
        assert_eq!(
            ctx.processing_log[0].description,
            "Applied 1 line edits from numbered line editor"
        );
    }

    #[test]
    fn test_no_candidates_finishes() {
        let mut ctx = context("12 and 34\n");
        let mut engine = NumberedLineEngine::new();
        let step = engine.start(&mut ctx);
        assert_eq!(step, LineStep::Finished(LineSummary { candidates: 0, edits: 0 }));
        assert_eq!(ctx.text, "12 and 34\n");
    }

    #[test]
    fn test_navigation_keeps_edits() {
        let mut ctx = context("line 100\nline 200\nline 300\n");
        let mut engine = NumberedLineEngine::new();

        expect_prompt(engine.start(&mut ctx));
        let prompt = expect_prompt(engine.respond(&mut ctx, LineEdit::Apply(" line one ".to_string())));
        assert_eq!(prompt.line_no, 1);

        let prompt = expect_prompt(engine.respond(&mut ctx, LineEdit::Previous));
        assert_eq!(prompt.line_no, 0);
        assert_eq!(prompt.pending_edit.as_deref(), Some("line one"));

        let prompt = expect_prompt(engine.respond(&mut ctx, LineEdit::Previous));
        assert_eq!(prompt.index, 0);

        engine.respond(&mut ctx, LineEdit::Next);
        engine.respond(&mut ctx, LineEdit::Skip);
        let step = engine.respond(&mut ctx, LineEdit::Apply("line 300".to_string()));

        assert_eq!(step, LineStep::Finished(LineSummary { candidates: 3, edits: 1 }));
        assert_eq!(ctx.text, "line one\nline 200\nline 300\n");
    }

    #[test]
    fn test_unchanged_edit_is_not_stored() {
        let mut ctx = context("page 999\r\nend");
        let mut engine = NumberedLineEngine::new();

        let prompt = expect_prompt(engine.start(&mut ctx));
        assert_eq!(prompt.text, "page 999");
        let step = engine.respond(&mut ctx, LineEdit::Apply("  page 999 ".to_string()));

        assert_eq!(step, LineStep::Finished(LineSummary { candidates: 1, edits: 0 }));
        assert_eq!(ctx.text, "page 999\r\nend");
    }

    #[test]
    fn test_crlf_preserved_on_edit() {
        let mut ctx = context("page 999\r\nend");
        let mut engine = NumberedLineEngine::new();

        expect_prompt(engine.start(&mut ctx));
        engine.respond(&mut ctx, LineEdit::Apply("page 9".to_string()));
        assert_eq!(ctx.text, "page 9\r\nend");
    }
}
