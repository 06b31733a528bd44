use crate::models::{ProcessingContext, StepToggles};
use crate::services::diagnostics::{SideLog, SideLogs};
use crate::services::pagination::remove_pagination;
use crate::services::replacements::{apply_automatic_replacements, insert_periods};
use crate::services::roman::RomanNumeralConverter;
use crate::services::text::{convert_to_lowercase, remove_blank_lines};
use thiserror::Error;

/// Errors raised by individual transformation steps.
///
/// None of these abort a run: the offending rule is skipped, or the step
/// leaves the text unchanged, and the error is surfaced to the user.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid replacement pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Error removing pagination: {0}")]
    Markup(String),
}

/// The non-interactive steps, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    AutomaticReplacements,
    InsertPeriods,
    RemovePagination,
    RomanNumerals,
    ConvertLowercase,
    RemoveBlankLines,
}

impl StepKind {
    /// Every step, in the order the pipeline runs them.
    pub const ALL: [StepKind; 6] = [
        StepKind::AutomaticReplacements,
        StepKind::InsertPeriods,
        StepKind::RemovePagination,
        StepKind::RomanNumerals,
        StepKind::ConvertLowercase,
        StepKind::RemoveBlankLines,
    ];

    /// Stable identifier, used in settings and processing log entries
    pub fn name(self) -> &'static str {
        match self {
            StepKind::AutomaticReplacements => "automatic_replacements",
            StepKind::InsertPeriods => "insert_periods",
            StepKind::RemovePagination => "remove_pagination",
            StepKind::RomanNumerals => "roman_numerals",
            StepKind::ConvertLowercase => "convert_lowercase",
            StepKind::RemoveBlankLines => "remove_blank_lines",
        }
    }

    /// Human-readable label for progress reporting
    pub fn description(self) -> &'static str {
        match self {
            StepKind::AutomaticReplacements => "Automatic replacements",
            StepKind::InsertPeriods => "Insert periods into abbreviations",
            StepKind::RemovePagination => "Remove pagination",
            StepKind::RomanNumerals => "Convert Roman numerals",
            StepKind::ConvertLowercase => "Convert to lowercase",
            StepKind::RemoveBlankLines => "Remove blank lines",
        }
    }

    pub fn default_enabled(self) -> bool {
        !matches!(self, StepKind::ConvertLowercase | StepKind::RemoveBlankLines)
    }

    pub fn from_name(name: &str) -> Option<StepKind> {
        StepKind::ALL.into_iter().find(|step| step.name() == name)
    }

    pub fn is_enabled(self, toggles: &StepToggles) -> bool {
        match self {
            StepKind::AutomaticReplacements => toggles.automatic_replacements,
            StepKind::InsertPeriods => toggles.insert_periods,
            StepKind::RemovePagination => toggles.remove_pagination,
            StepKind::RomanNumerals => toggles.roman_numerals,
            StepKind::ConvertLowercase => toggles.convert_lowercase,
            StepKind::RemoveBlankLines => toggles.remove_blank_lines,
        }
    }

    /// Enabled steps in canonical order
    pub fn enabled(toggles: &StepToggles) -> Vec<StepKind> {
        StepKind::ALL
            .into_iter()
            .filter(|step| step.is_enabled(toggles))
            .collect()
    }
}

/// Result of running one step.
#[derive(Debug)]
pub struct StepOutcome {
    pub step: StepKind,
    pub changed: bool,
    /// Total substitutions, insertions, removals or conversions made
    pub count: usize,
    pub errors: Vec<TransformError>,
}

/// Result of a whole pipeline run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub steps_run: Vec<StepKind>,
    pub errors: Vec<TransformError>,
}

/// Runs the non-interactive transformation steps against a [`ProcessingContext`].
///
/// Every step reads the current text, writes the new text back, and appends
/// exactly one processing log entry, even when nothing matched. Side files for
/// pagination and Roman numerals are written through [`SideLogs`].
pub struct Pipeline {
    roman: RomanNumeralConverter,
    side_logs: SideLogs,
}

impl Pipeline {
    pub fn new(side_logs: SideLogs) -> Self {
        Self {
            roman: RomanNumeralConverter::new(),
            side_logs,
        }
    }

    pub fn side_logs(&self) -> &SideLogs {
        &self.side_logs
    }

    /// Apply one step to the context.
    pub fn run_step(&self, step: StepKind, ctx: &mut ProcessingContext) -> StepOutcome {
        tracing::info!("Starting {}", step.description());
        let before_len = ctx.text.len();
        let mut errors = Vec::new();

        let (text, count, description) = match step {
            StepKind::AutomaticReplacements => {
                let outcome = apply_automatic_replacements(&ctx.text, &ctx.rules.replacements);
                errors.extend(outcome.failed);
                let description = format!(
                    "Applied {} rules, made {} replacements",
                    outcome.rules, outcome.replacements
                );
                (outcome.text, outcome.replacements, description)
            }
            StepKind::InsertPeriods => {
                let outcome = insert_periods(&ctx.text, &ctx.rules.periods);
                let description = format!(
                    "Processed {} abbreviations, made {} insertions",
                    outcome.abbreviations, outcome.insertions
                );
                (outcome.text, outcome.insertions, description)
            }
            StepKind::RemovePagination => {
                let (text, removed) = match remove_pagination(&ctx.text, ctx.format()) {
                    Ok(outcome) => (outcome.text, outcome.removed),
                    Err(e) => {
                        tracing::error!("{}", e);
                        errors.push(e);
                        (ctx.text.clone(), Vec::new())
                    }
                };
                self.side_logs.write(SideLog::Pagination, &removed.join("\n"));
                let description = format!("Removed {} pagination elements", removed.len());
                (text, removed.len(), description)
            }
            StepKind::RomanNumerals => {
                self.side_logs.reset(SideLog::RomanConversions);
                let outcome = self.roman.convert(&ctx.text, &ctx.rules.roman_ignore_set);
                for conversion in &outcome.conversions {
                    self.side_logs
                        .append(SideLog::RomanConversions, &conversion.log_line());
                }
                let count = outcome.conversions.len();
                let description = format!("Converted {} Roman numerals to Arabic numbers", count);
                (outcome.text, count, description)
            }
            StepKind::ConvertLowercase => {
                let text = convert_to_lowercase(&ctx.text);
                let count = usize::from(text != ctx.text);
                (text, count, "Converted entire text to lowercase".to_string())
            }
            StepKind::RemoveBlankLines => {
                let outcome = remove_blank_lines(&ctx.text);
                let removed = outcome.removed();
                let description = format!(
                    "Removed {} blank lines ({} → {} lines)",
                    removed, outcome.before_lines, outcome.after_lines
                );
                (outcome.text, removed, description)
            }
        };

        let changed = text != ctx.text;
        ctx.text = text;
        ctx.log_change(step.name(), description, before_len, ctx.text.len());
        tracing::info!("Finished {}", step.description());

        StepOutcome {
            step,
            changed,
            count,
            errors,
        }
    }

    /// Run every enabled step in canonical order.
    ///
    /// `progress` is called before each step with `(index, total, step)`.
    pub fn run<F>(&self, ctx: &mut ProcessingContext, toggles: &StepToggles, mut progress: F) -> PipelineReport
    where
        F: FnMut(usize, usize, StepKind),
    {
        let steps = StepKind::enabled(toggles);
        let total = steps.len();
        let mut report = PipelineReport::default();

        for (i, step) in steps.into_iter().enumerate() {
            progress(i, total, step);
            let outcome = self.run_step(step, ctx);
            report.steps_run.push(step);
            report.errors.extend(outcome.errors);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleSet;
    use camino::Utf8PathBuf;

    fn context(text: &str, path: Option<&str>) -> ProcessingContext {
        ProcessingContext::new(text, path.map(Utf8PathBuf::from), RuleSet::default())
    }

    #[test]
    fn test_step_catalogue() {
        assert_eq!(StepKind::ALL.len(), 6);
        assert_eq!(StepKind::from_name("roman_numerals"), Some(StepKind::RomanNumerals));
        assert_eq!(StepKind::from_name("unknown"), None);
        assert!(StepKind::InsertPeriods.default_enabled());
        assert!(!StepKind::RemoveBlankLines.default_enabled());

        let defaults = StepToggles::default();
        for step in StepKind::ALL {
            assert_eq!(step.is_enabled(&defaults), step.default_enabled());
        }
    }

    #[test]
    fn test_zero_match_step_still_logs() {
        let pipeline = Pipeline::new(SideLogs::disabled());
        let mut ctx = context("nothing to do", None);

        let outcome = pipeline.run_step(StepKind::InsertPeriods, &mut ctx);

        assert!(!outcome.changed);
        assert_eq!(ctx.processing_log.len(), 1);
        assert_eq!(
            ctx.processing_log[0].description,
            "Processed 0 abbreviations, made 0 insertions"
        );
    }

    #[test]
    fn test_run_uses_current_text_in_order() {
        let pipeline = Pipeline::new(SideLogs::disabled());
        let mut ctx = context("Chapter ch4\n\n12\nMr Smith\n", Some("book.txt"));
        ctx.rules
            .replacements
            .insert("ch4".to_string(), "IV".to_string());
        ctx.rules.periods.insert("Mr".to_string());

        let mut toggles = StepToggles::default();
        toggles.remove_blank_lines = true;
        let mut seen = Vec::new();
        let report = pipeline.run(&mut ctx, &toggles, |i, total, step| seen.push((i, total, step)));

        assert_eq!(ctx.text, "Chapter 4\nM.r. Smith\n");
        assert_eq!(report.steps_run.len(), 5);
        assert!(report.errors.is_empty());
        assert_eq!(seen[0], (0, 5, StepKind::AutomaticReplacements));
        assert_eq!(ctx.processing_log.len(), 5);
        assert_eq!(ctx.processing_log[2].description, "Removed 1 pagination elements");
    }

    #[test]
    fn test_pagination_failure_leaves_text() {
        let pipeline = Pipeline::new(SideLogs::disabled());
        let original = "<p>1</p><!-- unclosed";
        let mut ctx = context(original, Some("ch.xhtml"));

        let outcome = pipeline.run_step(StepKind::RemovePagination, &mut ctx);

        assert_eq!(ctx.text, original);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(
            ctx.processing_log[0].description,
            "Removed 0 pagination elements"
        );
    }

    #[test]
    fn test_blank_line_description() {
        let pipeline = Pipeline::new(SideLogs::disabled());
        let mut ctx = context("a\n\nb", None);
        pipeline.run_step(StepKind::RemoveBlankLines, &mut ctx);
        assert_eq!(
            ctx.processing_log[0].description,
            "Removed 1 blank lines (3 → 2 lines)"
        );
    }
}
