// Session Controller - Drives one document through bookfix
//
// This module contains the SessionController which coordinates between:
// - Host (whatever presents prompts to the user)
// - StateManager (the shared ProcessingContext)
// - Pipeline (non-interactive transformation steps)
// - The interactive engines (choices, all-caps, numbered lines)
//
// It handles:
// - Default directory and input file selection
// - Running pipeline steps on blocking workers, one at a time
// - Looping each interactive engine until it finishes
// - Saving the result, with retry on failure

use crate::config::ConfigManager;
use crate::engines::{
    AllCapsEngine, CapsDecision, CapsStep, CapsSummary, ChoiceEngine, ChoiceStep, ChoiceSummary,
    LineStep, LineSummary, NumberedLineEngine,
};
use crate::metrics::Metrics;
use crate::models::{AppSettings, ProcessingContext};
use crate::services::{Pipeline, PipelineReport, SideLogs, StepKind};
use crate::state::{StateChange, StateManager};
use crate::ui::host::Host;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Output name used when the text did not come from a file
pub const FALLBACK_OUTPUT_NAME: &str = "bookfix_output.txt";

/// Errors surfaced to the user that need acknowledgment
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to read input file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to save output file {path}: {source}")]
    Save {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Processed text written to this path
    Saved(Utf8PathBuf),
    /// Processing ran but the user declined to save
    Unsaved,
    /// The user cancelled a startup prompt
    Cancelled,
}

/// Orchestrator for one processing session
///
/// Guarantees strict sequencing: every pipeline step completes before the next
/// starts, the pipeline completes before any interactive pass, and each pass
/// finishes before the next begins. The document lock is taken once per
/// discrete operation through [`StateManager::update_with`] and never held
/// while the host waits for input.
///
/// # Example
/// ```ignore
/// let config = ConfigManager::new("bookfix_data")?;
/// let settings = config.load_settings()?;
/// let controller = SessionController::new(
///     Arc::new(StateManager::new()),
///     config,
///     settings,
///     Arc::new(Metrics::new()),
/// );
/// let outcome = runtime.block_on(controller.run_session(&mut host, None))?;
/// ```
pub struct SessionController {
    /// Shared document state
    state: Arc<StateManager>,

    /// Data file and settings access
    config: ConfigManager,

    /// Non-interactive steps, shared with blocking workers
    pipeline: Arc<Pipeline>,

    settings: AppSettings,

    metrics: Arc<Metrics>,
}

impl SessionController {
    pub fn new(
        state: Arc<StateManager>,
        config: ConfigManager,
        settings: AppSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        let side_logs = SideLogs::from_setting(&settings.side_log_dir);
        tracing::info!(
            "Session controller initialized (side logs: {})",
            if side_logs.is_enabled() { settings.side_log_dir.as_str() } else { "disabled" }
        );

        Self {
            state,
            config,
            pipeline: Arc::new(Pipeline::new(side_logs)),
            settings,
            metrics,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    /// Run a full session: select and load a document, run the pipeline and
    /// the enabled interactive passes, then save.
    ///
    /// `input` skips the file prompt (and the default directory prompt that
    /// only exists to seed it).
    pub async fn run_session<H: Host + ?Sized>(
        &self,
        host: &mut H,
        input: Option<Utf8PathBuf>,
    ) -> Result<SessionOutcome> {
        tracing::info!("Starting session");

        let path = match input {
            Some(path) => path,
            None => {
                let Some(default_dir) = self.ensure_default_directory(host) else {
                    tracing::info!("Default directory prompt cancelled");
                    return Ok(SessionOutcome::Cancelled);
                };
                match host.select_file(Some(default_dir)) {
                    Some(path) => path,
                    None => {
                        tracing::info!("File selection cancelled");
                        return Ok(SessionOutcome::Cancelled);
                    }
                }
            }
        };

        if let Err(e) = self.load_file(&path) {
            host.report_error(&e.to_string());
            return Err(e).context("Failed to load input document");
        }
        host.render_text(&self.state.text());

        self.run_pipeline(host).await?;

        let steps = &self.settings.steps;
        if steps.interactive_choices {
            self.run_choices(host);
        }
        if steps.all_caps_processing {
            self.run_all_caps(host);
        }
        if steps.numbered_line_edit {
            self.run_numbered_lines(host);
        }

        tracing::info!(
            "Processing summary:\n{}",
            self.state.read(|ctx| ctx.processing_summary())
        );

        let outcome = match self.save(host) {
            Some(path) => SessionOutcome::Saved(path),
            None => SessionOutcome::Unsaved,
        };
        tracing::info!("Session finished: {:?}", outcome);
        Ok(outcome)
    }

    /// Return the configured default directory, asking the host for one (and
    /// persisting it) when the data file has none.
    ///
    /// `None` means the user cancelled.
    pub fn ensure_default_directory<H: Host + ?Sized>(&self, host: &mut H) -> Option<Utf8PathBuf> {
        if let Some(dir) = self.config.load_rules().default_directory {
            return Some(dir);
        }

        tracing::info!("No default directory configured, asking the user");
        let dir = host.select_default_directory()?;

        match self.config.save_default_directory(&dir) {
            Ok(()) => {
                self.metrics.record_config_writes(1);
                host.report_status(&format!("Default directory set to {}", dir));
            }
            Err(e) => {
                tracing::warn!("Could not persist default directory: {}", e);
                host.report_error(&e.to_string());
            }
        }

        Some(dir)
    }

    /// Read `path`, load the rule sets, and replace the current context.
    ///
    /// Returns the document length in bytes.
    pub fn load_file(&self, path: &Utf8Path) -> Result<usize, SessionError> {
        let text = fs::read_to_string(path).map_err(|source| SessionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = self.config.load_rules();
        let len = text.len();

        tracing::info!(
            "Loaded {} ({} bytes, {} rules)",
            path,
            len,
            rules.rule_count()
        );
        self.state
            .load_document(ProcessingContext::new(text, Some(path.to_path_buf()), rules));

        Ok(len)
    }

    /// Run every enabled pipeline step in canonical order.
    ///
    /// Each step runs on a blocking worker and holds the document lock only
    /// for its own duration. The diagnostic side files are cleared first.
    pub async fn run_pipeline<H: Host + ?Sized>(&self, host: &mut H) -> Result<PipelineReport> {
        let steps = StepKind::enabled(&self.settings.steps);
        let total = steps.len();
        let started = Instant::now();
        let mut report = PipelineReport::default();

        tracing::info!("Running pipeline with {} steps", total);
        self.pipeline.side_logs().clear_all();

        for (index, step) in steps.into_iter().enumerate() {
            host.report_progress(index, total, step.description());
            self.state.report_progress(index, total, step.description());

            let state = Arc::clone(&self.state);
            let pipeline = Arc::clone(&self.pipeline);
            let (outcome, changes) = tokio::task::spawn_blocking(move || {
                state.update_with(|ctx| pipeline.run_step(step, ctx))
            })
            .await
            .with_context(|| format!("Pipeline step '{}' did not complete", step.name()))?;

            self.metrics.record_step(!outcome.errors.is_empty());
            for error in &outcome.errors {
                host.report_error(&error.to_string());
            }
            self.refresh(host, &changes);

            report.steps_run.push(step);
            report.errors.extend(outcome.errors);
        }

        self.metrics.record_pipeline_time(started.elapsed());
        host.report_progress(total, total, "Pipeline complete");
        tracing::info!(
            "Pipeline finished in {:.2}s with {} error(s)",
            started.elapsed().as_secs_f64(),
            report.errors.len()
        );

        Ok(report)
    }

    /// Walk the `# CHOICE` words, asking the host for every match.
    ///
    /// Declining to choose skips the rest of the current word.
    pub fn run_choices<H: Host + ?Sized>(&self, host: &mut H) -> ChoiceSummary {
        let mut engine = ChoiceEngine::new(self.pipeline.side_logs().clone());
        let (mut step, _) = self.state.update_with(|ctx| engine.start(ctx));

        let summary = loop {
            let prompt = match step {
                ChoiceStep::Prompt(prompt) => prompt,
                ChoiceStep::Finished(summary) => break summary,
            };

            host.highlight_span(prompt.span.0, prompt.span.1);
            let label = format!(
                "'{}' match {}/{} (word {}/{})",
                prompt.matched,
                prompt.match_index + 1,
                prompt.match_count,
                prompt.processed_words + 1,
                prompt.total_words
            );

            let (next, changes) = match host.present_choices(&label, &prompt.options) {
                Some(option) => self.state.update_with(|ctx| engine.choose(ctx, &option)),
                None => {
                    tracing::info!("Skipping remaining matches of '{}'", prompt.word);
                    self.state.update_with(|ctx| engine.skip_word(ctx))
                }
            };
            self.refresh(host, &changes);
            step = next;
        };

        host.clear_highlight();
        self.metrics.record_choice_replacements(summary.replacements);
        host.report_status(&format!(
            "Interactive choices: {} replacement(s) across {} word(s)",
            summary.replacements, summary.words
        ));
        summary
    }

    /// Ask the host about every detected all-caps sequence.
    ///
    /// Answers are mapped through [`CapsDecision::parse`]; anything
    /// unrecognized, or no answer, keeps the sequence as it is.
    pub fn run_all_caps<H: Host + ?Sized>(&self, host: &mut H) -> CapsSummary {
        let mut engine = AllCapsEngine::new(Some(self.config.clone()));
        let options = CapsDecision::labels();
        let (mut step, changes) = self.state.update_with(|ctx| engine.start(ctx));
        self.refresh(host, &changes);

        let summary = loop {
            let prompt = match step {
                CapsStep::Prompt(prompt) => prompt,
                CapsStep::Finished(summary) => break summary,
            };

            host.highlight_span(prompt.span.0, prompt.span.1);
            let label = format!(
                "All-caps '{}' ({}/{})",
                prompt.sequence,
                prompt.index + 1,
                prompt.total
            );

            let decision = host
                .present_choices(&label, &options)
                .and_then(|answer| {
                    let decision = CapsDecision::parse(&answer);
                    if decision.is_none() {
                        tracing::warn!("Unrecognized all-caps answer '{}', keeping sequence", answer);
                    }
                    decision
                });

            let (next, changes) = match decision {
                Some(decision) => self.state.update_with(|ctx| engine.decide(ctx, decision)),
                None => self.state.update_with(|ctx| engine.skip(ctx)),
            };
            self.refresh(host, &changes);
            step = next;
        };

        host.clear_highlight();
        for error in engine.take_errors() {
            host.report_error(&error.to_string());
        }
        self.metrics.record_caps_decisions(summary.decisions);
        self.metrics.record_config_writes(engine.config_writes());
        host.report_status(&format!(
            "All-caps review: {} decision(s) over {} sequence(s)",
            summary.decisions, summary.detected
        ));
        summary
    }

    /// Offer every line holding a 3+ digit number for editing.
    pub fn run_numbered_lines<H: Host + ?Sized>(&self, host: &mut H) -> LineSummary {
        let mut engine = NumberedLineEngine::new();
        let (mut step, _) = self.state.update_with(|ctx| engine.start(ctx));

        let summary = loop {
            let prompt = match step {
                LineStep::Prompt(prompt) => prompt,
                LineStep::Finished(summary) => break summary,
            };

            let edit = host.present_line_for_edit(&prompt);
            let (next, changes) = self.state.update_with(|ctx| engine.respond(ctx, edit));
            self.refresh(host, &changes);
            step = next;
        };

        self.metrics.record_line_edits(summary.edits);
        host.report_status(&format!(
            "Numbered lines: {} edit(s) over {} line(s)",
            summary.edits, summary.candidates
        ));
        summary
    }

    /// Ask for an output path and write the current text there.
    ///
    /// A failed write is reported and the host is asked again; the text is
    /// untouched. `None` means the user declined to save.
    pub fn save<H: Host + ?Sized>(&self, host: &mut H) -> Option<Utf8PathBuf> {
        let (text, input) = self
            .state
            .read(|ctx| (ctx.text.clone(), ctx.filepath.clone()));
        let mut suggested = default_output_path(input.as_deref());

        loop {
            let Some(path) = host.select_save_path(&suggested) else {
                tracing::info!("Save cancelled");
                return None;
            };

            match write_output(&path, &text) {
                Ok(()) => {
                    tracing::info!("Saved {} bytes to {}", text.len(), path);
                    host.report_status(&format!("Saved to {}", path));
                    return Some(path);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    self.metrics.record_save_failure();
                    host.report_error(&e.to_string());
                    suggested = path;
                }
            }
        }
    }

    /// Push the text to the host if an update changed it
    fn refresh<H: Host + ?Sized>(&self, host: &mut H, changes: &[StateChange]) {
        if changes
            .iter()
            .any(|change| matches!(change, StateChange::TextChanged { .. }))
        {
            host.render_text(&self.state.text());
        }
    }
}

/// `<stem>_output.txt` next to the input, or [`FALLBACK_OUTPUT_NAME`].
pub fn default_output_path(input: Option<&Utf8Path>) -> Utf8PathBuf {
    match input.and_then(|path| path.file_stem().map(|stem| (path, stem))) {
        Some((path, stem)) => path.with_file_name(format!("{}_output.txt", stem)),
        None => Utf8PathBuf::from(FALLBACK_OUTPUT_NAME),
    }
}

fn write_output(path: &Utf8Path, text: &str) -> Result<(), SessionError> {
    fs::write(path, text).map_err(|source| SessionError::Save {
        path: path.to_path_buf(),
        source,
    })
}
