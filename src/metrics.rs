// Run metrics module
//
// Lightweight counters for one bookfix session, logged on shutdown

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Session metrics
///
/// Uses atomic operations so the pipeline worker and the interactive loop can
/// record without locks. Logged as a summary when the session ends.
#[derive(Debug)]
pub struct Metrics {
    /// Pipeline steps that ran
    pub steps_run: AtomicUsize,

    /// Pipeline steps that reported at least one error
    pub steps_failed: AtomicUsize,

    /// Total pipeline time in milliseconds
    pub pipeline_time_ms: AtomicU64,

    /// Interactive word replacements made
    pub choice_replacements: AtomicUsize,

    /// All-caps decisions made
    pub caps_decisions: AtomicUsize,

    /// Numbered line edits applied
    pub line_edits: AtomicUsize,

    /// Data file rewrites
    pub config_writes: AtomicUsize,

    /// Failed save attempts
    pub save_failures: AtomicUsize,

    /// Session start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            steps_run: AtomicUsize::new(0),
            steps_failed: AtomicUsize::new(0),
            pipeline_time_ms: AtomicU64::new(0),
            choice_replacements: AtomicUsize::new(0),
            caps_decisions: AtomicUsize::new(0),
            line_edits: AtomicUsize::new(0),
            config_writes: AtomicUsize::new(0),
            save_failures: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one pipeline step and whether it reported errors
    pub fn record_step(&self, failed: bool) {
        self.steps_run.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.steps_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_pipeline_time(&self, duration: Duration) {
        self.pipeline_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_choice_replacements(&self, count: usize) {
        self.choice_replacements.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_caps_decisions(&self, count: usize) {
        self.caps_decisions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_line_edits(&self, count: usize) {
        self.line_edits.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_config_writes(&self, count: usize) {
        self.config_writes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_save_failure(&self) {
        self.save_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Session Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Pipeline: {} steps run, {} with errors, {:.2}s",
            self.steps_run.load(Ordering::Relaxed),
            self.steps_failed.load(Ordering::Relaxed),
            self.pipeline_time_ms.load(Ordering::Relaxed) as f64 / 1000.0
        );
        tracing::info!(
            "Interactive: {} replacements, {} caps decisions, {} line edits",
            self.choice_replacements.load(Ordering::Relaxed),
            self.caps_decisions.load(Ordering::Relaxed),
            self.line_edits.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Data file writes: {}, failed saves: {}",
            self.config_writes.load(Ordering::Relaxed),
            self.save_failures.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
