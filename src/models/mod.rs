//! Data models for Bookfix.
//!
//! - [`ProcessingContext`]: the single mutable record threaded through the pipeline and
//!   the interactive engines (text, input path, rule sets, processing log)
//! - [`RuleSet`]: typed rule collections parsed from the `.data.txt` data file
//! - [`AppSettings`]: step toggles and logging options from `bookfix_settings.yaml`
//!
//! # Architecture Note
//!
//! The context owns the text. Engines borrow it mutably for one discrete operation at a
//! time and keep their cursors to themselves; nothing here is ambient or global.

pub mod context;
pub mod rules;
pub mod settings;

pub use context::{DocumentFormat, LogEntry, ProcessingContext};
pub use rules::RuleSet;
pub use settings::{AppSettings, StepToggles};
