// Bookfix - Interactive ebook text cleanup
//
// This is the library crate containing the transformation steps, the interactive
// review engines and the session orchestration.
// The binary crate (main.rs) provides the terminal entry point.

pub mod config;
pub mod engines;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::{ConfigError, ConfigManager};
pub use engines::{AllCapsEngine, ChoiceEngine, NumberedLineEngine};
pub use metrics::Metrics;
pub use models::{AppSettings, ProcessingContext, RuleSet, StepToggles};
pub use services::{Pipeline, StepKind, TransformError};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
