// UI module - host surface and session orchestration
//
// This module contains:
// - Host: the callback trait the core uses to talk to the user
// - SessionController: sequences loading, the pipeline, the interactive passes and saving
// - TerminalHost: a line-oriented Host over stdin/stdout

pub mod controller;
pub mod host;
pub mod terminal;

pub use controller::{SessionController, SessionError, SessionOutcome, default_output_path};
pub use host::Host;
pub use terminal::TerminalHost;
