//! Services module - Pure text transformations for ebook cleanup.
//!
//! Everything here works on plain `&str` input plus one rule collection and returns
//! a new string with counts. The services have no dependencies on the interactive
//! layer, which makes them testable in isolation.
//!
//! # Components
//!
//! - [`Pipeline`]: runs the enabled [`StepKind`]s in canonical order against a
//!   [`crate::models::ProcessingContext`], logging one entry per step:
//!   1. automatic regex replacements ([`apply_automatic_replacements`])
//!   2. abbreviation period insertion ([`insert_periods`])
//!   3. pagination removal ([`remove_pagination`]), markup-aware for `.html`/`.xhtml`
//!   4. Roman numeral conversion ([`RomanNumeralConverter`])
//!   5. lowercase conversion ([`convert_to_lowercase`])
//!   6. blank line removal ([`remove_blank_lines`])
//!
//! - [`SideLogs`]: the plain-file diagnostic side channel (replacement audit, match
//!   snapshots, pagination and Roman conversion records). Never fails the caller.
//!
//! # Error Handling
//!
//! A bad user-supplied pattern or unparseable markup produces a [`TransformError`]
//! that is collected and reported; the run continues with the remaining rules and
//! steps.

pub mod diagnostics;
pub mod pagination;
pub mod pipeline;
pub mod replacements;
pub mod roman;
pub mod text;

pub use diagnostics::{SideLog, SideLogs};
pub use pagination::{PaginationOutcome, remove_pagination};
pub use pipeline::{Pipeline, PipelineReport, StepKind, StepOutcome, TransformError};
pub use replacements::{apply_automatic_replacements, insert_periods, translate_replacement};
pub use roman::{RomanNumeralConverter, roman_to_arabic};
pub use text::{apply_upper_to_lower, convert_to_lowercase, remove_blank_lines};
