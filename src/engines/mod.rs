//! Interactive review engines.
//!
//! Each engine is a small state machine that owns only its own cursor and takes
//! the [`crate::models::ProcessingContext`] by `&mut` for one discrete operation at
//! a time. `start` and every decision method return a step value: either a prompt
//! the host must answer, or `Finished` with a summary. Nothing here blocks or
//! knows about the host; the orchestrator in [`crate::ui`] drives the loop.
//!
//! - [`ChoiceEngine`]: per-word replacement with a live, re-derived match list
//! - [`AllCapsEngine`]: per-sequence disposition over a detection snapshot
//! - [`NumberedLineEngine`]: free-form editing of lines holding 3+ digit numbers

pub mod allcaps;
pub mod choice;
pub mod numbered;

pub use allcaps::{AllCapsEngine, CapsDecision, CapsPrompt, CapsStep, CapsSummary};
pub use choice::{ChoiceEngine, ChoicePrompt, ChoiceStep, ChoiceSummary};
pub use numbered::{LineEdit, LinePrompt, LineStep, LineSummary, NumberedLineEngine};

use std::ops::Range;

/// A span is usable only if it lies inside `text` on char boundaries.
pub(crate) fn span_is_valid(text: &str, span: &Range<usize>) -> bool {
    span.start <= span.end
        && span.end <= text.len()
        && text.is_char_boundary(span.start)
        && text.is_char_boundary(span.end)
}
