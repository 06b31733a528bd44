use crate::engines::{LineEdit, LinePrompt};
use camino::{Utf8Path, Utf8PathBuf};

/// Callback surface the session needs from whatever presents it to the user.
///
/// Every method is called from the session task between discrete operations;
/// the document lock is never held while a host method runs, so an
/// implementation may block on user input for as long as it likes.
///
/// Returning `None` from a selection method means the user cancelled.
#[cfg_attr(test, mockall::automock)]
pub trait Host {
    /// Ask the user to pick one of `options`. `None` skips.
    fn present_choices(&mut self, prompt: &str, options: &[String]) -> Option<String>;

    /// Advisory: the byte span of the current text under review
    fn highlight_span(&mut self, start: usize, end: usize);

    fn clear_highlight(&mut self);

    /// Push the full current text for display.
    fn render_text(&mut self, text: &str);

    /// `current` is 0-based.
    fn report_progress(&mut self, current: usize, total: usize, description: &str);

    fn present_line_for_edit(&mut self, prompt: &LinePrompt) -> LineEdit;

    fn report_status(&mut self, message: &str);

    fn report_error(&mut self, message: &str);

    /// Ask for the input document, starting from `start_dir` when known.
    fn select_file(&mut self, start_dir: Option<Utf8PathBuf>) -> Option<Utf8PathBuf>;

    /// Ask where to save, proposing `suggested`.
    fn select_save_path(&mut self, suggested: &Utf8Path) -> Option<Utf8PathBuf>;

    /// Ask for the default input directory when none is configured.
    fn select_default_directory(&mut self) -> Option<Utf8PathBuf>;
}
