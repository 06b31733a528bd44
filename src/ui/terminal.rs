use crate::engines::{LineEdit, LinePrompt};
use crate::ui::host::Host;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

/// Characters of context shown on each side of a highlighted span
const CONTEXT_CHARS: usize = 40;

/// Line-oriented [`Host`] over a reader and a writer.
///
/// Prompts go to the writer; answers are read one line at a time. End of
/// input is treated as skip/cancel everywhere so a closed stdin never loops.
pub struct TerminalHost<R, W> {
    input: R,
    output: W,
    text: String,
    highlight: Option<(usize, usize)>,
}

impl TerminalHost<StdinLock<'static>, Stdout> {
    /// Host on the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalHost<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            text: String::new(),
            highlight: None,
        }
    }

    /// Consume the host, returning the writer
    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, message: &str) {
        if let Err(e) = writeln!(self.output, "{}", message).and_then(|_| self.output.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }
    }

    /// Print `prompt` and read one trimmed line; `None` on end of input.
    fn ask(&mut self, prompt: &str) -> Option<String> {
        if let Err(e) = write!(self.output, "{} ", prompt).and_then(|_| self.output.flush()) {
            tracing::warn!("Failed to write to terminal: {}", e);
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                tracing::warn!("Failed to read from terminal: {}", e);
                None
            }
        }
    }

    /// The highlighted span with some surrounding text, marked `[[..]]`
    fn highlighted_context(&self) -> Option<String> {
        let (start, end) = self.highlight?;
        let text = &self.text;
        if start > end || end > text.len() || !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            return None;
        }

        let before: String = {
            let mut chars: Vec<char> = text[..start].chars().rev().take(CONTEXT_CHARS).collect();
            chars.reverse();
            chars.into_iter().collect()
        };
        let after: String = text[end..].chars().take(CONTEXT_CHARS).collect();

        Some(
            format!("...{}[[{}]]{}...", before, &text[start..end], after)
                .replace('\n', " "),
        )
    }
}

/// Resolve an answer to one of `options`: a 1-based number or the option text.
fn resolve_option(answer: &str, options: &[String]) -> Option<String> {
    if let Ok(n) = answer.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| options.get(i))
            .cloned();
    }
    options
        .iter()
        .find(|option| option.as_str() == answer)
        .or_else(|| options.iter().find(|option| option.eq_ignore_ascii_case(answer)))
        .cloned()
}

impl<R: BufRead, W: Write> Host for TerminalHost<R, W> {
    fn present_choices(&mut self, prompt: &str, options: &[String]) -> Option<String> {
        if let Some(context) = self.highlighted_context() {
            self.say(&context);
        }
        self.say(prompt);
        for (i, option) in options.iter().enumerate() {
            self.say(&format!("  {}) {}", i + 1, option));
        }

        loop {
            let answer = self.ask("Choice (number or text, empty to skip):")?;
            let answer = answer.trim();
            if answer.is_empty() || answer.eq_ignore_ascii_case("s") {
                return None;
            }
            match resolve_option(answer, options) {
                Some(option) => return Some(option),
                None => self.say(&format!("Not an option: '{}'", answer)),
            }
        }
    }

    fn highlight_span(&mut self, start: usize, end: usize) {
        self.highlight = Some((start, end));
    }

    fn clear_highlight(&mut self) {
        self.highlight = None;
    }

    fn render_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn report_progress(&mut self, current: usize, total: usize, description: &str) {
        if current < total {
            self.say(&format!("[{}/{}] {}", current + 1, total, description));
        } else {
            self.say(description);
        }
    }

    fn present_line_for_edit(&mut self, prompt: &LinePrompt) -> LineEdit {
        self.say(&format!(
            "Line {} ({}/{}): {}",
            prompt.line_no + 1,
            prompt.index + 1,
            prompt.total,
            prompt.text
        ));
        if let Some(pending) = &prompt.pending_edit {
            self.say(&format!("  pending edit: {}", pending));
        }

        match self.ask("New text, or :s skip, :p previous, :n next (empty skips):") {
            None => LineEdit::Skip,
            Some(answer) => match answer.trim() {
                "" | ":s" => LineEdit::Skip,
                ":p" => LineEdit::Previous,
                ":n" => LineEdit::Next,
                _ => LineEdit::Apply(answer.clone()),
            },
        }
    }

    fn report_status(&mut self, message: &str) {
        self.say(message);
    }

    fn report_error(&mut self, message: &str) {
        self.say(&format!("Error: {}", message));
    }

    fn select_file(&mut self, start_dir: Option<Utf8PathBuf>) -> Option<Utf8PathBuf> {
        if let Some(dir) = &start_dir {
            self.say(&format!("Default directory: {}", dir));
        }
        let answer = self.ask("Input file (empty to cancel):")?;
        let answer = answer.trim();
        if answer.is_empty() {
            return None;
        }

        let path = Utf8PathBuf::from(answer);
        match start_dir {
            Some(dir) if path.is_relative() && dir.join(&path).is_file() => Some(dir.join(path)),
            _ => Some(path),
        }
    }

    fn select_save_path(&mut self, suggested: &Utf8Path) -> Option<Utf8PathBuf> {
        let answer = self.ask(&format!(
            "Save to [{}] (empty accepts, :q discards):",
            suggested
        ))?;
        match answer.trim() {
            "" => Some(suggested.to_path_buf()),
            ":q" => None,
            other => Some(Utf8PathBuf::from(other)),
        }
    }

    fn select_default_directory(&mut self) -> Option<Utf8PathBuf> {
        loop {
            let answer = self.ask("Default input directory (empty to cancel):")?;
            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }
            let dir = Utf8PathBuf::from(answer);
            if dir.is_dir() {
                return Some(dir);
            }
            self.say(&format!("Not a directory: {}", dir));
        }
    }
}
