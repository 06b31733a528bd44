use regex::Regex;

/// Result of a line filter: the rebuilt text plus the lines that were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredLines {
    pub text: String,
    pub kept: usize,
    pub removed: Vec<String>,
}

/// Keep only the lines for which `keep` returns true.
///
/// Lines are rejoined with `\n`. A trailing newline on the input is kept on the
/// output unless nothing survives.
pub fn filter_lines<F>(text: &str, keep: F) -> FilteredLines
where
    F: Fn(&str) -> bool,
{
    let mut kept = Vec::new();
    let mut removed = Vec::new();

    for line in text.lines() {
        if keep(line) {
            kept.push(line);
        } else {
            removed.push(line.to_string());
        }
    }

    let mut rebuilt = kept.join("\n");
    if !kept.is_empty() && text.ends_with('\n') {
        rebuilt.push('\n');
    }

    FilteredLines {
        text: rebuilt,
        kept: kept.len(),
        removed,
    }
}

/// True for a line whose trimmed content is one or more ASCII digits.
pub fn is_digit_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Outcome of [`remove_blank_lines`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankLineOutcome {
    pub text: String,
    pub before_lines: usize,
    pub after_lines: usize,
}

impl BlankLineOutcome {
    pub fn removed(&self) -> usize {
        self.before_lines - self.after_lines
    }
}

/// Drop every empty or whitespace-only line. Idempotent.
pub fn remove_blank_lines(text: &str) -> BlankLineOutcome {
    let filtered = filter_lines(text, |line| !line.trim().is_empty());
    BlankLineOutcome {
        before_lines: filtered.kept + filtered.removed.len(),
        after_lines: filtered.kept,
        text: filtered.text,
    }
}

/// Whole-text case fold.
pub fn convert_to_lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// Lowercase every whole-word, case-sensitive occurrence of each sequence.
///
/// Returns the new text and the number of occurrences replaced. Occurrences
/// inside a longer all-caps phrase are replaced too, as long as word
/// boundaries hold on both sides.
pub fn apply_upper_to_lower<'a, I>(text: &str, sequences: I) -> (String, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut current = text.to_string();
    let mut replaced = 0;

    for sequence in sequences {
        if sequence.is_empty() {
            continue;
        }
        let Some(pattern) = whole_word_regex(sequence, false) else {
            continue;
        };

        let count = pattern.find_iter(&current).count();
        if count == 0 {
            continue;
        }

        let lower = sequence.to_lowercase();
        current = pattern
            .replace_all(&current, regex::NoExpand(&lower))
            .into_owned();
        replaced += count;
        tracing::debug!("Lowercased {} occurrence(s) of '{}'", count, sequence);
    }

    (current, replaced)
}

/// `\b<literal>\b`, optionally case-insensitive.
pub fn whole_word_regex(literal: &str, case_insensitive: bool) -> Option<Regex> {
    let flags = if case_insensitive { "(?i)" } else { "" };
    let pattern = format!(r"{}\b{}\b", flags, regex::escape(literal));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Could not build word pattern for '{}': {}", literal, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_filter_lines_keeps_trailing_newline() {
        let filtered = filter_lines("1\nChapter One\n2\n", |l| !is_digit_line(l));
        assert_eq!(filtered.text, "Chapter One\n");
        assert_eq!(filtered.removed, vec!["1", "2"]);

        let filtered = filter_lines("a\n\nb", |l| !l.is_empty());
        assert_eq!(filtered.text, "a\nb");
    }

    #[test]
    fn test_is_digit_line() {
        assert!(is_digit_line("  42 "));
        assert!(!is_digit_line(""));
        assert!(!is_digit_line("4 2"));
        assert!(!is_digit_line("page 4"));
    }

    #[test]
    fn test_remove_blank_lines_counts() {
        let outcome = remove_blank_lines("one\n\n   \ntwo\n\t\nthree");
        assert_eq!(outcome.text, "one\ntwo\nthree");
        assert_eq!(outcome.before_lines, 6);
        assert_eq!(outcome.after_lines, 3);
        assert_eq!(outcome.removed(), 3);
    }

    #[test]
    fn test_apply_upper_to_lower_whole_word_case_sensitive() {
        let (text, count) = apply_upper_to_lower(
            "STOP here. STOPPED. Stop. SHE SAID STOP",
            ["STOP"],
        );
        assert_eq!(text, "stop here. STOPPED. Stop. SHE SAID stop");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_apply_upper_to_lower_multiword() {
        let (text, count) = apply_upper_to_lower("THE END and THE END.", ["THE END", ""]);
        assert_eq!(text, "the end and the end.");
        assert_eq!(count, 2);
    }

    proptest! {
        #[test]
        fn prop_remove_blank_lines_idempotent(text in "[a-c \\t\\n]{0,60}") {
            let once = remove_blank_lines(&text).text;
            let twice = remove_blank_lines(&once).text;
            prop_assert_eq!(once, twice);
        }
    }
}
