use crate::services::pipeline::TransformError;
use crate::services::text::whole_word_regex;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::BTreeSet;

/// Outcome of [`apply_automatic_replacements`]
#[derive(Debug)]
pub struct ReplacementOutcome {
    pub text: String,
    /// Number of rules attempted
    pub rules: usize,
    /// Total substitutions made across all rules
    pub replacements: usize,
    /// Rules skipped because their pattern did not compile
    pub failed: Vec<TransformError>,
}

/// Apply every `# REPLACE` rule in file order.
///
/// Each rule sees the output of the previous one. A pattern that fails to
/// compile is recorded in `failed` and skipped; the remaining rules still run.
pub fn apply_automatic_replacements(
    text: &str,
    rules: &IndexMap<String, String>,
) -> ReplacementOutcome {
    let mut current = text.to_string();
    let mut replacements = 0;
    let mut failed = Vec::new();

    for (pattern, replacement) in rules {
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::error!("Regex error in pattern '{}': {}", pattern, e);
                failed.push(TransformError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let count = regex.find_iter(&current).count();
        if count == 0 {
            continue;
        }

        let expansion = translate_replacement(replacement);
        current = regex.replace_all(&current, expansion.as_str()).into_owned();
        replacements += count;
        tracing::debug!("Rule '{}' -> '{}': {} replacement(s)", pattern, replacement, count);
    }

    ReplacementOutcome {
        text: current,
        rules: rules.len(),
        replacements,
        failed,
    }
}

/// Translate a backslash-style replacement into the regex crate's syntax.
///
/// - `\1`, `\12` become `${1}`, `${12}`
/// - `\g<name>` and `\g<1>` become `${name}`, `${1}`
/// - `\\` is a literal backslash, `\n` and `\t` are newline and tab
/// - a literal `$` is escaped as `$$`
///
/// Any other backslash sequence is kept as written.
pub fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 8);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        if group.len() == 2 {
                            break;
                        }
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.next() == Some('<') {
                        let mut name = String::new();
                        let mut closed = false;
                        for ch in lookahead.by_ref() {
                            if ch == '>' {
                                closed = true;
                                break;
                            }
                            name.push(ch);
                        }
                        if closed && !name.is_empty() {
                            out.push_str(&format!("${{{}}}", name));
                            chars = lookahead;
                            continue;
                        }
                    }
                    out.push('\\');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }

    out
}

/// Outcome of [`insert_periods`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodsOutcome {
    pub text: String,
    pub abbreviations: usize,
    pub insertions: usize,
}

/// Rewrite each whole-word abbreviation with a period after every character
/// (`Mr` becomes `M.r.`). Matching is case-sensitive.
pub fn insert_periods(text: &str, periods: &BTreeSet<String>) -> PeriodsOutcome {
    let mut current = text.to_string();
    let mut insertions = 0;

    for abbreviation in periods {
        let Some(pattern) = whole_word_regex(abbreviation, false) else {
            continue;
        };

        let count = pattern.find_iter(&current).count();
        if count == 0 {
            continue;
        }

        let dotted = dotted(abbreviation);
        current = pattern
            .replace_all(&current, regex::NoExpand(&dotted))
            .into_owned();
        insertions += count;
    }

    PeriodsOutcome {
        text: current,
        abbreviations: periods.len(),
        insertions,
    }
}

fn dotted(abbreviation: &str) -> String {
    let mut out = String::with_capacity(abbreviation.len() * 2);
    for c in abbreviation.chars() {
        out.push(c);
        out.push('.');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement(r"\1-\2"), "${1}-${2}");
        assert_eq!(translate_replacement(r"\g<word>!"), "${word}!");
        assert_eq!(translate_replacement("cost $5"), "cost $$5");
        assert_eq!(translate_replacement(r"a\\b"), r"a\b");
        assert_eq!(translate_replacement(r"x\ny"), "x\ny");
        assert_eq!(translate_replacement(r"\q"), r"\q");
        assert_eq!(translate_replacement(r"\g"), r"\g");
    }

    #[test]
    fn test_replacements_apply_in_order() {
        let outcome = apply_automatic_replacements(
            "teh cat , teh dog",
            &rules(&[("teh", "the"), (r"\s+,", ","), ("the dog", "a dog")]),
        );
        assert_eq!(outcome.text, "the cat, a dog");
        assert_eq!(outcome.rules, 3);
        assert_eq!(outcome.replacements, 4);
        assert!(outcome.failed.is_empty());
    }

    #[test]
    fn test_backreferences() {
        let outcome = apply_automatic_replacements(
            "Smith, John",
            &rules(&[(r"(\w+), (\w+)", r"\2 \1")]),
        );
        assert_eq!(outcome.text, "John Smith");
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let outcome = apply_automatic_replacements(
            "a (b) c",
            &rules(&[("(unclosed", "x"), ("c", "d")]),
        );
        assert_eq!(outcome.text, "a (b) d");
        assert_eq!(outcome.replacements, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].to_string().contains("(unclosed"));
    }

    #[test]
    fn test_replacements_idempotent_once_clean() {
        let rule_set = rules(&[("colour", "color"), (r"\s{2,}", " ")]);
        let first = apply_automatic_replacements("colour  and colour", &rule_set);
        let second = apply_automatic_replacements(&first.text, &rule_set);
        assert_eq!(second.replacements, 0);
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn test_insert_periods_whole_word() {
        let periods: BTreeSet<String> = ["Mr", "Dr"].iter().map(|s| s.to_string()).collect();
        let outcome = insert_periods("Mr Smith met Dr Mrs Jones. Mr", &periods);
        assert_eq!(outcome.text, "M.r. Smith met D.r. Mrs Jones. M.r.");
        assert_eq!(outcome.abbreviations, 2);
        assert_eq!(outcome.insertions, 3);
    }
}
