use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Strict subtractive-notation grammar for 1..=3999
static VALIDATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^M{0,3}(?:CM|CD|D?C{0,3})(?:XC|XL|L?X{0,3})(?:IX|IV|V?I{0,3})$")
        .expect("Invalid Roman validator regex")
});

/// Characters that may not touch a numeral on either side (besides ASCII letters)
const GUARD_SYMBOLS: &[char] = &['&', '.', '-', '+', ':', ';', '/', '\\'];

/// Characters of context kept on each side of a conversion
const CONTEXT_CHARS: usize = 10;

/// Convert a Roman numeral to its value.
///
/// The token is upper-cased first. A bare `I` is rejected since it is far more
/// often the pronoun. Anything that does not follow the standard grammar is
/// rejected rather than parsed loosely.
pub fn roman_to_arabic(token: &str) -> Option<u32> {
    let roman = token.to_uppercase();
    if roman.is_empty() || roman == "I" || !VALIDATOR.is_match(&roman) {
        return None;
    }

    let mut total: i64 = 0;
    let mut prev = 0;
    for c in roman.chars().rev() {
        let value = match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            'D' => 500,
            'M' => 1000,
            _ => return None,
        };
        if value >= prev {
            total += value;
        } else {
            total -= value;
        }
        prev = value;
    }

    u32::try_from(total).ok().filter(|&v| v > 0)
}

/// One converted numeral, for the conversion side log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomanConversion {
    pub token: String,
    pub value: u32,
    pub context: String,
}

impl RomanConversion {
    /// One line per conversion; line breaks in the context are escaped.
    pub fn log_line(&self) -> String {
        format!(
            "Converted '{}' to '{}' in context: ...{}...",
            self.token,
            self.value,
            self.context.replace('\r', "\\r").replace('\n', "\\n")
        )
    }
}

/// Outcome of [`RomanNumeralConverter::convert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomanOutcome {
    pub text: String,
    pub conversions: Vec<RomanConversion>,
}

/// Finds Roman numerals in running text and replaces them with decimal numbers.
///
/// Candidates are whole words made only of `MDCLXVI`. A candidate is dropped when
/// it touches a letter or one of `& . - + : ; / \` on either side, which keeps
/// abbreviations like `Ph.D.` and `R&D` intact. A lone `I` never matches and a
/// single letter must be one of `VXLCDM`.
pub struct RomanNumeralConverter {
    candidate_pattern: Regex,
}

impl RomanNumeralConverter {
    pub fn new() -> Self {
        Self {
            candidate_pattern: Regex::new(r"\b[MDCLXVI]+\b").expect("Invalid Roman candidate regex"),
        }
    }

    /// Replace every convertible numeral not present in `ignore` (upper-cased tokens).
    pub fn convert(&self, text: &str, ignore: &BTreeSet<String>) -> RomanOutcome {
        let mut out = String::with_capacity(text.len());
        let mut conversions = Vec::new();
        let mut last_end = 0;

        for m in self.candidate_pattern.find_iter(text) {
            let token = m.as_str();
            if !self.is_candidate(text, m.start(), m.end(), token) {
                continue;
            }

            if ignore.contains(&token.to_uppercase()) {
                tracing::debug!("Skipping roman numeral '{}' (in ignore list)", token);
                continue;
            }

            let Some(value) = roman_to_arabic(token) else {
                continue;
            };

            out.push_str(&text[last_end..m.start()]);
            out.push_str(&value.to_string());
            last_end = m.end();

            conversions.push(RomanConversion {
                token: token.to_string(),
                value,
                context: surrounding(text, m.start(), m.end()),
            });
        }
        out.push_str(&text[last_end..]);

        RomanOutcome {
            text: out,
            conversions,
        }
    }

    fn is_candidate(&self, text: &str, start: usize, end: usize, token: &str) -> bool {
        let single_ok = token.len() >= 2 || matches!(token, "V" | "X" | "L" | "C" | "D" | "M");
        if !single_ok {
            return false;
        }

        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(is_guard) && !after.is_some_and(is_guard)
    }
}

impl Default for RomanNumeralConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_guard(c: char) -> bool {
    c.is_ascii_alphabetic() || GUARD_SYMBOLS.contains(&c)
}

/// Up to [`CONTEXT_CHARS`] characters either side of a span, plus the span.
fn surrounding(text: &str, start: usize, end: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_CHARS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn to_roman(mut n: u32) -> String {
        const TABLE: [(u32, &str); 13] = [
            (1000, "M"),
            (900, "CM"),
            (500, "D"),
            (400, "CD"),
            (100, "C"),
            (90, "XC"),
            (50, "L"),
            (40, "XL"),
            (10, "X"),
            (9, "IX"),
            (5, "V"),
            (4, "IV"),
            (1, "I"),
        ];
        let mut out = String::new();
        for (value, letters) in TABLE {
            while n >= value {
                out.push_str(letters);
                n -= value;
            }
        }
        out
    }

    #[test]
    fn test_roman_values() {
        assert_eq!(roman_to_arabic("IV"), Some(4));
        assert_eq!(roman_to_arabic("ix"), Some(9));
        assert_eq!(roman_to_arabic("XIV"), Some(14));
        assert_eq!(roman_to_arabic("MCMXCIV"), Some(1994));
        assert_eq!(roman_to_arabic("MMMCMXCIX"), Some(3999));
        assert_eq!(roman_to_arabic("II"), Some(2));
    }

    #[test]
    fn test_roman_rejects() {
        assert_eq!(roman_to_arabic("I"), None);
        assert_eq!(roman_to_arabic("i"), None);
        assert_eq!(roman_to_arabic("IIII"), None);
        assert_eq!(roman_to_arabic("VX"), None);
        assert_eq!(roman_to_arabic("ABC"), None);
        assert_eq!(roman_to_arabic("MMMM"), None);
        assert_eq!(roman_to_arabic(""), None);
    }

    #[test]
    fn test_log_line_stays_on_one_line() {
        let converter = RomanNumeralConverter::new();
        let outcome = converter.convert("End\r\nBook IX\nNext", &BTreeSet::new());
        let line = outcome.conversions[0].log_line();
        assert_eq!(line, "Converted 'IX' to '9' in context: ...End\\r\\nBook IX\\nNext...");
        assert_eq!(line.lines().count(), 1);
    }

    #[test]
    fn test_convert_in_text() {
        let converter = RomanNumeralConverter::new();
        let outcome = converter.convert("Chapter XIV begins. Part II, verse IV here", &BTreeSet::new());
        assert_eq!(outcome.text, "Chapter 14 begins. Part 2, verse 4 here");
        assert_eq!(outcome.conversions.len(), 3);
        assert_eq!(
            outcome.conversions[0].log_line(),
            "Converted 'XIV' to '14' in context: ...Chapter XIV begins. P..."
        );

        // A trailing period guards the numeral
        let outcome = converter.convert("verse IV.", &BTreeSet::new());
        assert_eq!(outcome.text, "verse IV.");
    }

    #[test]
    fn test_guards_protect_abbreviations() {
        let converter = RomanNumeralConverter::new();
        let text = "I went to R&D for a Ph.D. at MIT; CD-ROM and C/C++ and I.";
        let outcome = converter.convert(text, &BTreeSet::new());
        assert_eq!(outcome.text, text);
        assert!(outcome.conversions.is_empty());
    }

    #[test]
    fn test_single_letters() {
        let converter = RomanNumeralConverter::new();
        let outcome = converter.convert("Henry V and I, vol X", &BTreeSet::new());
        assert_eq!(outcome.text, "Henry 5 and I, vol 10");
    }

    #[test]
    fn test_ignore_list_and_invalid_tokens() {
        let converter = RomanNumeralConverter::new();
        let ignore: BTreeSet<String> = ["MIX".to_string()].into_iter().collect();
        let outcome = converter.convert("MIX it, DIM the CIVIC lights, VIII", &ignore);
        assert_eq!(outcome.text, "MIX it, DIM the CIVIC lights, 8");
    }

    #[test]
    fn test_context_is_char_based() {
        assert_eq!(surrounding("ééééééééééééXIVéé", 24, 27), "ééééééééééXIVéé");
    }

    proptest! {
        #[test]
        fn prop_canonical_numerals_parse(n in 2u32..4000) {
            prop_assert_eq!(roman_to_arabic(&to_roman(n)), Some(n));
        }

        #[test]
        fn prop_never_panics(s in "[IVXLCDMivxlcdmA-Z]{0,12}") {
            let _ = roman_to_arabic(&s);
        }
    }
}
