use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Rule collections loaded from the `.data.txt` data file.
///
/// Each field corresponds to one `# SECTION` of the file. Maps use
/// [`IndexMap`] so that iteration follows file order: `choices` drives the
/// order words are reviewed in, and option lists keep the user-visible
/// button order. Sets are ordered so that rewrites are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// `# CHOICE`: word -> ordered replacement options
    pub choices: IndexMap<String, Vec<String>>,

    /// `# REPLACE`: regex pattern -> replacement (may contain backreferences)
    pub replacements: IndexMap<String, String>,

    /// `# PERIODS`: abbreviations that get periods inserted (`Mr` -> `M.r.`)
    pub periods: BTreeSet<String>,

    /// `# CAP_IGNORE`: all-caps sequences never prompted for
    pub ignore_set: BTreeSet<String>,

    /// `# UPPER_TO_LOWER`: all-caps sequences always lowercased
    pub lowercase_set: BTreeSet<String>,

    /// `# ROMAN_IGNORE`: upper-cased tokens the Roman converter leaves alone
    pub roman_ignore_set: BTreeSet<String>,

    /// `# DEFAULT_FILE_DIR`: starting directory for file selection
    pub default_directory: Option<Utf8PathBuf>,
}

impl RuleSet {
    /// Total number of rules across all sections, for log lines.
    pub fn rule_count(&self) -> usize {
        self.choices.len()
            + self.replacements.len()
            + self.periods.len()
            + self.ignore_set.len()
            + self.lowercase_set.len()
            + self.roman_ignore_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0 && self.default_directory.is_none()
    }
}
