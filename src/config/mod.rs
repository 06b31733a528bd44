use crate::models::{AppSettings, RuleSet};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::ops::Range;
use thiserror::Error;

/// Name of the section-marked rule file inside the configuration directory
pub const DATA_FILE_NAME: &str = ".data.txt";

/// Name of the YAML settings file inside the configuration directory
pub const SETTINGS_FILE_NAME: &str = "bookfix_settings.yaml";

/// Prefix for environment variables overriding settings (`BOOKFIX__DEBUG_MODE=true`)
pub const ENV_PREFIX: &str = "BOOKFIX";

/// Characters stripped from the start of every data file line before comparison
const LEADING_JUNK: &[char] = &['\u{feff}', '\u{200b}', '\u{a0}'];

/// A named section of the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Choice,
    Replace,
    Periods,
    CapIgnore,
    UpperToLower,
    RomanIgnore,
    DefaultFileDir,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Choice,
        Section::Replace,
        Section::Periods,
        Section::CapIgnore,
        Section::UpperToLower,
        Section::RomanIgnore,
        Section::DefaultFileDir,
    ];

    /// The literal marker line introducing this section
    pub fn marker(self) -> &'static str {
        match self {
            Section::Choice => "# CHOICE",
            Section::Replace => "# REPLACE",
            Section::Periods => "# PERIODS",
            Section::CapIgnore => "# CAP_IGNORE",
            Section::UpperToLower => "# UPPER_TO_LOWER",
            Section::RomanIgnore => "# ROMAN_IGNORE",
            Section::DefaultFileDir => "# DEFAULT_FILE_DIR",
        }
    }

    /// Match an already-cleaned line against the known markers
    pub fn from_marker(line: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.marker() == line)
    }
}

/// Errors from reading or rewriting the data file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read data file {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write data file {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
}

/// Configuration manager for the rule data file and the YAML settings.
///
/// Manages two files in one configuration directory:
/// - Data file (`.data.txt`): hand-editable rule sections, parsed by [`parse_rules`]
/// - Settings (`bookfix_settings.yaml`): step toggles and logging options
///
/// Rewrites of the data file are partial: only the target sections change, every
/// other line (comments, untouched sections) is copied verbatim.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    data_file_path: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            data_file_path: config_dir.join(DATA_FILE_NAME),
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
        })
    }

    /// Load every rule section from the data file.
    ///
    /// Never fails: a missing or unreadable file yields an empty rule set, and
    /// malformed lines are skipped with a warning.
    pub fn load_rules(&self) -> RuleSet {
        match self.read_data_file() {
            Ok(Some(content)) => {
                let rules = parse_rules(&content);
                tracing::info!(
                    "Loaded data file {}: {} choice, {} replace, {} periods, {} ignore, {} lowercase, {} roman ignore rules",
                    self.data_file_path,
                    rules.choices.len(),
                    rules.replacements.len(),
                    rules.periods.len(),
                    rules.ignore_set.len(),
                    rules.lowercase_set.len(),
                    rules.roman_ignore_set.len()
                );
                rules
            }
            Ok(None) => {
                tracing::warn!(
                    "Data file not found at {}, starting with empty rules",
                    self.data_file_path
                );
                RuleSet::default()
            }
            Err(e) => {
                tracing::error!("{}. Starting with empty rules.", e);
                RuleSet::default()
            }
        }
    }

    /// Replace the `# DEFAULT_FILE_DIR` section with a single directory line.
    pub fn save_default_directory(&self, directory: &Utf8Path) -> Result<(), ConfigError> {
        let original = self.read_for_rewrite();
        let updated = rewrite_sections(
            &original,
            &[SectionUpdate {
                section: Section::DefaultFileDir,
                lines: vec![directory.to_string()],
                append_if_missing: true,
            }],
        );
        self.write_data_file(&updated)?;

        tracing::info!("Default directory {} saved to {}", directory, self.data_file_path);
        Ok(())
    }

    /// Rewrite the `# CAP_IGNORE` and `# UPPER_TO_LOWER` sections.
    ///
    /// Sequences are written one per line in sorted order. A missing section is
    /// appended only when its set is non-empty.
    pub fn save_caps_data(
        &self,
        ignore_set: &BTreeSet<String>,
        lowercase_set: &BTreeSet<String>,
    ) -> Result<(), ConfigError> {
        let original = self.read_for_rewrite();
        let updated = rewrite_sections(
            &original,
            &[
                SectionUpdate {
                    section: Section::CapIgnore,
                    lines: ignore_set.iter().cloned().collect(),
                    append_if_missing: !ignore_set.is_empty(),
                },
                SectionUpdate {
                    section: Section::UpperToLower,
                    lines: lowercase_set.iter().cloned().collect(),
                    append_if_missing: !lowercase_set.is_empty(),
                },
            ],
        );
        self.write_data_file(&updated)?;

        tracing::info!(
            "Data file {} updated (CAP_IGNORE: {}, UPPER_TO_LOWER: {})",
            self.data_file_path,
            ignore_set.len(),
            lowercase_set.len()
        );
        Ok(())
    }

    /// Load application settings, layering `BOOKFIX__*` environment variables
    /// over the YAML file. A missing file yields defaults.
    pub fn load_settings(&self) -> Result<AppSettings> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.settings_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize::<AppSettings>()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save application settings as YAML.
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn data_file_path(&self) -> &Utf8Path {
        &self.data_file_path
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    fn read_data_file(&self) -> Result<Option<String>, ConfigError> {
        if !self.data_file_path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&self.data_file_path)
            .map(Some)
            .map_err(|source| ConfigError::Read {
                path: self.data_file_path.clone(),
                source,
            })
    }

    /// Existing content for a partial rewrite; unreadable files are treated as empty
    /// so that at least the target sections get written.
    fn read_for_rewrite(&self) -> String {
        match self.read_data_file() {
            Ok(content) => content.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("{}. Writing only the target sections.", e);
                String::new()
            }
        }
    }

    fn write_data_file(&self, content: &str) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.data_file_path.clone(),
            source,
        };

        if let Some(parent) = self.data_file_path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.data_file_path, content).map_err(write_err)
    }
}

/// Trim a raw line and strip leading byte-order marks and zero-width characters.
fn clean_line(line: &str) -> &str {
    line.trim().trim_start_matches(LEADING_JUNK)
}

/// Parse data file content into a [`RuleSet`].
///
/// Lines before the first marker are ignored. Inside a section, blank lines and
/// `#` comments are skipped.
pub fn parse_rules(content: &str) -> RuleSet {
    let mut rules = RuleSet::default();
    let mut current: Option<Section> = None;

    for (i, raw) in content.lines().enumerate() {
        let line = clean_line(raw);

        if let Some(section) = Section::from_marker(line) {
            tracing::debug!("Line {}: section {}", i + 1, line);
            current = Some(section);
            continue;
        }

        let Some(section) = current else {
            continue;
        };
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match section {
            Section::Choice => match split_rule(line) {
                Some((word, options)) => {
                    let options: Vec<String> = options
                        .split(';')
                        .map(str::trim)
                        .filter(|opt| !opt.is_empty())
                        .map(str::to_string)
                        .collect();
                    if word.is_empty() || options.is_empty() {
                        tracing::warn!("Skipping empty choice line {}: '{}'", i + 1, line);
                    } else {
                        rules.choices.insert(word.to_string(), options);
                    }
                }
                None => tracing::warn!("Skipping malformed choice line {}: '{}'", i + 1, line),
            },
            Section::Replace => match split_rule(line) {
                Some((old, new)) if !old.is_empty() => {
                    rules.replacements.insert(old.to_string(), new.to_string());
                }
                _ => tracing::warn!("Skipping malformed replacement line {}: '{}'", i + 1, line),
            },
            Section::Periods => {
                rules.periods.insert(line.to_string());
            }
            Section::CapIgnore => {
                rules.ignore_set.insert(line.to_string());
            }
            Section::UpperToLower => {
                rules.lowercase_set.insert(line.to_string());
            }
            Section::RomanIgnore => {
                rules.roman_ignore_set.insert(line.to_uppercase());
            }
            Section::DefaultFileDir => {
                if rules.default_directory.is_some() {
                    continue;
                }
                let candidate = expand_home(line);
                if candidate.is_dir() {
                    tracing::debug!("Default directory: {}", candidate);
                    rules.default_directory = Some(candidate);
                } else {
                    tracing::warn!("Invalid default directory in data file: '{}'", line);
                }
            }
        }
    }

    rules
}

/// Split `left -> right` into trimmed halves; `None` unless there is exactly one arrow.
fn split_rule(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split("->");
    let left = parts.next()?;
    let right = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((left.trim(), right.trim()))
}

fn expand_home(path: &str) -> Utf8PathBuf {
    let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"));
    match (path.strip_prefix('~'), home) {
        (Some(rest), Ok(home)) if rest.is_empty() || rest.starts_with(['/', '\\']) => {
            Utf8PathBuf::from(format!("{}{}", home, rest))
        }
        _ => Utf8PathBuf::from(path),
    }
}

/// New content for one section during a partial rewrite
struct SectionUpdate {
    section: Section,
    lines: Vec<String>,
    append_if_missing: bool,
}

/// Content line ranges for every occurrence of every marker, keyed by marker line index.
///
/// A range runs from the line after the marker to the line before the next
/// recognized marker (or end of file).
fn section_ranges(lines: &[&str]) -> HashMap<usize, (Section, Range<usize>)> {
    let markers: Vec<(usize, Section)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| Section::from_marker(clean_line(line)).map(|s| (i, s)))
        .collect();

    markers
        .iter()
        .enumerate()
        .map(|(n, &(i, section))| {
            let end = markers.get(n + 1).map(|&(j, _)| j).unwrap_or(lines.len());
            (i, (section, i + 1..end))
        })
        .collect()
}

/// Replace the content of each updated section and copy everything else verbatim.
///
/// Trailing blank lines of a replaced range are kept so the spacing before the
/// next marker survives. If a section marker appears more than once, the first
/// occurrence receives the content and later occurrences are emptied.
fn rewrite_sections(original: &str, updates: &[SectionUpdate]) -> String {
    let lines: Vec<&str> = original.split_inclusive('\n').collect();
    let ranges = section_ranges(&lines);

    let mut out = String::with_capacity(original.len());
    let mut handled: Vec<Section> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some((section, range)) = ranges.get(&i) else {
            out.push_str(lines[i]);
            i += 1;
            continue;
        };
        let Some(update) = updates.iter().find(|u| u.section == *section) else {
            out.push_str(lines[i]);
            i += 1;
            continue;
        };

        push_line(&mut out, lines[i]);
        if !handled.contains(section) {
            for content in &update.lines {
                push_line(&mut out, content);
            }
            handled.push(*section);
        }

        let trailing_blank = lines[range.clone()]
            .iter()
            .rev()
            .take_while(|line| line.trim().is_empty())
            .count();
        for blank in &lines[range.end - trailing_blank..range.end] {
            out.push_str(blank);
        }

        i = range.end;
    }

    for update in updates {
        if handled.contains(&update.section) || !update.append_if_missing {
            continue;
        }
        if !out.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            if !out.ends_with("\n\n") {
                out.push('\n');
            }
        }
        push_line(&mut out, update.section.marker());
        for content in &update.lines {
            push_line(&mut out, content);
        }
    }

    out
}

/// Append a line, making sure it is newline-terminated.
fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push('\n');
    }
}
