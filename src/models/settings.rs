use serde::{Deserialize, Serialize};

/// Application settings from `bookfix_settings.yaml`
///
/// Environment variables prefixed `BOOKFIX__` override file values
/// (see [`crate::config::ConfigManager::load_settings`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console_logging")]
    pub console_logging: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Directory for the diagnostic side files; empty disables them.
    #[serde(default = "default_side_log_dir")]
    pub side_log_dir: String,

    #[serde(default)]
    pub steps: StepToggles,
}

/// Which pipeline steps and interactive passes are enabled.
///
/// Unknown keys in the settings file are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepToggles {
    #[serde(default = "enabled")]
    pub automatic_replacements: bool,

    #[serde(default = "enabled")]
    pub insert_periods: bool,

    #[serde(default = "enabled")]
    pub remove_pagination: bool,

    #[serde(default = "enabled")]
    pub roman_numerals: bool,

    #[serde(default)]
    pub convert_lowercase: bool,

    #[serde(default)]
    pub remove_blank_lines: bool,

    #[serde(default = "enabled")]
    pub interactive_choices: bool,

    #[serde(default = "enabled")]
    pub all_caps_processing: bool,

    #[serde(default = "enabled")]
    pub numbered_line_edit: bool,
}

impl Default for StepToggles {
    fn default() -> Self {
        Self {
            automatic_replacements: true,
            insert_periods: true,
            remove_pagination: true,
            roman_numerals: true,
            convert_lowercase: false,
            remove_blank_lines: false,
            interactive_choices: true,
            all_caps_processing: true,
            numbered_line_edit: true,
        }
    }
}

impl StepToggles {
    /// Every step and pass turned off; handy as a starting point in tests.
    pub fn none() -> Self {
        Self {
            automatic_replacements: false,
            insert_periods: false,
            remove_pagination: false,
            roman_numerals: false,
            convert_lowercase: false,
            remove_blank_lines: false,
            interactive_choices: false,
            all_caps_processing: false,
            numbered_line_edit: false,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            console_logging: default_console_logging(),
            log_dir: default_log_dir(),
            side_log_dir: default_side_log_dir(),
            steps: StepToggles::default(),
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_console_logging() -> bool {
    true
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_side_log_dir() -> String {
    "logs/diagnostics".to_string()
}
