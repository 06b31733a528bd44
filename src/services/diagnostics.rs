use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The four diagnostic side files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideLog {
    /// `word -> choice` audit of interactive replacements
    Replacements,
    /// Match-list snapshots from the choice engine
    Matches,
    /// Elements and lines dropped by pagination removal
    Pagination,
    /// Roman numeral conversions with surrounding context
    RomanConversions,
}

impl SideLog {
    pub const ALL: [SideLog; 4] = [
        SideLog::Replacements,
        SideLog::Matches,
        SideLog::Pagination,
        SideLog::RomanConversions,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SideLog::Replacements => "debug.txt",
            SideLog::Matches => "matches.txt",
            SideLog::Pagination => "pagination_debug.txt",
            SideLog::RomanConversions => "roman_conversions.log",
        }
    }
}

/// Write-only diagnostic side channel.
///
/// These files are not tracing output. They are plain-text records a user can
/// open after a run to see exactly what was replaced, removed, or converted.
/// The first failure is reported with `tracing::warn!`; later ones only reach
/// `debug`. No core operation ever fails because a side file could not be written.
/// Clones share the failure latch.
#[derive(Debug, Clone, Default)]
pub struct SideLogs {
    dir: Option<Utf8PathBuf>,
    failed: Arc<AtomicBool>,
}

impl SideLogs {
    /// Side logs rooted at `dir`; the directory is created lazily on first write.
    pub fn new<P: AsRef<Utf8Path>>(dir: P) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            failed: Arc::default(),
        }
    }

    /// A side channel that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from the `side_log_dir` setting; empty disables.
    pub fn from_setting(dir: &str) -> Self {
        if dir.trim().is_empty() {
            Self::disabled()
        } else {
            Self::new(dir)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn path(&self, log: SideLog) -> Option<Utf8PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(log.file_name()))
    }

    /// Truncate all four files. Called at the start of each processing run.
    pub fn clear_all(&self) {
        for log in SideLog::ALL {
            self.reset(log);
        }
    }

    /// Truncate one file.
    pub fn reset(&self, log: SideLog) {
        self.write(log, "");
    }

    /// Replace a file's content.
    pub fn write(&self, log: SideLog, content: &str) {
        let Some(path) = self.prepare(log) else {
            return;
        };
        if let Err(e) = fs::write(&path, content) {
            self.report(format_args!("Could not write {}: {}", path, e));
        }
    }

    /// Append text to a file. A trailing newline is added if missing.
    pub fn append(&self, log: SideLog, entry: &str) {
        let Some(path) = self.prepare(log) else {
            return;
        };

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                file.write_all(entry.as_bytes())?;
                if !entry.ends_with('\n') {
                    file.write_all(b"\n")?;
                }
                Ok(())
            });

        if let Err(e) = result {
            self.report(format_args!("Could not append to {}: {}", path, e));
        }
    }

    /// Whether any write has failed since these side logs were created.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    fn report(&self, message: std::fmt::Arguments<'_>) {
        if self.failed.swap(true, Ordering::Relaxed) {
            tracing::debug!("{}", message);
        } else {
            tracing::warn!("{} (further side log failures are logged at debug level)", message);
        }
    }

    fn prepare(&self, log: SideLog) -> Option<Utf8PathBuf> {
        let dir = self.dir.as_ref()?;
        if let Err(e) = fs::create_dir_all(dir) {
            self.report(format_args!("Could not create side log directory {}: {}", dir, e));
            return None;
        }
        Some(dir.join(log.file_name()))
    }
}
