//! Run configuration and its defaults.

use std::path::PathBuf;

/// Nominal size of a decoded chunk (10 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Substring marking an engine evaluation comment.
pub const DEFAULT_EVAL_MARKER: &str = "[%eval";

/// Substring marking a bullet time control game.
pub const DEFAULT_BULLET_MARKER: &str = "Bullet";

/// Tag that opens the header section of every record.
pub const DEFAULT_RECORD_TAG: &str = "[Event ";

pub const DEFAULT_PREFIX: &str = "evals";
pub const DEFAULT_BULLET_PREFIX: &str = "bullets";

/// Archive suffixes picked up from the input directory.
pub const DEFAULT_ARCHIVE_SUFFIXES: &[&str] = &[".pgn.zst", ".pgn.gz"];

/// Everything one extraction run needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Rotation threshold in record bytes.
    pub max_bytes: u64,
    pub chunk_size: usize,
    pub eval_marker: String,
    pub bullet_marker: String,
    pub record_tag: String,
    pub prefix: String,
    /// Prefix for diverted bullet games; `None` drops them.
    pub bullet_prefix: Option<String>,
    pub archive_suffixes: Vec<String>,
    pub report: Option<PathBuf>,
}

impl Config {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            max_bytes,
            chunk_size: DEFAULT_CHUNK_SIZE,
            eval_marker: DEFAULT_EVAL_MARKER.to_string(),
            bullet_marker: DEFAULT_BULLET_MARKER.to_string(),
            record_tag: DEFAULT_RECORD_TAG.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            bullet_prefix: None,
            archive_suffixes: DEFAULT_ARCHIVE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            report: None,
        }
    }

    /// Sets the decoded chunk size. Zero is bumped to one byte.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn markers(mut self, eval: impl Into<String>, bullet: impl Into<String>) -> Self {
        self.eval_marker = eval.into();
        self.bullet_marker = bullet.into();
        self
    }

    pub fn record_tag(mut self, tag: impl Into<String>) -> Self {
        self.record_tag = tag.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Writes bullet games carrying evals to their own rotating output.
    pub fn divert_bullets(mut self, prefix: impl Into<String>) -> Self {
        self.bullet_prefix = Some(prefix.into());
        self
    }

    pub fn archive_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.archive_suffixes = suffixes;
        self
    }

    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.report = Some(path.into());
        self
    }
}
