//! Configuration types for the logging system
//!
//! The `meshroute` binary picks [`LogConfig::interactive`] by default,
//! [`LogConfig::development`] under `--verbose`, and adds a file copy with
//! [`LogConfig::with_file`] when `--log-dir` is given.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level (can be overridden by RUST_LOG)
    pub default_level: String,

    /// Console output configuration
    pub console: ConsoleConfig,

    /// JSONL copy of the log on disk
    pub file: Option<FileConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
        }
    }
}

impl LogConfig {
    /// Verbose, human-readable console output
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            console: ConsoleConfig::pretty(),
            file: None,
        }
    }

    /// Only warnings reach the terminal so the shell output stays readable
    pub fn interactive() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig::pretty(),
            file: None,
        }
    }

    /// Minimal output for tests
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Route a JSONL copy of every event into `directory/meshroute.log`
    pub fn with_file(mut self, directory: impl Into<PathBuf>) -> Self {
        self.file = Some(FileConfig {
            directory: directory.into(),
            ..FileConfig::default()
        });
        self
    }
}

/// Console output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
}

impl ConsoleConfig {
    fn pretty() -> Self {
        Self {
            enabled: true,
            pretty: true,
            ansi: true,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }
}

/// File output configuration
///
/// The file is truncated when the subscriber starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name without the `.log` extension
    pub prefix: String,
}

impl FileConfig {
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.log", self.prefix))
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "meshroute".to_string(),
        }
    }
}
