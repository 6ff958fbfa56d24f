//! Logging setup for the meshroute simulator
//!
//! Builds the global `tracing` subscriber used by the simulator binary and
//! tests, and provides per-node context so log lines emitted while a node is
//! processing its tick can be attributed to that node.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines on the console (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **File Output**: Optional JSONL copy through `tracing-appender`
//! - **Node Context**: [`NodeContextGuard`] tags spans with the active node id
//!
//! # Quick Start
//!
//! ```ignore
//! use meshroute_logging::{LogConfig, MeshSubscriberBuilder};
//!
//! // Pretty output for `meshroute --verbose`, plus a JSONL copy on disk.
//! // Keep the guard alive or buffered file lines are lost on exit.
//! let _guard = MeshSubscriberBuilder::new()
//!     .with_config(LogConfig::development().with_file("./logs"))
//!     .try_init()?;
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, LogConfig};
pub use context::{NodeContextData, NodeContextGuard};
pub use layers::NodeContextLayer;

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Boxed layer over the filtered registry, lets console and file layers of
/// different formats share one subscriber type
type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Builder for configuring and initializing the logging subscriber
pub struct MeshSubscriberBuilder {
    config: LogConfig,
}

impl MeshSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: JSONL output to console
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns an error if a global subscriber has already been set.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, tracing_subscriber::util::TryInitError> {
        let (layers, guard) = self.build_layers();
        Registry::default()
            .with(self.env_filter())
            .with(layers)
            .try_init()?;
        Ok(guard)
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level))
    }

    fn build_layers(&self) -> (Vec<BoxedLayer>, Option<WorkerGuard>) {
        let mut layers: Vec<BoxedLayer> = vec![NodeContextLayer::new().boxed()];
        let mut guard = None;

        if self.config.console.enabled {
            if self.config.console.pretty {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(self.config.console.ansi)
                        .with_target(true)
                        .boxed(),
                );
            } else {
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .flatten_event(true)
                        .boxed(),
                );
            }
        }

        if let Some(file_config) = &self.config.file {
            match create_file_writer(file_config) {
                Ok((writer, file_guard)) => {
                    guard = Some(file_guard);
                    layers.push(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_current_span(true)
                            .with_span_list(true)
                            .flatten_event(true)
                            .with_writer(writer)
                            .boxed(),
                    );
                }
                Err(e) => {
                    eprintln!(
                        "Warning: failed to open log file in {}: {}",
                        file_config.directory.display(),
                        e
                    );
                }
            }
        }

        (layers, guard)
    }
}

impl Default for MeshSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create the non-blocking file writer, truncating any previous log
fn create_file_writer(file_config: &FileConfig) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&file_config.directory)?;
    Ok(tracing_appender::non_blocking(File::create(file_config.path())?))
}

/// Initialize logging for testing (minimal output, tolerates repeated calls)
pub fn init_testing() {
    let _ = MeshSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = MeshSubscriberBuilder::new();
        assert_eq!(builder.config.default_level, "info");
    }

    #[test]
    fn test_default_is_jsonl() {
        let builder = MeshSubscriberBuilder::new();
        assert!(!builder.config.console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = MeshSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config.default_level, "debug");
        assert!(builder.config.console.pretty);
    }

    #[test]
    fn test_console_only_builds_context_and_console_layers() {
        let builder = MeshSubscriberBuilder::new().with_config(LogConfig::interactive());
        let (layers, guard) = builder.build_layers();
        assert_eq!(layers.len(), 2);
        assert!(guard.is_none());
    }

    #[test]
    fn test_console_disabled_builds_only_context_layer() {
        let mut config = LogConfig::testing();
        config.console.enabled = false;
        let (layers, guard) = MeshSubscriberBuilder::new().with_config(config).build_layers();
        assert_eq!(layers.len(), 1);
        assert!(guard.is_none());
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
    }
}
