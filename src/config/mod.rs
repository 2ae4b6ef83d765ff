// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration file support.
//!
//! ```text
//! Priority (low -> high)
//! 1. defaults
//! 2. rask.toml (cwd, optional)
//! 3. RASK_* env vars
//! 4. CLI flags
//! ```
//!
//! The file only supplies defaults for ambient settings; everything
//! about the task graph itself lives in the build program.
//!
//! ```toml
//! log_level = "debug"
//! color = false
//! parallel_tasks = true
//!
//! [cache]
//! dir = ".rask_tool/cache"
//! mtime_grace_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::logging::LogLevel;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rask.toml";

/// Ambient build settings loaded from `rask.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RaskConfig {
    /// Default console log level.
    pub log_level: Option<LogLevel>,

    /// Optional log file path.
    pub log_file: Option<String>,

    /// Default for ANSI color output.
    pub color: Option<bool>,

    /// Default for the parallel worker pool.
    pub parallel_tasks: Option<bool>,

    /// Cache settings.
    pub cache: CacheConfig,
}

/// Cache-related settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache directory, relative to the working directory.
    pub dir: Option<PathBuf>,

    /// Grace window in milliseconds within which a file whose mtime is
    /// close to its hash file's mtime is considered fresh.
    pub mtime_grace_ms: Option<u64>,
}

/// Builder-style loader mirroring the layered file/env setup.
pub struct ConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: config::Config::builder(),
        }
    }

    /// Adds a TOML file that must exist.
    #[must_use]
    pub fn add_toml_file(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.builder = self.builder.add_source(
            config::File::from(path.as_ref()).format(config::FileFormat::Toml),
        );
        self
    }

    /// Adds a TOML file that may be absent.
    #[must_use]
    pub fn add_toml_file_optional(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.builder = self.builder.add_source(
            config::File::from(path.as_ref())
                .format(config::FileFormat::Toml)
                .required(false),
        );
        self
    }

    /// Adds `RASK_*` environment variables as a source
    /// (e.g. `RASK_LOG_LEVEL=debug`).
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.builder = self
            .builder
            .add_source(config::Environment::with_prefix("RASK"));
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a required file is missing or a value
    /// fails to deserialize.
    pub fn build(self) -> Result<RaskConfig> {
        let config = self
            .builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
        config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))
    }
}

/// Loads `rask.toml` from the working directory if present, with
/// environment overrides applied.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be parsed.
pub fn load_default() -> Result<RaskConfig> {
    ConfigLoader::new()
        .add_toml_file_optional(DEFAULT_CONFIG_FILE)
        .with_env()
        .build()
}
