// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Logging infrastructure using the `tracing` ecosystem.
//!
//! ```text
//! init_logging(&LogConfig)
//!        |
//!        v
//!    registry
//!    |       |
//!    v       v
//! Console   File (optional)
//! EnvFilter EnvFilter
//! ANSI      non_blocking
//!        |
//!        v
//!    LogGuard (flush on drop)
//!
//! LogLevel: error warn info debug fine trace profile
//!           (fine/profile are finer-grained aliases
//!            mapped onto tracing's five levels)
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::Result;

/// Named log level for the CLI and the configuration file.
///
/// The seven user-facing levels map onto tracing's five:
///
/// | Level   | tracing directive |
/// |---------|-------------------|
/// | error   | error             |
/// | warn    | warn              |
/// | info    | info              |
/// | fine    | debug             |
/// | debug   | debug             |
/// | trace   | trace             |
/// | profile | trace             |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fine,
    Trace,
    Profile,
}

impl LogLevel {
    /// The tracing filter directive this level translates to.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Fine | Self::Debug => "debug",
            Self::Trace | Self::Profile => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fine => "fine",
            Self::Trace => "trace",
            Self::Profile => "profile",
        };
        f.write_str(name)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Builder)]
pub struct LogConfig {
    /// Console verbosity.
    #[builder(setters(name = with_level), default)]
    level: LogLevel,

    /// Whether ANSI styling is enabled on the console layer.
    #[builder(setters(name = with_color), default = true)]
    color: bool,

    /// Optional log file; the file layer logs at the same level.
    #[builder(setters(name = with_log_file))]
    log_file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LogConfig {
    /// Returns the console verbosity.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Returns whether ANSI styling is enabled.
    #[must_use]
    pub const fn color(&self) -> bool {
        self.color
    }

    /// Returns the log file path, if any.
    #[must_use]
    pub fn log_file(&self) -> Option<&str> {
        self.log_file.as_deref()
    }
}

/// Guard that flushes buffered file output on drop.
///
/// Hold onto this for the lifetime of the build.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Whether color output is effectively allowed.
///
/// The `NO_COLOR` environment variable, when set and non-empty,
/// overrides any request for colored output.
#[must_use]
pub fn color_allowed(requested: bool) -> bool {
    if std::env::var("NO_COLOR").is_ok_and(|v| !v.is_empty()) {
        return false;
    }
    requested
}

/// ANSI red, used for the failure report.
pub const RED: &str = "\x1b[31m";

/// ANSI green, used for the success report.
pub const GREEN: &str = "\x1b[32m";

/// ANSI reset.
pub const RESET: &str = "\x1b[0m";

/// Wraps `text` in the given ANSI style when `enabled`.
#[must_use]
pub fn stylize(text: &str, style: &str, enabled: bool) -> String {
    if enabled {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    // Third-party crates stay at warn; the level applies to rask itself.
    EnvFilter::new(format!("warn,rask={}", level.as_directive()))
}

/// Initializes the global tracing subscriber.
///
/// Safe to call when a subscriber is already installed (for example by
/// an embedding program or a previous in-process build); the existing
/// subscriber is left in place.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard> {
    let console = fmt::layer()
        .with_ansi(color_allowed(config.color()))
        .with_target(false)
        .with_filter(env_filter(config.level()));

    let (file_layer, file_guard) = match config.log_file() {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("failed to open log file '{path}': {e}"))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter(config.level()));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
