// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI options using clap derive.
//!
//! ```text
//! rask [options] [TASK [:ARG]...]...
//!
//! -l --log-level LEVEL     debug|info|warn|error|fine|trace|profile
//! -c --color / --no-color  ANSI styling (default on, NO_COLOR honored)
//! -f --force-tasks         run selected tasks even if up-to-date
//! -p --parallel-tasks / --no-parallel-tasks
//! -s --show-tasks          informational, no execution
//! -g --show-task-graph     informational, no execution
//! -z --reset-cache         wipe the cache before running
//! -d --disable-cache       no cache reads or writes, implies force
//! -v --version  -h --help
//! ```
//!
//! The embedding build program passes its raw argument vector to
//! [`parse_from`]; rask is a library, so there is no `std::env::args`
//! call in here.

use clap::Parser;

use crate::logging::LogLevel;

/// Command-line options for a build run.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "rask",
    version,
    disable_version_flag = true,
    about = "Incremental task runner",
    long_about = "Runs the tasks selected on the command line together with their \
                  transitive dependencies, skipping every task whose inputs and \
                  outputs are unchanged since its last successful run.\n\n\
                  Tasks are selected by name; a name may be abbreviated by \
                  camel-case word prefixes (e.g. `cAll` for `cleanAll`). Tokens \
                  starting with `:` are passed to the preceding task as arguments."
)]
pub struct Options {
    /// Log level for console output.
    #[arg(short = 'l', long = "log-level", value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Enables ANSI color output (default).
    #[arg(short = 'c', long = "color", overrides_with = "no_color")]
    pub color: bool,

    /// Disables ANSI color output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Runs every selected task even if it is up-to-date.
    #[arg(short = 'f', long = "force-tasks")]
    pub force_tasks: bool,

    /// Runs parallelizable tasks on background workers (default).
    #[arg(short = 'p', long = "parallel-tasks", overrides_with = "no_parallel_tasks")]
    pub parallel_tasks: bool,

    /// Runs every task on the main worker.
    #[arg(long = "no-parallel-tasks")]
    pub no_parallel_tasks: bool,

    /// Shows the tasks of the build grouped by phase, without running anything.
    #[arg(short = 's', long = "show-tasks")]
    pub show_tasks: bool,

    /// Shows the task dependency graph, without running anything.
    #[arg(short = 'g', long = "show-task-graph")]
    pub show_task_graph: bool,

    /// Deletes the cache before running.
    #[arg(short = 'z', long = "reset-cache")]
    pub reset_cache: bool,

    /// Disables all cache reads and writes; implies --force-tasks.
    #[arg(short = 'd', long = "disable-cache")]
    pub disable_cache: bool,

    /// Prints the version.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: (),

    /// Tasks to run, each optionally followed by `:ARG` tokens.
    #[arg(value_name = "TASK [:ARG]...")]
    pub tasks: Vec<String>,
}

impl Options {
    /// Whether color output was requested (before `NO_COLOR` handling).
    #[must_use]
    pub const fn color_requested(&self) -> bool {
        !self.no_color
    }

    /// Whether parallel workers are enabled.
    #[must_use]
    pub const fn parallel_enabled(&self) -> bool {
        !self.no_parallel_tasks
    }

    /// Whether selected tasks must run regardless of their run condition.
    ///
    /// `--disable-cache` implies force: without cache reads there is no
    /// way to prove a task up-to-date.
    #[must_use]
    pub const fn force(&self) -> bool {
        self.force_tasks || self.disable_cache
    }

    /// Whether the invocation is informational only.
    #[must_use]
    pub const fn show_info_only(&self) -> bool {
        self.show_tasks || self.show_task_graph
    }
}

/// Parses options from an iterator over arguments (without program name).
///
/// # Errors
///
/// Returns a `clap::Error` on invalid arguments, or when help/version
/// output was requested.
pub fn try_parse_from<I, T>(iter: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let argv = std::iter::once(std::ffi::OsString::from("rask"))
        .chain(iter.into_iter().map(Into::into));
    Options::try_parse_from(argv)
}

/// Parses options from an iterator over arguments, exiting on error.
pub fn parse_from<I, T>(iter: I) -> Options
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let argv = std::iter::once(std::ffi::OsString::from("rask"))
        .chain(iter.into_iter().map(Into::into));
    Options::parse_from(argv)
}

#[cfg(test)]
mod tests;
