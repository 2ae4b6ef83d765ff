// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Error handling module.
//!
//! ```text
//!                 RaskError
//!                     |
//!     +---------------+----------------+
//!     v               v                v
//! configuration    run-time        aggregate
//! UnknownTask      Failed          Multiple
//! CycleDetected    MissingOutputs
//! PhaseInversion   NotDeleted
//! OutputClash      Cancelled
//! ...
//!
//! Configuration errors abort before any task runs.
//! Run-time errors cancel further groups but let
//! group siblings finish. Every variant maps to a
//! process exit code via `exit_code()`.
//! ```

use thiserror::Error;

/// Convenience alias for `anyhow::Result`.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`RaskError`].
pub type RaskResult<T> = std::result::Result<T, RaskError>;

/// Exit code for unexpected internal errors (panics reaching the runner).
pub const INTERNAL_ERROR_CODE: u8 = 22;

/// Exit code reserved for the external build-script compiler collaborator.
pub const COMPILATION_ERROR_CODE: u8 = 2;

/// Exit code for bad CLI arguments or a missing build file.
pub const USAGE_ERROR_CODE: u8 = 4;

/// Top-level error type.
///
/// Each variant carries a stable message; `exit_code()` maps the variant
/// to the process exit status.
#[derive(Debug, Error)]
pub enum RaskError {
    /// A requested task name matched no known task.
    #[error("unknown task: '{0}'")]
    UnknownTask(String),

    /// A fuzzy task name matched more than one candidate.
    #[error("ambiguous task name '{name}', could be any of: {}", .candidates.join(", "))]
    AmbiguousTask {
        name: String,
        candidates: Vec<String>,
    },

    /// A task declares a dependency on a name that does not exist.
    #[error("unknown dependency: [{}]", .path.join(" -> "))]
    UnknownDependency { path: Vec<String> },

    /// The dependency graph contains a cycle.
    #[error("cycle detected: [{}]", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    /// A task depends on another task in a later phase.
    #[error("phase inversion: {}", .violations.join("; "))]
    PhaseInversion { violations: Vec<String> },

    /// Two unrelated tasks share inputs/outputs without a declared dependency.
    #[error("implicit dependency required: {}", .violations.join("; "))]
    ImplicitDependencyRequired { violations: Vec<String> },

    /// Two tasks declare overlapping outputs.
    #[error("output clash: {}", .violations.join("; "))]
    OutputClash { violations: Vec<String> },

    /// A `FileSet` lists the same directory twice.
    #[error("duplicate directory: '{0}'")]
    DuplicateDirectory(String),

    /// A `FileSet` directory path is absolute.
    #[error("absolute directory not allowed: '{0}'")]
    AbsoluteDirectory(String),

    /// Two directories of one `FileSet` overlap.
    #[error("overlapping directories: '{outer}' contains '{inner}'")]
    OverlappingDirectory { outer: String, inner: String },

    /// Invocation arguments rejected by the task's validator.
    #[error("invalid arguments for task '{task}': {reason}")]
    InvalidArgs { task: String, reason: String },

    /// A `:arg` token appeared before any task name.
    #[error("argument '{0}' does not follow a task")]
    OrphanArgument(String),

    /// A task uses a phase that was never registered.
    #[error("task '{task}' uses unregistered phase '{phase}'")]
    UnregisteredPhase { task: String, phase: String },

    /// A task action returned an error.
    #[error("task '{task}' failed: {message}")]
    Failed {
        task: String,
        message: String,
        exit_code: u8,
    },

    /// Declared outputs were missing after a successful run.
    #[error("task '{task}' did not produce declared outputs: {}", .paths.join(", "))]
    MissingOutputs { task: String, paths: Vec<String> },

    /// Declared deletions still exist after a successful run.
    #[error("task '{task}' did not delete: {}", .paths.join(", "))]
    NotDeleted { task: String, paths: Vec<String> },

    /// The action was cancelled at a suspension point.
    #[error("task '{task}' was cancelled")]
    Cancelled { task: String },

    /// More than one error must be surfaced at once.
    #[error("multiple errors: {}", format_multiple(.0))]
    Multiple(Vec<RaskError>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

fn format_multiple(errors: &[RaskError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RaskError {
    /// Creates a generic error with the given message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into().into_boxed_str())
    }

    /// Wraps the given errors, collapsing a single error to itself.
    ///
    /// # Panics
    ///
    /// Panics if `errors` is empty; callers aggregate at least one error.
    #[must_use]
    pub fn aggregate(mut errors: Vec<Self>) -> Self {
        assert!(!errors.is_empty(), "aggregate of zero errors");
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Multiple(errors)
        }
    }

    /// Converts an action error, preserving a typed [`RaskError`] if the
    /// cause chain carries one so custom exit codes survive.
    #[must_use]
    pub fn from_action_error(task: &str, error: &anyhow::Error) -> Self {
        if let Some(typed) = error.downcast_ref::<Self>() {
            return typed.duplicate();
        }
        Self::Failed {
            task: task.to_string(),
            message: format!("{error:#}"),
            exit_code: 1,
        }
    }

    /// The process exit code this error maps to.
    ///
    /// Argument and task-selection mistakes exit with
    /// [`USAGE_ERROR_CODE`]; a failed task propagates its own code;
    /// an aggregate reports its first member's code; everything else
    /// is a generic build failure.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::UnknownTask(_)
            | Self::AmbiguousTask { .. }
            | Self::InvalidArgs { .. }
            | Self::OrphanArgument(_) => USAGE_ERROR_CODE,
            Self::Failed { exit_code, .. } => *exit_code,
            Self::Multiple(errors) => errors.first().map_or(1, Self::exit_code),
            _ => 1,
        }
    }

    /// Whether this error was raised before any task ran.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownTask(_)
                | Self::AmbiguousTask { .. }
                | Self::UnknownDependency { .. }
                | Self::CycleDetected { .. }
                | Self::PhaseInversion { .. }
                | Self::ImplicitDependencyRequired { .. }
                | Self::OutputClash { .. }
                | Self::DuplicateDirectory(_)
                | Self::AbsoluteDirectory(_)
                | Self::OverlappingDirectory { .. }
                | Self::InvalidArgs { .. }
                | Self::OrphanArgument(_)
                | Self::UnregisteredPhase { .. }
        )
    }

    /// Duplicates the error for reporting in more than one place,
    /// preserving the variants that carry an exit code and re-rendering
    /// the rest through their message.
    #[must_use]
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Failed {
                task,
                message,
                exit_code,
            } => Self::Failed {
                task: task.clone(),
                message: message.clone(),
                exit_code: *exit_code,
            },
            Self::Cancelled { task } => Self::Cancelled { task: task.clone() },
            Self::MissingOutputs { task, paths } => Self::MissingOutputs {
                task: task.clone(),
                paths: paths.clone(),
            },
            Self::NotDeleted { task, paths } => Self::NotDeleted {
                task: task.clone(),
                paths: paths.clone(),
            },
            other => Self::other(other.to_string()),
        }
    }
}
