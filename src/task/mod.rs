// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The task model.
//!
//! # Architecture
//!
//! ```text
//! Task
//!   name, description, phase
//!   action ------- Plain | Incremental (BoxFuture)
//!   depends_on --- names, expanded by the resolver
//!   run_condition  AlwaysRun / OnChanges / ...
//!   args_validator AcceptAny / DenyArgs / Count / Custom
//!        |
//!        v  resolver
//! TaskWithDeps (Arc, transitive deps, ordering law)
//!        |
//!        v  invocation parser / scheduler
//! TaskInvocation + TaskStatus
//! ```
//!
//! # Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Task`] | Named unit of work with an action and metadata |
//! | [`Action`] | Plain or incremental async callable |
//! | [`RunCondition`] | Decides whether an invocation must run |
//! | [`Phase`] | Ordering group beyond explicit dependencies |
//! | [`TaskWithDeps`] | Task plus its sorted transitive dependencies |
//! | [`TaskInvocation`] | Task plus concrete arguments |
//! | [`TaskStatus`] | Why a scheduled task runs (or does not) |
//! | [`BuildContext`] | Phase registry and ambient cache settings |

mod condition;
mod phase;

pub use condition::{ChangeScope, RunCondition};
pub use phase::{Phase, PhaseRegistry};

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::cache::FileChange;
use crate::error::Result;

/// Future returned by task actions.
pub type ActionFuture = BoxFuture<'static, Result<()>>;

/// A plain action: receives the invocation arguments.
pub type PlainAction = Arc<dyn Fn(Vec<String>) -> ActionFuture + Send + Sync>;

/// An incremental action: additionally receives the changes to its
/// inputs and outputs since the last successful run.
pub type IncrementalAction = Arc<dyn Fn(Vec<String>, ChangeSet) -> ActionFuture + Send + Sync>;

/// Input/output changes handed to incremental actions.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub input_changes: Vec<FileChange>,
    pub output_changes: Vec<FileChange>,
}

/// The callable wrapped by a task.
#[derive(Clone)]
pub enum Action {
    /// Receives the invocation arguments only.
    Plain(PlainAction),

    /// Receives arguments plus the input/output change set.
    Incremental(IncrementalAction),
}

impl Action {
    /// Wraps a plain callable.
    pub fn plain<F>(f: F) -> Self
    where
        F: Fn(Vec<String>) -> ActionFuture + Send + Sync + 'static,
    {
        Self::Plain(Arc::new(f))
    }

    /// Wraps an incremental callable.
    pub fn incremental<F>(f: F) -> Self
    where
        F: Fn(Vec<String>, ChangeSet) -> ActionFuture + Send + Sync + 'static,
    {
        Self::Incremental(Arc::new(f))
    }

    /// Whether the action wants a change set.
    #[must_use]
    pub const fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental(_))
    }

    /// Invokes the action.
    pub(crate) fn invoke(&self, args: Vec<String>, changes: ChangeSet) -> ActionFuture {
        match self {
            Self::Plain(f) => f(args),
            Self::Incremental(f) => f(args, changes),
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Action::Plain(..)"),
            Self::Incremental(_) => f.write_str("Action::Incremental(..)"),
        }
    }
}

/// Validates the arguments of an invocation before scheduling.
#[derive(Clone, Default)]
pub enum ArgsValidator {
    /// Accepts any arguments.
    #[default]
    AcceptAny,

    /// Accepts no arguments at all.
    DenyArgs,

    /// Accepts between `min` and `max` arguments, inclusive.
    Count { min: usize, max: usize },

    /// User-supplied predicate with a help message shown on rejection.
    Custom {
        help: String,
        predicate: Arc<dyn Fn(&[String]) -> bool + Send + Sync>,
    },
}

impl ArgsValidator {
    /// Validates the arguments, returning the rejection reason on failure.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the arguments are rejected.
    pub fn validate(&self, args: &[String]) -> std::result::Result<(), String> {
        match self {
            Self::AcceptAny => Ok(()),
            Self::DenyArgs => {
                if args.is_empty() {
                    Ok(())
                } else {
                    Err("task accepts no arguments".to_string())
                }
            }
            Self::Count { min, max } => {
                if (*min..=*max).contains(&args.len()) {
                    Ok(())
                } else {
                    Err(format!(
                        "expected between {min} and {max} arguments, got {}",
                        args.len()
                    ))
                }
            }
            Self::Custom { help, predicate } => {
                if predicate(args) {
                    Ok(())
                } else {
                    Err(help.clone())
                }
            }
        }
    }
}

impl std::fmt::Debug for ArgsValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AcceptAny => f.write_str("AcceptAny"),
            Self::DenyArgs => f.write_str("DenyArgs"),
            Self::Count { min, max } => write!(f, "Count({min}..={max})"),
            Self::Custom { help, .. } => write!(f, "Custom({help:?})"),
        }
    }
}

/// A named unit of work.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    description: String,
    action: Action,
    parallelizable: bool,
    depends_on: BTreeSet<String>,
    run_condition: RunCondition,
    args_validator: ArgsValidator,
    phase: Phase,
}

impl Task {
    /// Creates a task with defaults: no dependencies, always runs,
    /// accepts any arguments, `build` phase, main-worker only.
    ///
    /// The name must be explicit; use [`task_from_fn!`] to derive it
    /// from a free function's identifier.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            action,
            parallelizable: false,
            depends_on: BTreeSet::new(),
            run_condition: RunCondition::AlwaysRun,
            args_validator: ArgsValidator::AcceptAny,
            phase: Phase::build(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks whether the action may run on a background worker.
    ///
    /// Only free functions should opt in; closures capturing local
    /// state belong on the main worker.
    #[must_use]
    pub const fn with_parallelizable(mut self, parallelizable: bool) -> Self {
        self.parallelizable = parallelizable;
        self
    }

    /// Adds direct dependencies by task name.
    #[must_use]
    pub fn with_depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the run condition.
    #[must_use]
    pub fn with_run_condition(mut self, condition: RunCondition) -> Self {
        self.run_condition = condition;
        self
    }

    /// Sets the argument validator.
    #[must_use]
    pub fn with_args_validator(mut self, validator: ArgsValidator) -> Self {
        self.args_validator = validator;
        self
    }

    /// Sets the phase.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the action.
    #[must_use]
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Whether the action may run on a background worker.
    #[must_use]
    pub const fn is_parallelizable(&self) -> bool {
        self.parallelizable
    }

    /// Returns the direct dependency names.
    #[must_use]
    pub const fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    /// Returns the run condition.
    #[must_use]
    pub const fn run_condition(&self) -> &RunCondition {
        &self.run_condition
    }

    /// Returns the argument validator.
    #[must_use]
    pub const fn args_validator(&self) -> &ArgsValidator {
        &self.args_validator
    }

    /// Returns the phase.
    #[must_use]
    pub const fn phase(&self) -> &Phase {
        &self.phase
    }
}

/// Creates a [`Task`] from a free function, using the function's
/// identifier as the task name and marking it parallelizable (a free
/// function captures nothing, so it is safe on a background worker).
///
/// ```ignore
/// fn hello(args: Vec<String>) -> rask::ActionFuture {
///     Box::pin(async move {
///         println!("Hello {}!", args.first().map_or("World", String::as_str));
///         Ok(())
///     })
/// }
///
/// let task = task_from_fn!(hello);
/// assert_eq!(task.name(), "hello");
/// ```
#[macro_export]
macro_rules! task_from_fn {
    ($f:ident) => {
        $crate::task::Task::new(
            stringify!($f),
            $crate::task::Action::plain($f),
        )
        .with_parallelizable(true)
    };
}

/// Why a scheduled task runs, or does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Inputs, outputs and arguments unchanged; the action is skipped.
    UpToDate,
    /// The task's condition is `AlwaysRun`.
    AlwaysRuns,
    /// An already-scheduled dependency must run.
    DependencyIsOutOfDate,
    /// The run condition reported changes.
    OutOfDate,
    /// `--force-tasks` or `--disable-cache` bypassed the condition.
    Forced,
    /// A deletion task touching this task's files is not up-to-date.
    AffectedByDeletionTask,
}

impl TaskStatus {
    /// Whether the action must be dispatched.
    #[must_use]
    pub const fn must_run(self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    /// Human-readable status for informational displays.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::AlwaysRuns => "always runs",
            Self::DependencyIsOutOfDate => "dependency out-of-date",
            Self::OutOfDate => "out-of-date",
            Self::Forced => "forced",
            Self::AffectedByDeletionTask => "affected by deletion task",
        }
    }
}

/// A task together with its fully expanded transitive dependencies.
///
/// Produced by the resolver; shared read-only between resolver,
/// scheduler and executor. The dependency list is sorted by the
/// ordering law (see [`TaskWithDeps::compare`]).
#[derive(Debug, Clone)]
pub struct TaskWithDeps {
    task: Arc<Task>,
    dependencies: Vec<String>,
    dependency_set: HashSet<String>,
}

impl TaskWithDeps {
    /// Creates the wrapper; `dependencies` must already be sorted.
    #[must_use]
    pub(crate) fn new(task: Arc<Task>, dependencies: Vec<String>) -> Self {
        let dependency_set = dependencies.iter().cloned().collect();
        Self {
            task,
            dependencies,
            dependency_set,
        }
    }

    /// Returns the wrapped task.
    #[must_use]
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns the phase.
    #[must_use]
    pub fn phase(&self) -> &Phase {
        self.task.phase()
    }

    /// Returns the transitive dependency names in scheduling order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Whether this task transitively depends on `name`.
    #[must_use]
    pub fn depends_transitively_on(&self, name: &str) -> bool {
        self.dependency_set.contains(name)
    }

    /// The ordering law.
    ///
    /// 1. Different phases order by phase index.
    /// 2. A task comes after anything it transitively depends on.
    /// 3. Otherwise the two are unordered (equal).
    #[must_use]
    pub fn compare(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        let by_phase = self.phase().index().cmp(&other.phase().index());
        if by_phase != Ordering::Equal {
            return by_phase;
        }
        if self.depends_transitively_on(other.name()) {
            return Ordering::Greater;
        }
        if other.depends_transitively_on(self.name()) {
            return Ordering::Less;
        }
        Ordering::Equal
    }
}

/// A task plus the concrete arguments of one requested run.
#[derive(Debug, Clone)]
pub struct TaskInvocation {
    task: Arc<TaskWithDeps>,
    args: Vec<String>,
    invocation_name: String,
}

impl TaskInvocation {
    /// Creates an invocation carrying the resolved task name.
    #[must_use]
    pub fn new(task: Arc<TaskWithDeps>, args: Vec<String>) -> Self {
        let invocation_name = task.name().to_string();
        Self {
            task,
            args,
            invocation_name,
        }
    }

    /// Creates an invocation remembering the (possibly abbreviated)
    /// name the user typed.
    #[must_use]
    pub fn with_invocation_name(
        task: Arc<TaskWithDeps>,
        args: Vec<String>,
        invocation_name: impl Into<String>,
    ) -> Self {
        Self {
            task,
            args,
            invocation_name: invocation_name.into(),
        }
    }

    /// Returns the resolved task.
    #[must_use]
    pub fn task(&self) -> &Arc<TaskWithDeps> {
        &self.task
    }

    /// Returns the resolved task name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Returns the name the user typed to select the task.
    #[must_use]
    pub fn invocation_name(&self) -> &str {
        &self.invocation_name
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Ambient state of one build: registered phases plus cache settings.
///
/// Passed explicitly into the resolver and the runner; there is no
/// process-global registry.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    phases: PhaseRegistry,
    cache_dir: Option<PathBuf>,
    mtime_grace: Option<Duration>,
}

impl BuildContext {
    /// Creates a context with the built-in phases and default cache
    /// settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom phase.
    ///
    /// # Errors
    ///
    /// Fails when the phase index or name is already taken.
    pub fn with_phase(mut self, phase: &Phase) -> crate::error::RaskResult<Self> {
        self.phases.register(phase)?;
        Ok(self)
    }

    /// Overrides the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Overrides the cache freshness grace window.
    #[must_use]
    pub const fn with_mtime_grace(mut self, grace: Duration) -> Self {
        self.mtime_grace = Some(grace);
        self
    }

    /// Returns the phase registry.
    #[must_use]
    pub const fn phases(&self) -> &PhaseRegistry {
        &self.phases
    }

    /// Returns the cache directory override, if any.
    #[must_use]
    pub fn cache_dir(&self) -> Option<&std::path::Path> {
        self.cache_dir.as_deref()
    }

    /// Returns the grace window override, if any.
    #[must_use]
    pub const fn mtime_grace(&self) -> Option<Duration> {
        self.mtime_grace
    }
}
