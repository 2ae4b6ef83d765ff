// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scheduling: invocations to ordered parallel groups.
//!
//! ```text
//! invocations (sorted by the ordering law)
//!      |
//!      v  emit dependencies first (synthetic, empty args)
//! TaskWithStatus
//!   forced | alwaysRuns | affectedByDeletionTask |
//!   dependencyIsOutOfDate | outOfDate | upToDate
//!      |
//!      v  pack into the last group when same phase
//!         and independent of every member
//! [ParallelGroup, ParallelGroup, ...]
//! ```
//!
//! Groups preserve every dependency edge: a task is never grouped with
//! anything it depends on, and groups execute strictly in order. Within
//! a group tasks are mutually independent and share a phase, so the
//! executor may overlap them freely.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::RunCache;
use crate::error::Result;
use crate::resolver::ResolvedTasks;
use crate::task::{Phase, TaskInvocation, TaskStatus};

/// A scheduled invocation with the reason it runs (or not).
#[derive(Debug, Clone)]
pub struct TaskWithStatus {
    invocation: TaskInvocation,
    status: TaskStatus,
}

impl TaskWithStatus {
    /// Returns the invocation.
    #[must_use]
    pub const fn invocation(&self) -> &TaskInvocation {
        &self.invocation
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Whether the action must be dispatched.
    #[must_use]
    pub const fn must_run(&self) -> bool {
        self.status.must_run()
    }
}

/// An ordered set of mutually independent, same-phase invocations.
#[derive(Debug, Clone, Default)]
pub struct ParallelGroup {
    tasks: Vec<TaskWithStatus>,
}

impl ParallelGroup {
    /// Returns the scheduled tasks.
    #[must_use]
    pub fn tasks(&self) -> &[TaskWithStatus] {
        &self.tasks
    }

    /// Returns the group's phase.
    #[must_use]
    pub fn phase(&self) -> Option<&Phase> {
        self.tasks.first().map(|t| t.invocation().task().phase())
    }

    /// Whether a new entrant may join: same phase and no dependency
    /// relation, in either direction, with any member.
    fn accepts(&self, invocation: &TaskInvocation) -> bool {
        let task = invocation.task();
        self.tasks.iter().all(|member| {
            let member_task = member.invocation().task();
            member_task.phase() == task.phase()
                && !task.depends_transitively_on(member_task.name())
                && !member_task.depends_transitively_on(task.name())
        })
    }

    /// Consumes the group, yielding its tasks in order.
    #[must_use]
    pub fn into_tasks(self) -> Vec<TaskWithStatus> {
        self.tasks
    }
}

/// Scheduling inputs beyond the invocations themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleOptions {
    /// Bypass run conditions; every task is `Forced`.
    pub force: bool,

    /// The cache may not be read; implies `force`.
    pub disable_cache: bool,
}

impl ScheduleOptions {
    const fn forced(&self) -> bool {
        self.force || self.disable_cache
    }
}

/// Orders the invocations, pulls in their dependencies and packs
/// everything into parallel groups.
///
/// # Errors
///
/// Returns an error when a run condition fails to evaluate.
pub fn schedule(
    invocations: Vec<TaskInvocation>,
    resolved: &ResolvedTasks,
    cache: &RunCache,
    options: &ScheduleOptions,
) -> Result<Vec<ParallelGroup>> {
    let mut invocations = invocations;
    invocations.sort_by(|a, b| a.task().compare(b.task()));

    let mut emitted: HashMap<String, TaskStatus> = HashMap::new();
    let mut groups: Vec<ParallelGroup> = Vec::new();

    for invocation in invocations {
        // Dependencies first. The transitive list is already sorted by
        // the ordering law, so emitting in order respects edges among
        // the dependencies themselves.
        for dep_name in invocation.task().dependencies() {
            if emitted.contains_key(dep_name) {
                continue;
            }
            let dep = resolved.get(dep_name).ok_or_else(|| {
                anyhow::anyhow!("dependency '{dep_name}' is missing from the task map")
            })?;
            let synthetic = TaskInvocation::new(Arc::clone(dep), Vec::new());
            emit(synthetic, resolved, cache, options, &mut emitted, &mut groups)?;
        }
        if emitted.contains_key(invocation.name()) {
            continue;
        }
        emit(invocation, resolved, cache, options, &mut emitted, &mut groups)?;
    }

    Ok(groups)
}

fn emit(
    invocation: TaskInvocation,
    resolved: &ResolvedTasks,
    cache: &RunCache,
    options: &ScheduleOptions,
    emitted: &mut HashMap<String, TaskStatus>,
    groups: &mut Vec<ParallelGroup>,
) -> Result<()> {
    let status = compute_status(&invocation, resolved, cache, options, emitted)?;
    emitted.insert(invocation.name().to_string(), status);
    tracing::debug!(
        task = %invocation.name(),
        status = status.describe(),
        "Scheduled task"
    );

    let entry = TaskWithStatus { invocation, status };
    let joins_last = groups
        .last()
        .is_some_and(|group| group.accepts(entry.invocation()));
    if joins_last {
        if let Some(group) = groups.last_mut() {
            group.tasks.push(entry);
        }
    } else {
        groups.push(ParallelGroup { tasks: vec![entry] });
    }
    Ok(())
}

/// Status priority: forced, alwaysRuns, affectedByDeletionTask,
/// dependencyIsOutOfDate, outOfDate, upToDate.
fn compute_status(
    invocation: &TaskInvocation,
    resolved: &ResolvedTasks,
    cache: &RunCache,
    options: &ScheduleOptions,
    emitted: &HashMap<String, TaskStatus>,
) -> Result<TaskStatus> {
    let task = invocation.task();

    if options.forced() {
        return Ok(TaskStatus::Forced);
    }
    if task.task().run_condition().is_always_run() {
        return Ok(TaskStatus::AlwaysRuns);
    }
    for deletion_task in resolved.deletion_tasks_affecting(task.name()) {
        if emitted
            .get(deletion_task)
            .is_some_and(|status| *status != TaskStatus::UpToDate)
        {
            return Ok(TaskStatus::AffectedByDeletionTask);
        }
    }
    for dep_name in task.dependencies() {
        if emitted.get(dep_name).is_some_and(|status| status.must_run()) {
            return Ok(TaskStatus::DependencyIsOutOfDate);
        }
    }
    if task
        .task()
        .run_condition()
        .should_run(task.name(), invocation.args(), cache)?
    {
        return Ok(TaskStatus::OutOfDate);
    }
    Ok(TaskStatus::UpToDate)
}

/// Flattens groups into their tasks, for reporting.
#[must_use]
pub fn flatten(groups: Vec<ParallelGroup>) -> Vec<TaskWithStatus> {
    groups.into_iter().flat_map(ParallelGroup::into_tasks).collect()
}
