// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Task execution.
//!
//! ```text
//! for each ParallelGroup (in order):
//!   parallelizable ----> JoinSet + worker semaphore (CPU count)
//!   main-worker only --> sequential lane
//!        |
//!        v   await both lanes
//!   any failure -> cancel token -> in-flight actions stop at
//!                  their next suspension point ("cancelled")
//!        |
//!        v
//!   post-run hooks for every completed invocation
//!   (success or failure, never for cancelled ones)
//!        |
//!   failure? stop scheduling further groups
//!
//! afterwards: cache garbage collection
//! ```
//!
//! Dependencies are never grouped together, so awaiting the whole
//! group before moving on preserves the happens-before guarantee: a
//! dependency's action and post-run hook complete before any dependent
//! starts.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::{BUILD_SCRIPT_TASK_NAME, RunCache};
use crate::error::{RaskError, RaskResult};
use crate::resolver::ResolvedTasks;
use crate::scheduler::ParallelGroup;
use crate::task::{Action, ChangeSet, RunCondition, TaskStatus};

/// Execution options.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Dispatch parallelizable actions to background workers.
    pub parallel: bool,

    /// Skip every cache read and write, including post-run hooks.
    pub disable_cache: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            disable_cache: false,
        }
    }
}

/// Outcome of one scheduled task.
#[derive(Debug)]
pub struct TaskResult {
    pub name: String,
    pub status: TaskStatus,
    pub duration: Duration,
    /// `None` for skipped (up-to-date) and successful tasks.
    pub error: Option<RaskError>,
}

/// Aggregated outcome of a build run.
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    /// Per-task outcomes, in scheduling order.
    pub results: Vec<TaskResult>,

    /// Number of actions actually dispatched.
    pub executed: usize,

    /// Number of tasks skipped as up-to-date.
    pub up_to_date: usize,
}

/// What one group dispatch needs to run and account for a task.
struct Dispatch {
    name: String,
    status: TaskStatus,
    action: Action,
    condition: RunCondition,
    args: Vec<String>,
    changes: ChangeSet,
    parallel: bool,
}

/// Runs the scheduled groups in order.
///
/// # Errors
///
/// Returns the aggregate of all action and post-run failures. Cancelled
/// siblings are reported in the summary but are not failures.
pub async fn execute(
    groups: Vec<ParallelGroup>,
    resolved: &ResolvedTasks,
    cache: &RunCache,
    options: &ExecuteOptions,
) -> RaskResult<ExecutionSummary> {
    let token = CancellationToken::new();
    let workers = Arc::new(Semaphore::new(worker_count()));
    let mut summary = ExecutionSummary::default();
    let mut failures: Vec<RaskError> = Vec::new();

    for group in groups {
        let group_failures = run_group(
            group,
            cache,
            options,
            &token,
            &workers,
            &mut summary,
        )
        .await;
        if !group_failures.is_empty() {
            failures.extend(group_failures);
            token.cancel();
            tracing::debug!("Task failure, skipping remaining groups");
            break;
        }
    }

    if !options.disable_cache {
        garbage_collect(resolved, cache);
    }

    if failures.is_empty() {
        Ok(summary)
    } else {
        Err(RaskError::aggregate(failures))
    }
}

async fn run_group(
    group: ParallelGroup,
    cache: &RunCache,
    options: &ExecuteOptions,
    token: &CancellationToken,
    workers: &Arc<Semaphore>,
    summary: &mut ExecutionSummary,
) -> Vec<RaskError> {
    let mut failures = Vec::new();
    let mut dispatches: Vec<Dispatch> = Vec::new();

    for entry in group.into_tasks() {
        let status = entry.status();
        let invocation = entry.invocation();
        let task = invocation.task().task();
        if !status.must_run() {
            tracing::info!(task = %task.name(), "Task is up-to-date");
            summary.up_to_date += 1;
            summary.results.push(TaskResult {
                name: task.name().to_string(),
                status,
                duration: Duration::ZERO,
                error: None,
            });
            continue;
        }

        let changes = match change_set(task.name(), task.action(), task.run_condition(), cache, options) {
            Ok(changes) => changes,
            Err(e) => {
                failures.push(e);
                continue;
            }
        };
        dispatches.push(Dispatch {
            name: task.name().to_string(),
            status,
            action: task.action().clone(),
            condition: task.run_condition().clone(),
            args: invocation.args().to_vec(),
            changes,
            parallel: options.parallel && task.is_parallelizable(),
        });
    }

    let outcomes = dispatch_all(&dispatches, token, workers).await;

    for (index, duration, outcome) in outcomes {
        let dispatch = &dispatches[index];
        summary.executed += 1;
        let mut error = outcome.err();
        let cancelled = matches!(&error, Some(RaskError::Cancelled { .. }));

        match &error {
            None => tracing::info!(
                task = %dispatch.name,
                duration = ?duration,
                "Task completed"
            ),
            Some(_) if cancelled => {
                tracing::debug!(task = %dispatch.name, "Task cancelled");
            }
            Some(e) => {
                tracing::error!(task = %dispatch.name, error = %e, "Task failed");
                failures.push(e.duplicate());
            }
        }

        // Post-run accounting for completed invocations only; a
        // cancelled action never ran to completion.
        if !cancelled && !options.disable_cache {
            let success = error.is_none();
            if let Err(e) = dispatch.condition.post_run(
                &dispatch.name,
                &dispatch.args,
                success,
                cache,
            ) {
                let post_error = RaskError::from_action_error(&dispatch.name, &e);
                tracing::error!(
                    task = %dispatch.name,
                    error = %post_error,
                    "Post-run hook failed"
                );
                failures.push(post_error.duplicate());
                if error.is_none() {
                    error = Some(post_error);
                }
            }
        }

        summary.results.push(TaskResult {
            name: dispatch.name.clone(),
            status: dispatch.status,
            duration,
            error,
        });
    }

    failures
}

fn change_set(
    name: &str,
    action: &Action,
    condition: &RunCondition,
    cache: &RunCache,
    options: &ExecuteOptions,
) -> RaskResult<ChangeSet> {
    if !action.is_incremental() || options.disable_cache {
        return Ok(ChangeSet::default());
    }
    let Some(scope) = condition.change_scope(name) else {
        return Ok(ChangeSet::default());
    };
    let input_changes = cache
        .collect_changes(scope.inputs, Some(&scope.key))
        .map_err(|e| RaskError::other(format!("failed to diff inputs of '{name}': {e:#}")))?;
    let output_changes = cache
        .collect_changes(scope.outputs, Some(&scope.key))
        .map_err(|e| RaskError::other(format!("failed to diff outputs of '{name}': {e:#}")))?;
    Ok(ChangeSet {
        input_changes,
        output_changes,
    })
}

/// Dispatches every runnable of the group and awaits them all.
///
/// Returns `(index, duration, outcome)` triples, sorted by index.
async fn dispatch_all(
    dispatches: &[Dispatch],
    token: &CancellationToken,
    workers: &Arc<Semaphore>,
) -> Vec<(usize, Duration, Result<(), RaskError>)> {
    let mut join_set: JoinSet<(usize, Duration, Result<(), RaskError>)> = JoinSet::new();
    let mut inline: Vec<usize> = Vec::new();

    for (index, dispatch) in dispatches.iter().enumerate() {
        if dispatch.parallel {
            let token = token.clone();
            let workers = Arc::clone(workers);
            let name = dispatch.name.clone();
            let action = dispatch.action.clone();
            let args = dispatch.args.clone();
            let changes = dispatch.changes.clone();
            tracing::debug!(task = %name, "Dispatching to background worker");
            join_set.spawn(async move {
                let started = Instant::now();
                let outcome = run_action(
                    &token,
                    Some(&workers),
                    &name,
                    &action,
                    args,
                    changes,
                )
                .await;
                (index, started.elapsed(), outcome)
            });
        } else {
            inline.push(index);
        }
    }

    let inline_lane = async {
        let mut out = Vec::new();
        for index in inline {
            let dispatch = &dispatches[index];
            let started = Instant::now();
            let outcome = if token.is_cancelled() {
                Err(RaskError::Cancelled {
                    task: dispatch.name.clone(),
                })
            } else {
                tracing::debug!(task = %dispatch.name, "Running on main worker");
                run_action(
                    token,
                    None,
                    &dispatch.name,
                    &dispatch.action,
                    dispatch.args.clone(),
                    dispatch.changes.clone(),
                )
                .await
            };
            if outcome
                .as_ref()
                .is_err_and(|e| !matches!(e, RaskError::Cancelled { .. }))
            {
                token.cancel();
            }
            out.push((index, started.elapsed(), outcome));
        }
        out
    };

    let worker_lane = async {
        let mut out = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, duration, outcome)) => {
                    if outcome
                        .as_ref()
                        .is_err_and(|e| !matches!(e, RaskError::Cancelled { .. }))
                    {
                        token.cancel();
                    }
                    out.push((index, duration, outcome));
                }
                Err(join_error) => {
                    // Panics are caught inside the worker future; this
                    // only fires for runtime shutdown.
                    tracing::error!(error = %join_error, "Worker join failed");
                }
            }
        }
        out
    };

    let (mut inline_out, worker_out) = tokio::join!(inline_lane, worker_lane);
    inline_out.extend(worker_out);
    inline_out.sort_by_key(|(index, _, _)| *index);
    inline_out
}

/// Runs one action, cooperatively cancellable at every suspension
/// point, with panics converted to task failures.
async fn run_action(
    token: &CancellationToken,
    workers: Option<&Semaphore>,
    name: &str,
    action: &Action,
    args: Vec<String>,
    changes: ChangeSet,
) -> Result<(), RaskError> {
    let work = async {
        let _permit = match workers {
            Some(semaphore) => Some(
                semaphore
                    .acquire()
                    .await
                    .map_err(|_| RaskError::other("worker pool closed"))?,
            ),
            None => None,
        };
        match std::panic::AssertUnwindSafe(action.invoke(args, changes))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map_err(|e| RaskError::from_action_error(name, &e)),
            Err(panic) => Err(RaskError::Failed {
                task: name.to_string(),
                message: format!("action panicked: {}", panic_message(panic.as_ref())),
                exit_code: 1,
            }),
        }
    };

    match token.run_until_cancelled(work).await {
        Some(outcome) => outcome,
        None => Err(RaskError::Cancelled {
            task: name.to_string(),
        }),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Evicts cache entries of tasks and keys that no longer exist.
fn garbage_collect(resolved: &ResolvedTasks, cache: &RunCache) {
    let mut live_names = resolved.name_set();
    live_names.insert(BUILD_SCRIPT_TASK_NAME.to_string());

    let mut live_keys = BTreeSet::new();
    for task in resolved.iter() {
        live_keys.extend(task.task().run_condition().cache_keys(task.name()));
    }

    if let Err(e) = cache.remove_not_matching(&live_names, &live_keys) {
        tracing::warn!(error = %e, "Cache garbage collection failed");
    }
}

fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}
