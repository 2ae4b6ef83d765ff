// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! The build runner.
//!
//! ```text
//! run(args, tasks, defaults)
//!   |
//!   v
//! cli::try_parse_from --> rask.toml defaults --> init_logging
//!   |
//!   v
//! resolve --> show-tasks/-graph?  print, done
//!   |
//!   v
//! open cache (--reset-cache wipes) --> parse invocations
//!   |
//!   v
//! schedule --> execute --> "Build succeeded|failed in <duration>"
//!   |
//!   v
//! ExitCode   0 ok / 1 failure / 4 usage / 22 internal / custom
//! ```
//!
//! The embedding build program calls [`run`] (or [`run_with`] when it
//! registered custom phases) from its `main` and returns the exit code.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use futures_util::FutureExt;

use crate::cache::{DEFAULT_CACHE_DIR, RunCache};
use crate::cli::{self, Options};
use crate::config::{self, RaskConfig};
use crate::error::{INTERNAL_ERROR_CODE, RaskError, RaskResult, USAGE_ERROR_CODE};
use crate::executor::{ExecuteOptions, ExecutionSummary, execute};
use crate::invocation::parse_invocations;
use crate::logging::{GREEN, LogConfig, LogLevel, RED, color_allowed, init_logging, stylize};
use crate::resolver::{ResolvedTasks, resolve_tasks};
use crate::scheduler::{ScheduleOptions, schedule};
use crate::task::{BuildContext, Task};

/// What a build run produced.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Tasks were scheduled and executed.
    Executed(ExecutionSummary),

    /// `--show-tasks` / `--show-task-graph`: information printed,
    /// nothing executed.
    DisplayOnly,
}

/// Runs a build with the default context.
///
/// `args` is the raw argument vector (without the program name), as the
/// embedding program received it.
pub async fn run<I, T>(args: I, tasks: Vec<Task>, default_tasks: &[&str]) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    run_with(args, tasks, default_tasks, BuildContext::new()).await
}

/// Runs a build with a caller-prepared context (custom phases, cache
/// directory or grace window).
pub async fn run_with<I, T>(
    args: I,
    tasks: Vec<Task>,
    default_tasks: &[&str],
    context: BuildContext,
) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let options = match cli::try_parse_from(args) {
        Ok(options) => options,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => USAGE_ERROR_CODE,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let config = match config::load_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let color = color_allowed(options.color_requested() && config.color.unwrap_or(true));
    let log_config = LogConfig::builder()
        .with_level(
            options
                .log_level
                .or(config.log_level)
                .unwrap_or(LogLevel::Info),
        )
        .with_color(color)
        .maybe_with_log_file(config.log_file.clone())
        .build();
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            return ExitCode::from(1);
        }
    };

    let context = apply_config(context, &config);
    let started = Instant::now();

    // A panic anywhere below is an internal error, not a build failure.
    let outcome = std::panic::AssertUnwindSafe(run_build(
        &context, &options, tasks, default_tasks, &config,
    ))
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(BuildOutcome::DisplayOnly)) => ExitCode::SUCCESS,
        Ok(Ok(BuildOutcome::Executed(summary))) => {
            tracing::info!(
                executed = summary.executed,
                up_to_date = summary.up_to_date,
                "Build finished"
            );
            println!(
                "{}",
                stylize(
                    &format!("Build succeeded in {}", format_duration(started.elapsed())),
                    GREEN,
                    color,
                )
            );
            ExitCode::SUCCESS
        }
        Ok(Err(error)) => {
            report_failure(&error, color, started.elapsed());
            ExitCode::from(error.exit_code())
        }
        Err(panic) => {
            eprintln!(
                "{}",
                stylize("Unexpected internal error", RED, color)
            );
            drop(panic);
            ExitCode::from(INTERNAL_ERROR_CODE)
        }
    }
}

/// Resolves, schedules and executes one build.
///
/// This is the whole pipeline behind [`run`], without CLI/logging
/// setup or reporting; embedding programs and tests drive it directly.
///
/// # Errors
///
/// Returns the first configuration error, or the aggregate run-time
/// failure.
pub async fn run_build(
    context: &BuildContext,
    options: &Options,
    tasks: Vec<Task>,
    default_tasks: &[&str],
    config: &RaskConfig,
) -> RaskResult<BuildOutcome> {
    let resolved = resolve_tasks(context, tasks)?;

    if options.show_tasks {
        print!("{}", render_tasks(&resolved, default_tasks));
        return Ok(BuildOutcome::DisplayOnly);
    }
    if options.show_task_graph {
        print!("{}", render_task_graph(&resolved));
        return Ok(BuildOutcome::DisplayOnly);
    }

    let cache_dir = context
        .cache_dir()
        .map(std::path::Path::to_path_buf)
        .or_else(|| config.cache.dir.clone())
        .unwrap_or_else(|| DEFAULT_CACHE_DIR.into());
    let grace = context
        .mtime_grace()
        .or(config.cache.mtime_grace_ms.map(Duration::from_millis));
    let mut cache = RunCache::open(cache_dir)
        .map_err(|e| RaskError::other(format!("failed to open cache: {e:#}")))?;
    if let Some(grace) = grace {
        cache = cache.with_grace(grace);
    }
    if options.reset_cache {
        tracing::info!("Resetting cache");
        cache
            .clean(None)
            .map_err(|e| RaskError::other(format!("failed to reset cache: {e:#}")))?;
    }

    let default_names: Vec<String> = default_tasks.iter().map(ToString::to_string).collect();
    let invocations = parse_invocations(&options.tasks, &resolved, &default_names)?;

    let schedule_options = ScheduleOptions {
        force: options.force(),
        disable_cache: options.disable_cache,
    };
    let groups = schedule(invocations, &resolved, &cache, &schedule_options)
        .map_err(|e| RaskError::other(format!("failed to schedule tasks: {e:#}")))?;

    let execute_options = ExecuteOptions {
        parallel: options.parallel_enabled(),
        disable_cache: options.disable_cache,
    };
    let summary = execute(groups, &resolved, &cache, &execute_options).await?;
    Ok(BuildOutcome::Executed(summary))
}

fn apply_config(mut context: BuildContext, config: &RaskConfig) -> BuildContext {
    if context.cache_dir().is_none() {
        if let Some(dir) = &config.cache.dir {
            context = context.with_cache_dir(dir.clone());
        }
    }
    if context.mtime_grace().is_none() {
        if let Some(ms) = config.cache.mtime_grace_ms {
            context = context.with_mtime_grace(Duration::from_millis(ms));
        }
    }
    context
}

fn report_failure(error: &RaskError, color: bool, elapsed: Duration) {
    eprintln!("{}", stylize(&format!("ERROR: {error}"), RED, color));
    if let RaskError::Multiple(errors) = error {
        for (i, e) in errors.iter().enumerate() {
            tracing::debug!(index = i + 1, error = %e, "Build error");
        }
    }
    eprintln!(
        "{}",
        stylize(
            &format!("Build failed in {}", format_duration(elapsed)),
            RED,
            color,
        )
    );
}

/// Renders the task listing for `--show-tasks`.
fn render_tasks(resolved: &ResolvedTasks, default_tasks: &[&str]) -> String {
    use std::collections::BTreeMap;
    use std::fmt::Write as _;

    let mut by_phase: BTreeMap<crate::task::Phase, Vec<&std::sync::Arc<crate::task::TaskWithDeps>>> =
        BTreeMap::new();
    for task in resolved.iter() {
        by_phase.entry(task.phase().clone()).or_default().push(task);
    }

    let mut out = String::new();
    for (phase, tasks) in by_phase {
        let _ = writeln!(out, "Tasks in phase '{phase}':");
        for task in tasks {
            let default_marker = if default_tasks.contains(&task.name()) {
                " [default]"
            } else {
                ""
            };
            let _ = writeln!(out, "  * {}{default_marker}", task.name());
            if !task.task().description().is_empty() {
                let _ = writeln!(out, "      {}", task.task().description());
            }
        }
    }
    out
}

/// Renders the dependency tree for `--show-task-graph`.
fn render_task_graph(resolved: &ResolvedTasks) -> String {
    use std::fmt::Write as _;

    fn visit(
        resolved: &ResolvedTasks,
        name: &str,
        depth: usize,
        out: &mut String,
    ) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}- {name}");
        if let Some(task) = resolved.get(name) {
            let mut direct: Vec<&String> = task.task().depends_on().iter().collect();
            direct.sort_unstable();
            for dep in direct {
                visit(resolved, dep, depth + 1, out);
            }
        }
    }

    let mut out = String::new();
    for task in resolved.iter() {
        visit(resolved, task.name(), 0, &mut out);
    }
    out
}

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests;
