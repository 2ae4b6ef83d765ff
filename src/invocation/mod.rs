// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Invocation parsing.
//!
//! ```text
//! ["clean", "encode", ":fast", ":x2"]
//!      |
//!      v   grammar (TASK (':' ARG)*)*
//! clean []        encode [fast, x2]
//!      |
//!      v   fuzzy match + ArgsValidator
//! Vec<TaskInvocation>
//! ```
//!
//! Task names may be abbreviated by camel-case word prefixes: `cA`
//! selects `cleanAll` when no other task matches. An exact name always
//! wins; several fuzzy candidates are an error rather than a guess.

use std::sync::Arc;

use crate::error::{RaskError, RaskResult};
use crate::resolver::ResolvedTasks;
use crate::task::TaskInvocation;

/// Parses the positional CLI tokens into validated invocations.
///
/// When no token selects a task, the build's default tasks are used.
///
/// # Errors
///
/// Fails with `orphan-argument`, `unknown-task`, `ambiguous-task` or
/// `invalid-args`.
pub fn parse_invocations(
    tokens: &[String],
    tasks: &ResolvedTasks,
    default_tasks: &[String],
) -> RaskResult<Vec<TaskInvocation>> {
    let mut pending: Vec<(String, String, Vec<String>)> = Vec::new();

    for token in tokens {
        if let Some(arg) = token.strip_prefix(':') {
            match pending.last_mut() {
                Some((_, _, args)) => args.push(arg.to_string()),
                None => return Err(RaskError::OrphanArgument(token.clone())),
            }
        } else {
            let resolved = match_task_name(token, tasks)?;
            if pending.iter().any(|(name, _, _)| name == &resolved) {
                return Err(RaskError::InvalidArgs {
                    task: resolved,
                    reason: "task selected more than once".to_string(),
                });
            }
            pending.push((resolved, token.clone(), Vec::new()));
        }
    }

    if pending.is_empty() {
        for name in default_tasks {
            pending.push((name.clone(), name.clone(), Vec::new()));
        }
        tracing::debug!(count = pending.len(), "No tasks requested, using defaults");
    }

    let mut invocations = Vec::with_capacity(pending.len());
    for (name, typed, args) in pending {
        let task = tasks
            .get(&name)
            .ok_or_else(|| RaskError::UnknownTask(name.clone()))?;
        if let Err(reason) = task.task().args_validator().validate(&args) {
            return Err(RaskError::InvalidArgs { task: name, reason });
        }
        invocations.push(TaskInvocation::with_invocation_name(
            Arc::clone(task),
            args,
            typed,
        ));
    }
    Ok(invocations)
}

/// Resolves a (possibly abbreviated) task name.
///
/// An exact match always wins. Otherwise the text is matched by
/// camel-case word prefixes against every known name; exactly one
/// candidate must survive.
fn match_task_name(text: &str, tasks: &ResolvedTasks) -> RaskResult<String> {
    if tasks.get(text).is_some() {
        return Ok(text.to_string());
    }

    let mut candidates: Vec<String> = tasks
        .names()
        .into_iter()
        .filter(|name| matches_camel_case(text, name))
        .map(ToString::to_string)
        .collect();

    match candidates.len() {
        0 => Err(RaskError::UnknownTask(text.to_string())),
        1 => {
            let name = candidates.remove(0);
            tracing::debug!(typed = %text, task = %name, "Fuzzy-matched task name");
            Ok(name)
        }
        _ => Err(RaskError::AmbiguousTask {
            name: text.to_string(),
            candidates,
        }),
    }
}

/// Whether `search` abbreviates `candidate` by camel-case word prefixes.
///
/// Both are split before every uppercase letter; each search segment
/// must prefix the corresponding candidate segment. The candidate may
/// have further segments.
fn matches_camel_case(search: &str, candidate: &str) -> bool {
    let search_words = split_camel_case(search);
    let candidate_words = split_camel_case(candidate);
    if search_words.is_empty() || search_words.len() > candidate_words.len() {
        return false;
    }
    search_words
        .iter()
        .zip(&candidate_words)
        .all(|(s, c)| c.starts_with(s.as_str()))
}

/// Splits `cleanAll` into `["clean", "All"]`.
fn split_camel_case(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
