// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Run conditions.
//!
//! ```text
//! should_run(invocation)? ----> scheduler (TaskStatus)
//! post_run(success)       ----> cache bookkeeping, verifications
//!
//! AlwaysRun    never cached
//! OnChanges    inputs/outputs/args changed since last success
//! AtMostEvery  last success older than the period
//! ToDelete     any listed entity still exists
//! And / Or     combinators (>= 2 members)
//! ```
//!
//! Every condition owns its post-run bookkeeping: `OnChanges` rewrites
//! its cache key on success (clean key, inputs, outputs, invocation
//! record, in that order) and drops state on failure so the task runs
//! again next time.

use std::time::{Duration, SystemTime};

use crate::cache::RunCache;
use crate::error::{RaskError, RaskResult, Result};
use crate::fileset::FileSet;

/// Decides whether an invocation of a task must execute.
#[derive(Debug, Clone, Default)]
pub enum RunCondition {
    /// The task runs on every invocation and is never cached.
    #[default]
    AlwaysRun,

    /// The task runs when its inputs, outputs or invocation arguments
    /// changed since the last successful run.
    OnChanges {
        inputs: FileSet,
        outputs: FileSet,
        /// Cache key scoping the entries; defaults to the task name.
        key: Option<String>,
        /// Fail the task when a declared output is missing afterwards.
        verify_outputs_exist: bool,
    },

    /// The task runs when it never ran, or its last successful run is
    /// older than the period.
    AtMostEvery { period: Duration },

    /// The task runs while any of the listed entities still exists.
    ToDelete {
        deletions: FileSet,
        /// Fail the task when an entity still exists afterwards.
        verify_deletions: bool,
    },

    /// Runs only when every member condition says run.
    And(Vec<RunCondition>),

    /// Runs when any member condition says run.
    Or(Vec<RunCondition>),
}

impl RunCondition {
    /// Creates an `OnChanges` condition without output verification.
    #[must_use]
    pub const fn on_changes(inputs: FileSet, outputs: FileSet) -> Self {
        Self::OnChanges {
            inputs,
            outputs,
            key: None,
            verify_outputs_exist: false,
        }
    }

    /// Creates a `ToDelete` condition without deletion verification.
    #[must_use]
    pub const fn to_delete(deletions: FileSet) -> Self {
        Self::ToDelete {
            deletions,
            verify_deletions: false,
        }
    }

    /// Combines conditions so the task runs only when all of them say run.
    ///
    /// # Errors
    ///
    /// Fails with fewer than two members.
    pub fn and(members: Vec<Self>) -> RaskResult<Self> {
        if members.len() < 2 {
            return Err(RaskError::other("And condition requires at least 2 members"));
        }
        Ok(Self::And(members))
    }

    /// Combines conditions so the task runs when any of them says run.
    ///
    /// # Errors
    ///
    /// Fails with fewer than two members.
    pub fn or(members: Vec<Self>) -> RaskResult<Self> {
        if members.len() < 2 {
            return Err(RaskError::other("Or condition requires at least 2 members"));
        }
        Ok(Self::Or(members))
    }

    /// The union of every input collection, for dependency analysis.
    #[must_use]
    pub fn inputs(&self) -> FileSet {
        match self {
            Self::OnChanges { inputs, .. } => inputs.clone(),
            Self::And(members) | Self::Or(members) => members
                .iter()
                .fold(FileSet::empty(), |acc, m| acc.union(&m.inputs())),
            _ => FileSet::empty(),
        }
    }

    /// The union of every output collection, for dependency analysis.
    #[must_use]
    pub fn outputs(&self) -> FileSet {
        match self {
            Self::OnChanges { outputs, .. } => outputs.clone(),
            Self::And(members) | Self::Or(members) => members
                .iter()
                .fold(FileSet::empty(), |acc, m| acc.union(&m.outputs())),
            _ => FileSet::empty(),
        }
    }

    /// The union of every deletion collection.
    #[must_use]
    pub fn deletions(&self) -> FileSet {
        match self {
            Self::ToDelete { deletions, .. } => deletions.clone(),
            Self::And(members) | Self::Or(members) => members
                .iter()
                .fold(FileSet::empty(), |acc, m| acc.union(&m.deletions())),
            _ => FileSet::empty(),
        }
    }

    /// Whether this condition (or any member) deletes entities.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        match self {
            Self::ToDelete { .. } => true,
            Self::And(members) | Self::Or(members) => {
                members.iter().any(Self::is_deletion)
            }
            _ => false,
        }
    }

    /// Whether the task bypasses the cache entirely.
    #[must_use]
    pub const fn is_always_run(&self) -> bool {
        matches!(self, Self::AlwaysRun)
    }

    /// The cache keys this condition writes under, for garbage collection.
    #[must_use]
    pub fn cache_keys(&self, task_name: &str) -> Vec<String> {
        match self {
            Self::OnChanges { key, .. } => {
                vec![key.clone().unwrap_or_else(|| task_name.to_string())]
            }
            Self::And(members) | Self::Or(members) => members
                .iter()
                .flat_map(|m| m.cache_keys(task_name))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The change-tracking scope for incremental actions: the first
    /// `OnChanges` member, if any.
    #[must_use]
    pub fn change_scope(&self, task_name: &str) -> Option<ChangeScope<'_>> {
        match self {
            Self::OnChanges {
                inputs,
                outputs,
                key,
                ..
            } => Some(ChangeScope {
                inputs,
                outputs,
                key: key.clone().unwrap_or_else(|| task_name.to_string()),
            }),
            Self::And(members) | Self::Or(members) => members
                .iter()
                .find_map(|m| m.change_scope(task_name)),
            _ => None,
        }
    }

    /// Whether the invocation must run.
    ///
    /// # Errors
    ///
    /// Returns an error on cache I/O failure.
    pub fn should_run(
        &self,
        task_name: &str,
        args: &[String],
        cache: &RunCache,
    ) -> Result<bool> {
        match self {
            Self::AlwaysRun => Ok(true),
            Self::OnChanges {
                inputs,
                outputs,
                key,
                ..
            } => {
                let key = effective_key(key, task_name);
                Ok(cache.has_task_invocation_changed(task_name, args)?
                    || cache.has_changed(inputs, Some(&key))?
                    || cache.has_changed(outputs, Some(&key))?)
            }
            Self::AtMostEvery { period } => {
                let Some(last) = cache.latest_invocation_time(task_name) else {
                    return Ok(true);
                };
                let elapsed = SystemTime::now()
                    .duration_since(last)
                    .unwrap_or(Duration::ZERO);
                Ok(elapsed > *period)
            }
            Self::ToDelete { deletions, .. } => {
                for entity in deletions.resolve() {
                    if entity?.path().exists() {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::And(members) => {
                for member in members {
                    if !member.should_run(task_name, args, cache)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(members) => {
                for member in members {
                    if member.should_run(task_name, args, cache)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Post-run bookkeeping, invoked for every completed invocation.
    ///
    /// # Errors
    ///
    /// Returns an error on failed verification (`missing-outputs`,
    /// `not-deleted`) or cache I/O failure. Verification errors convert
    /// a task success into a failure.
    pub fn post_run(
        &self,
        task_name: &str,
        args: &[String],
        success: bool,
        cache: &RunCache,
    ) -> Result<()> {
        match self {
            Self::AlwaysRun => Ok(()),
            Self::OnChanges {
                inputs,
                outputs,
                key,
                verify_outputs_exist,
            } => {
                let key = effective_key(key, task_name);
                if success {
                    let missing = if *verify_outputs_exist {
                        missing_entities(outputs)?
                    } else {
                        Vec::new()
                    };
                    // Order is load-bearing: stale entries under the key
                    // must be gone before the fresh hashes land, and the
                    // invocation record comes last so a crash in between
                    // leaves the task out-of-date, never falsely fresh.
                    // The cache is rewritten even when verification is
                    // about to fail; the missing-outputs error only
                    // converts the result afterwards.
                    cache.clean(Some(&key))?;
                    cache.put(inputs, Some(&key))?;
                    cache.put(outputs, Some(&key))?;
                    cache.cache_task_invocation(task_name, args)?;
                    if missing.is_empty() {
                        Ok(())
                    } else {
                        Err(RaskError::MissingOutputs {
                            task: task_name.to_string(),
                            paths: missing,
                        }
                        .into())
                    }
                } else {
                    cache.remove_task_invocation(task_name)?;
                    if outputs.is_empty() {
                        cache.remove(inputs, Some(&key))
                    } else {
                        cache.remove(outputs, Some(&key))
                    }
                }
            }
            Self::AtMostEvery { .. } => {
                if success {
                    cache.cache_task_invocation(task_name, args)
                } else {
                    cache.remove_task_invocation(task_name)
                }
            }
            Self::ToDelete {
                deletions,
                verify_deletions,
            } => {
                if success && *verify_deletions {
                    let mut remaining = Vec::new();
                    for entity in deletions.resolve() {
                        let entity = entity?;
                        if entity.path().exists() {
                            remaining.push(entity.path().display().to_string());
                        }
                    }
                    if !remaining.is_empty() {
                        return Err(RaskError::NotDeleted {
                            task: task_name.to_string(),
                            paths: remaining,
                        }
                        .into());
                    }
                }
                Ok(())
            }
            Self::And(members) | Self::Or(members) => {
                let mut errors = Vec::new();
                for member in members {
                    if let Err(e) = member.post_run(task_name, args, success, cache) {
                        errors.push(RaskError::from_action_error(task_name, &e));
                    }
                }
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(RaskError::aggregate(errors).into())
                }
            }
        }
    }
}

/// Change-tracking scope handed to incremental actions.
#[derive(Debug)]
pub struct ChangeScope<'a> {
    pub inputs: &'a FileSet,
    pub outputs: &'a FileSet,
    pub key: String,
}

fn effective_key(key: &Option<String>, task_name: &str) -> String {
    key.clone().unwrap_or_else(|| task_name.to_string())
}

fn missing_entities(outputs: &FileSet) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for entity in outputs.resolve() {
        let entity = entity?;
        if !entity.exists() {
            missing.push(entity.path().display().to_string());
        }
    }
    Ok(missing)
}
