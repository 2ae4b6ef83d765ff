// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dependency resolution and graph verification.
//!
//! ```text
//! Vec<Task>
//!    |  validate names, phases
//!    v
//! DFS expansion -------- cycle-detected / unknown-dependency
//!    |
//!    v
//! TaskWithDeps map (transitive closures, ordering law)
//!    |
//!    +-- phase consistency    dep phase <= task phase
//!    +-- implicit deps        inputs(a) ∩ outputs(b) without an edge
//!    |     ToDelete pairs become the deletions-affects relation
//!    +-- output clash         outputs(a) ∩ outputs(b)
//! ```
//!
//! Everything here is pure path computation; no file system access.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{RaskError, RaskResult};
use crate::fileset::FileSet;
use crate::task::{BuildContext, Task, TaskWithDeps};

/// The verified task graph of one build.
#[derive(Debug, Clone)]
pub struct ResolvedTasks {
    tasks: HashMap<String, Arc<TaskWithDeps>>,
    deletion_affects: HashMap<String, Vec<String>>,
}

impl ResolvedTasks {
    /// Looks up a task by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<TaskWithDeps>> {
        self.tasks.get(name)
    }

    /// Returns all task names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the set of task names, for cache garbage collection.
    #[must_use]
    pub fn name_set(&self) -> BTreeSet<String> {
        self.tasks.keys().cloned().collect()
    }

    /// Iterates the tasks in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskWithDeps>> {
        let mut tasks: Vec<&Arc<TaskWithDeps>> = self.tasks.values().collect();
        tasks.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        tasks.into_iter()
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the build has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The deletion tasks whose deletions touch the given task's files.
    #[must_use]
    pub fn deletion_tasks_affecting(&self, name: &str) -> &[String] {
        self.deletion_affects
            .get(name)
            .map_or(&[], Vec::as_slice)
    }
}

/// Expands and verifies a set of tasks into a resolved graph.
///
/// # Errors
///
/// Fails with `cycle-detected`, `unknown-dependency`, phase
/// registration/consistency errors, `implicit-dependency-required` or
/// `output-clash`.
pub fn resolve_tasks(ctx: &BuildContext, tasks: Vec<Task>) -> RaskResult<ResolvedTasks> {
    let arena = build_arena(tasks)?;
    check_phase_registration(ctx, &arena)?;

    let closures = expand_all(&arena)?;
    check_phase_consistency(&arena)?;

    let io = IoScopes::collect(&arena);
    let deletion_affects = check_io_consistency(&arena, &closures, &io)?;

    let mut resolved = HashMap::with_capacity(arena.len());
    for (name, task) in &arena {
        let mut deps: Vec<String> = closures[name].iter().cloned().collect();
        deps.sort_by(|a, b| compare_names(a, b, &arena, &closures));
        resolved.insert(
            name.clone(),
            Arc::new(TaskWithDeps::new(Arc::clone(task), deps)),
        );
    }

    tracing::debug!(task_count = resolved.len(), "Task graph resolved");
    Ok(ResolvedTasks {
        tasks: resolved,
        deletion_affects,
    })
}

fn build_arena(tasks: Vec<Task>) -> RaskResult<BTreeMap<String, Arc<Task>>> {
    let mut arena = BTreeMap::new();
    for task in tasks {
        let name = task.name().to_string();
        if name.is_empty() {
            return Err(RaskError::other("task name must not be empty"));
        }
        if name.contains(':') || name.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(RaskError::other(format!(
                "task name '{name}' must not contain ':', '/' or whitespace"
            )));
        }
        if arena.insert(name.clone(), Arc::new(task)).is_some() {
            return Err(RaskError::other(format!(
                "more than one task is named '{name}'"
            )));
        }
    }
    Ok(arena)
}

fn check_phase_registration(
    ctx: &BuildContext,
    arena: &BTreeMap<String, Arc<Task>>,
) -> RaskResult<()> {
    for task in arena.values() {
        if !ctx.phases().contains(task.phase()) {
            return Err(RaskError::UnregisteredPhase {
                task: task.name().to_string(),
                phase: task.phase().name().to_string(),
            });
        }
    }
    Ok(())
}

/// Computes the transitive dependency closure of every task by DFS.
fn expand_all(
    arena: &BTreeMap<String, Arc<Task>>,
) -> RaskResult<HashMap<String, BTreeSet<String>>> {
    let mut closures: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut path = Vec::new();
    for name in arena.keys() {
        expand(name, arena, &mut closures, &mut path)?;
    }
    Ok(closures)
}

fn expand(
    name: &str,
    arena: &BTreeMap<String, Arc<Task>>,
    closures: &mut HashMap<String, BTreeSet<String>>,
    path: &mut Vec<String>,
) -> RaskResult<BTreeSet<String>> {
    if let Some(done) = closures.get(name) {
        return Ok(done.clone());
    }
    if let Some(start) = path.iter().position(|p| p == name) {
        let mut cycle: Vec<String> = path[start..].to_vec();
        cycle.push(name.to_string());
        return Err(RaskError::CycleDetected { path: cycle });
    }

    path.push(name.to_string());
    let task = &arena[name];
    let mut closure = BTreeSet::new();
    for dep in task.depends_on() {
        if !arena.contains_key(dep) {
            let mut missing_path = path.clone();
            missing_path.push(dep.clone());
            return Err(RaskError::UnknownDependency { path: missing_path });
        }
        closure.insert(dep.clone());
        closure.extend(expand(dep, arena, closures, path)?);
    }
    path.pop();

    closures.insert(name.to_string(), closure.clone());
    Ok(closure)
}

fn check_phase_consistency(arena: &BTreeMap<String, Arc<Task>>) -> RaskResult<()> {
    let mut violations = Vec::new();
    for task in arena.values() {
        for dep_name in task.depends_on() {
            let dep = &arena[dep_name];
            if dep.phase().index() > task.phase().index() {
                violations.push(format!(
                    "task '{}' in phase '{}' depends on '{}' in later phase '{}'",
                    task.name(),
                    task.phase(),
                    dep.name(),
                    dep.phase()
                ));
            }
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(RaskError::PhaseInversion { violations })
    }
}

/// Pre-computed input/output/deletion scopes per task.
struct IoScopes {
    inputs: HashMap<String, FileSet>,
    outputs: HashMap<String, FileSet>,
    deletions: HashMap<String, FileSet>,
    is_deletion: HashMap<String, bool>,
}

impl IoScopes {
    fn collect(arena: &BTreeMap<String, Arc<Task>>) -> Self {
        let mut inputs = HashMap::new();
        let mut outputs = HashMap::new();
        let mut deletions = HashMap::new();
        let mut is_deletion = HashMap::new();
        for (name, task) in arena {
            let condition = task.run_condition();
            inputs.insert(name.clone(), condition.inputs());
            outputs.insert(name.clone(), condition.outputs());
            deletions.insert(name.clone(), condition.deletions());
            is_deletion.insert(name.clone(), condition.is_deletion());
        }
        Self {
            inputs,
            outputs,
            deletions,
            is_deletion,
        }
    }
}

/// Verifies I/O disjointness across every task pair.
///
/// Unrelated tasks sharing files must either declare a dependency, or
/// one of them is a deletion task, in which case the pair is recorded
/// in the deletions-affects relation the scheduler consumes.
fn check_io_consistency(
    arena: &BTreeMap<String, Arc<Task>>,
    closures: &HashMap<String, BTreeSet<String>>,
    io: &IoScopes,
) -> RaskResult<HashMap<String, Vec<String>>> {
    let names: Vec<&String> = arena.keys().collect();
    let mut implicit = Vec::new();
    let mut clashes = Vec::new();
    let mut affects: HashMap<String, Vec<String>> = HashMap::new();

    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            let related =
                closures[*a].contains(*b) || closures[*b].contains(*a);
            let a_deletes = io.is_deletion[*a];
            let b_deletes = io.is_deletion[*b];

            if a_deletes || b_deletes {
                if a_deletes && b_deletes {
                    continue;
                }
                let (del, other) = if a_deletes { (*a, *b) } else { (*b, *a) };
                if related {
                    continue;
                }
                let scope = io.inputs[other].union(&io.outputs[other]);
                if !io.deletions[del].intersection(&scope).is_empty() {
                    affects.entry(other.clone()).or_default().push(del.clone());
                }
                continue;
            }

            if !related {
                let overlap = io.inputs[*a].intersection(&io.outputs[*b]);
                if !overlap.is_empty() {
                    implicit.push(implicit_violation(a, b, &overlap));
                }
                let overlap = io.inputs[*b].intersection(&io.outputs[*a]);
                if !overlap.is_empty() {
                    implicit.push(implicit_violation(b, a, &overlap));
                }
            }

            let overlap = io.outputs[*a].intersection(&io.outputs[*b]);
            if !overlap.is_empty() {
                clashes.push(format!(
                    "tasks '{a}' and '{b}' both output: {}",
                    join_paths(&overlap)
                ));
            }
        }
    }

    if !implicit.is_empty() {
        return Err(RaskError::ImplicitDependencyRequired {
            violations: implicit,
        });
    }
    if !clashes.is_empty() {
        return Err(RaskError::OutputClash { violations: clashes });
    }

    for deletion_tasks in affects.values_mut() {
        deletion_tasks.sort_unstable();
    }
    Ok(affects)
}

fn implicit_violation(
    dependent: &str,
    dependency: &str,
    overlap: &BTreeSet<std::path::PathBuf>,
) -> String {
    format!(
        "task '{dependent}' must depend on '{dependency}' (overlapping paths: {})",
        join_paths(overlap)
    )
}

fn join_paths(paths: &BTreeSet<std::path::PathBuf>) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The ordering law over task names, used to sort dependency lists.
fn compare_names(
    a: &str,
    b: &str,
    arena: &BTreeMap<String, Arc<Task>>,
    closures: &HashMap<String, BTreeSet<String>>,
) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let by_phase = arena[a]
        .phase()
        .index()
        .cmp(&arena[b].phase().index());
    if by_phase != Ordering::Equal {
        return by_phase;
    }
    if closures[a].contains(b) {
        return Ordering::Greater;
    }
    if closures[b].contains(a) {
        return Ordering::Less;
    }
    Ordering::Equal
}
