// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Build phases.
//!
//! Phases impose an ordering on tasks beyond explicit dependencies: a
//! task may only depend on tasks in the same or an earlier phase, and
//! the scheduler never mixes phases within a parallel group.

use std::collections::BTreeMap;

use crate::error::{RaskError, RaskResult};

/// A totally ordered grouping of tasks.
///
/// Ordering follows the index; two phases are equal only when both
/// index and name match. The built-ins leave room for custom phases
/// in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Phase {
    index: i32,
    name: String,
}

impl Phase {
    /// The `setup` phase (index 100), running before everything else.
    #[must_use]
    pub fn setup() -> Self {
        Self::custom(100, "setup")
    }

    /// The default `build` phase (index 500).
    #[must_use]
    pub fn build() -> Self {
        Self::custom(500, "build")
    }

    /// The `tearDown` phase (index 1000), running last.
    #[must_use]
    pub fn tear_down() -> Self {
        Self::custom(1000, "tearDown")
    }

    /// Creates a custom phase. It must be registered in the
    /// [`PhaseRegistry`] of the build before a task may use it.
    pub fn custom(index: i32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }

    /// Returns the ordering index.
    #[must_use]
    pub const fn index(&self) -> i32 {
        self.index
    }

    /// Returns the phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // The index is the ordering; the name only breaks ties so that
        // Ord stays consistent with Eq.
        self.index
            .cmp(&other.index)
            .then_with(|| self.name.cmp(&other.name))
    }
}

/// The phases known to a build.
///
/// The built-in phases are always present; custom phases must be
/// registered with a unique index and name before use.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    by_index: BTreeMap<i32, String>,
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        let mut registry = Self {
            by_index: BTreeMap::new(),
        };
        for built_in in [Phase::setup(), Phase::build(), Phase::tear_down()] {
            registry
                .by_index
                .insert(built_in.index(), built_in.name().to_string());
        }
        registry
    }
}

impl PhaseRegistry {
    /// Creates a registry with only the built-in phases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom phase.
    ///
    /// # Errors
    ///
    /// Fails when the index or name is already taken by a different
    /// phase. Registering an identical phase twice is a no-op.
    pub fn register(&mut self, phase: &Phase) -> RaskResult<()> {
        if let Some(existing) = self.by_index.get(&phase.index) {
            if existing == phase.name() {
                return Ok(());
            }
            return Err(RaskError::other(format!(
                "phase index {} is already taken by '{existing}'",
                phase.index
            )));
        }
        if self.by_index.values().any(|name| name == phase.name()) {
            return Err(RaskError::other(format!(
                "phase name '{}' is already registered with a different index",
                phase.name()
            )));
        }
        self.by_index.insert(phase.index, phase.name.clone());
        Ok(())
    }

    /// Whether the exact phase is registered.
    #[must_use]
    pub fn contains(&self, phase: &Phase) -> bool {
        self.by_index.get(&phase.index) == Some(&phase.name)
    }

    /// Iterates the registered phases in index order.
    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.by_index
            .iter()
            .map(|(index, name)| Phase::custom(*index, name.clone()))
    }
}
