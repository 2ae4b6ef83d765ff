// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Content-addressed build cache.
//!
//! ```text
//! .rask_tool/cache/
//!   version            format stamp, wiped on mismatch
//!   hashes/
//!     <key>/           per-task scope (key = task name)
//!       <path-hash>    SHA-1 of entity contents / dir listing
//!     <path-hash>      key-less entries (library users)
//!   tasks/
//!     <task-name>      JSON args of last successful invocation,
//!                      mtime = last-success time
//! ```
//!
//! A hash file's own mtime doubles as a freshness marker: when the
//! tracked file's mtime does not exceed it by more than the grace
//! window, the content is not rehashed. The grace absorbs file systems
//! with coarse timestamps.
//!
//! All operations are synchronous file I/O. Concurrent workers never
//! touch the same `(key, path)` pair; the resolver's output-clash check
//! guarantees disjointness.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;

use crate::error::Result;
use crate::fileset::{FileSet, ResolvedEntity};
use crate::hasher::{self, HashDigest};

/// Bumped whenever the hash algorithm, layout or directory-listing
/// marker changes; a mismatch wipes the cache.
pub const CACHE_FORMAT_VERSION: &str = "1";

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".rask_tool/cache";

/// Default freshness grace window.
pub const DEFAULT_MTIME_GRACE: Duration = Duration::from_secs(1);

/// Reserved task name under which the external build-script compiler
/// keeps its cache entries; garbage collection must not evict it.
pub const BUILD_SCRIPT_TASK_NAME: &str = "_compileBuildScript";

/// How a tracked entity changed since the last successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// A change to a tracked input or output entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Persistent store for entity hashes and task invocation records.
#[derive(Debug, Clone)]
pub struct RunCache {
    root: PathBuf,
    hashes_dir: PathBuf,
    tasks_dir: PathBuf,
    grace: Duration,
}

impl RunCache {
    /// Opens (or prepares) a cache rooted at the given directory.
    ///
    /// Nothing is created on disk until the first write. An existing
    /// directory with a missing or outdated format stamp is wiped.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale cache cannot be removed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let cache = Self {
            hashes_dir: root.join("hashes"),
            tasks_dir: root.join("tasks"),
            root,
            grace: DEFAULT_MTIME_GRACE,
        };
        cache.check_version()?;
        Ok(cache)
    }

    /// Overrides the freshness grace window.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Returns the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_version(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        let stamp = std::fs::read_to_string(self.root.join("version")).ok();
        if stamp.as_deref().map(str::trim) != Some(CACHE_FORMAT_VERSION) {
            tracing::info!(
                root = %self.root.display(),
                "Cache format changed, discarding cache"
            );
            std::fs::remove_dir_all(&self.root)
                .with_context(|| format!("failed to wipe {}", self.root.display()))?;
        }
        Ok(())
    }

    /// Creates the on-disk layout and stamps the format version.
    fn ensure_layout(&self) -> Result<()> {
        if !self.root.join("version").exists() {
            std::fs::create_dir_all(&self.root)
                .with_context(|| format!("failed to create {}", self.root.display()))?;
            std::fs::write(self.root.join("version"), CACHE_FORMAT_VERSION)
                .context("failed to stamp cache version")?;
        }
        std::fs::create_dir_all(&self.hashes_dir)
            .with_context(|| format!("failed to create {}", self.hashes_dir.display()))?;
        std::fs::create_dir_all(&self.tasks_dir)
            .with_context(|| format!("failed to create {}", self.tasks_dir.display()))?;
        Ok(())
    }

    fn key_dir(&self, key: Option<&str>) -> PathBuf {
        key.map_or_else(|| self.hashes_dir.clone(), |k| self.hashes_dir.join(k))
    }

    fn entry_path(&self, entity: &Path, key: Option<&str>) -> PathBuf {
        let canonical = crate::fileset::canonical(entity);
        let path_hash = hasher::hash_text(&canonical.to_string_lossy()).to_hex();
        self.key_dir(key).join(path_hash)
    }

    /// Stores or refreshes the hash of every resolved entity.
    ///
    /// Entities that no longer exist have their entries removed, so a
    /// later `has_changed` only reports them once they reappear.
    ///
    /// # Errors
    ///
    /// Returns an error on resolution or I/O failure.
    pub fn put(&self, fileset: &FileSet, key: Option<&str>) -> Result<()> {
        self.ensure_layout()?;
        let mut visited = HashSet::new();
        for entity in fileset.resolve() {
            let entity = entity?;
            if !visited.insert(entity.path().to_path_buf()) {
                continue;
            }
            let entry = self.entry_path(entity.path(), key);
            match &entity {
                ResolvedEntity::File(path) => {
                    if path.is_file() {
                        write_entry(&entry, &hasher::hash_file(path)?)?;
                    } else {
                        remove_entry(&entry)?;
                    }
                }
                ResolvedEntity::Dir { path, children } => {
                    if path.is_dir() {
                        write_entry(&entry, &listing_digest(children))?;
                    } else {
                        remove_entry(&entry)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Removes the entries of every resolved entity.
    ///
    /// # Errors
    ///
    /// Returns an error on resolution or I/O failure.
    pub fn remove(&self, fileset: &FileSet, key: Option<&str>) -> Result<()> {
        for entity in fileset.resolve() {
            let entity = entity?;
            remove_entry(&self.entry_path(entity.path(), key))?;
        }
        Ok(())
    }

    /// Whether the cache holds an entry for the given entity path.
    #[must_use]
    pub fn contains(&self, entity: &Path, key: Option<&str>) -> bool {
        self.entry_path(entity, key).is_file()
    }

    /// Removes every entry under the given key, or the whole cache.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn clean(&self, key: Option<&str>) -> Result<()> {
        match key {
            Some(k) => remove_dir_if_present(&self.hashes_dir.join(k)),
            None => {
                remove_dir_if_present(&self.root)?;
                self.ensure_layout()
            }
        }
    }

    /// Whether any entity of the collection changed since it was last
    /// stored. An empty collection never changed; each entity is
    /// checked at most once.
    ///
    /// # Errors
    ///
    /// Returns an error on resolution or I/O failure.
    pub fn has_changed(&self, fileset: &FileSet, key: Option<&str>) -> Result<bool> {
        let mut visited = HashSet::new();
        for entity in fileset.resolve() {
            let entity = entity?;
            if !visited.insert(entity.path().to_path_buf()) {
                continue;
            }
            if self.entity_change(&entity, key)?.is_some() {
                tracing::debug!(path = %entity.path().display(), "Entity changed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lists every changed entity of the collection, for incremental
    /// task actions.
    ///
    /// # Errors
    ///
    /// Returns an error on resolution or I/O failure.
    pub fn collect_changes(
        &self,
        fileset: &FileSet,
        key: Option<&str>,
    ) -> Result<Vec<FileChange>> {
        let mut visited = HashSet::new();
        let mut changes = Vec::new();
        for entity in fileset.resolve() {
            let entity = entity?;
            if !visited.insert(entity.path().to_path_buf()) {
                continue;
            }
            if let Some(kind) = self.entity_change(&entity, key)? {
                changes.push(FileChange {
                    path: entity.path().to_path_buf(),
                    kind,
                });
            }
        }
        Ok(changes)
    }

    /// Computes how a single entity changed relative to its entry.
    fn entity_change(
        &self,
        entity: &ResolvedEntity,
        key: Option<&str>,
    ) -> Result<Option<ChangeKind>> {
        let entry = self.entry_path(entity.path(), key);
        let prior = std::fs::read(&entry).ok();
        match entity {
            ResolvedEntity::File(path) => match (prior, path.is_file()) {
                (None, false) => Ok(None),
                (None, true) => Ok(Some(ChangeKind::Added)),
                (Some(_), false) => Ok(Some(ChangeKind::Deleted)),
                (Some(prior), true) => {
                    if self.is_fresh(path, &entry)? {
                        return Ok(None);
                    }
                    let digest = hasher::hash_file(path)?;
                    if digest.as_bytes()[..] == prior[..] {
                        Ok(None)
                    } else {
                        Ok(Some(ChangeKind::Modified))
                    }
                }
            },
            ResolvedEntity::Dir { path, children } => match (prior, path.is_dir()) {
                (None, false) => Ok(None),
                (None, true) => Ok(Some(ChangeKind::Added)),
                (Some(_), false) => Ok(Some(ChangeKind::Deleted)),
                (Some(prior), true) => {
                    if listing_digest(children).as_bytes()[..] == prior[..] {
                        Ok(None)
                    } else {
                        Ok(Some(ChangeKind::Modified))
                    }
                }
            },
        }
    }

    /// A file is fresh when its mtime does not exceed the entry's mtime
    /// by more than the grace window, skipping the content rehash.
    fn is_fresh(&self, path: &Path, entry: &Path) -> Result<bool> {
        let file_mtime = modified_time(path)?;
        let entry_mtime = modified_time(entry)?;
        Ok(file_mtime <= entry_mtime + self.grace)
    }

    /// Records the arguments of a successful invocation.
    ///
    /// The record's mtime doubles as the last-success timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn cache_task_invocation(&self, task_name: &str, args: &[String]) -> Result<()> {
        self.ensure_layout()?;
        let json = serde_json::to_vec(args).context("failed to serialize invocation args")?;
        let record = self.tasks_dir.join(task_name);
        let mut temp = tempfile::NamedTempFile::new_in(&self.tasks_dir)
            .context("failed to create temp invocation record")?;
        temp.write_all(&json)
            .context("failed to write invocation record")?;
        temp.persist(&record)
            .with_context(|| format!("failed to persist {}", record.display()))?;
        Ok(())
    }

    /// Whether the invocation differs from the last successful one.
    ///
    /// True when no record exists or the persisted arguments differ.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure other than a missing record.
    pub fn has_task_invocation_changed(&self, task_name: &str, args: &[String]) -> Result<bool> {
        let record = self.tasks_dir.join(task_name);
        let Ok(bytes) = std::fs::read(&record) else {
            return Ok(true);
        };
        let Ok(recorded) = serde_json::from_slice::<Vec<String>>(&bytes) else {
            // Unreadable record: treat as changed, it will be rewritten.
            return Ok(true);
        };
        Ok(recorded != args)
    }

    /// The last successful run time of the task, if any.
    #[must_use]
    pub fn latest_invocation_time(&self, task_name: &str) -> Option<SystemTime> {
        modified_time(&self.tasks_dir.join(task_name)).ok()
    }

    /// Drops the invocation record of the task.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure other than a missing record.
    pub fn remove_task_invocation(&self, task_name: &str) -> Result<()> {
        remove_entry(&self.tasks_dir.join(task_name))
    }

    /// Garbage-collects entries for tasks and keys that no longer exist.
    ///
    /// Key-less hash entries are left alone: the engine cannot tell
    /// which library user owns them.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn remove_not_matching(
        &self,
        task_names: &BTreeSet<String>,
        keys: &BTreeSet<String>,
    ) -> Result<()> {
        if let Ok(entries) = std::fs::read_dir(&self.tasks_dir) {
            for entry in entries {
                let entry = entry.context("failed to read cache tasks dir")?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !task_names.contains(&name) {
                    tracing::debug!(task = %name, "Evicting record of removed task");
                    remove_entry(&entry.path())?;
                }
            }
        }
        if let Ok(entries) = std::fs::read_dir(&self.hashes_dir) {
            for entry in entries {
                let entry = entry.context("failed to read cache hashes dir")?;
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if !keys.contains(&name) {
                    tracing::debug!(key = %name, "Evicting hashes of removed key");
                    remove_dir_if_present(&entry.path())?;
                }
            }
        }
        Ok(())
    }
}

fn listing_digest(children: &[PathBuf]) -> HashDigest {
    hasher::hash_dir_listing(children.iter().map(|c| c.to_string_lossy()))
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    metadata
        .modified()
        .with_context(|| format!("no mtime for {}", path.display()))
}

fn write_entry(entry: &Path, digest: &HashDigest) -> Result<()> {
    let parent = entry
        .parent()
        .context("cache entry path has no parent")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .context("failed to create temp cache entry")?;
    temp.write_all(digest.as_bytes())
        .context("failed to write cache entry")?;
    temp.persist(entry)
        .with_context(|| format!("failed to persist {}", entry.display()))?;
    Ok(())
}

fn remove_entry(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

fn remove_dir_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
