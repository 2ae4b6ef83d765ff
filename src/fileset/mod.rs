// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Declarative file collections.
//!
//! ```text
//! FileSet
//!   files:  a.txt  gen/out.bin        (explicit, canonical)
//!   dirs:   src/ {recurse, hidden,
//!                 exclusions, extensions}
//!      |
//!      v  resolve()
//!   File(a.txt), File(gen/out.bin),
//!   Dir(src, [src/lib.rs, src/sub]),
//!   Dir(src/sub, [...])              depth-first
//! ```
//!
//! A `FileSet` describes task inputs and outputs. Resolution walks the
//! file system lazily; `union`, `intersection` and the `includes_*`
//! predicates are pure path computations, which is what lets the
//! resolver detect implicit inter-task dependencies without touching
//! disk.

mod resolve;

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use bon::Builder;

use crate::error::{RaskError, RaskResult, Result};

/// Filter options for a directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct DirFilters {
    /// Whether every descendant is in scope, not just immediate children.
    #[builder(setters(name = with_recurse), default = false)]
    recurse: bool,

    /// Whether entities whose basename starts with `.` are included.
    #[builder(setters(name = with_include_hidden), default = false)]
    include_hidden: bool,

    /// Names excluded on every path component below the root.
    #[builder(setters(name = with_exclusions), default)]
    exclusions: BTreeSet<String>,

    /// File-name suffixes to include; empty means all files.
    /// Entries are dot-normalized (`rs` and `.rs` are the same filter).
    #[builder(setters(name = with_extensions), default)]
    extensions: BTreeSet<String>,
}

impl Default for DirFilters {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DirFilters {
    /// Returns whether the filter recurses into subdirectories.
    #[must_use]
    pub const fn recurse(&self) -> bool {
        self.recurse
    }

    /// Returns whether hidden entities are included.
    #[must_use]
    pub const fn include_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Returns the excluded names.
    #[must_use]
    pub const fn exclusions(&self) -> &BTreeSet<String> {
        &self.exclusions
    }

    /// Returns the dot-normalized extension filters.
    #[must_use]
    pub const fn extensions(&self) -> &BTreeSet<String> {
        &self.extensions
    }

    fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .into_iter()
            .map(|e| {
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        self
    }

    /// Whether a child with the given basename passes the filters.
    ///
    /// Extension filters only apply to files; exclusions and the hidden
    /// rule apply to every path component.
    fn allows_basename(&self, name: &str, is_dir: bool) -> bool {
        if !self.include_hidden && name.starts_with('.') {
            return false;
        }
        if self.exclusions.contains(name) {
            return false;
        }
        if !is_dir && !self.extensions.is_empty() {
            // Suffix match, so multi-dot extensions like `.tar.gz` work.
            return self.extensions.iter().any(|ext| name.ends_with(ext.as_str()));
        }
        true
    }
}

/// A directory with its filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    path: PathBuf,
    filters: DirFilters,
}

impl DirectoryEntry {
    /// Creates a directory entry with a canonicalized relative path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>, filters: DirFilters) -> Self {
        Self {
            path: canonical(path.as_ref()),
            filters: filters.normalized(),
        }
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the filters.
    #[must_use]
    pub const fn filters(&self) -> &DirFilters {
        &self.filters
    }

    /// Whether `path` names a file in scope of this entry (pure).
    fn contains_file(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.path) else {
            return false;
        };
        let components: Vec<&str> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect();
        let Some((file_name, intermediate)) = components.split_last() else {
            return false;
        };
        if !intermediate.is_empty() && !self.filters.recurse() {
            return false;
        }
        intermediate
            .iter()
            .all(|dir| self.filters.allows_basename(dir, true))
            && self.filters.allows_basename(file_name, false)
    }

    /// Whether `path` names this directory or a subdirectory in scope (pure).
    fn contains_dir(&self, path: &Path) -> bool {
        if path == self.path {
            return true;
        }
        let Ok(rel) = path.strip_prefix(&self.path) else {
            return false;
        };
        if !self.filters.recurse() {
            return false;
        }
        rel.components().all(|c| match c {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|n| self.filters.allows_basename(n, true)),
            _ => false,
        })
    }
}

/// A resolved file-system entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedEntity {
    /// An explicit file (which may or may not exist on disk).
    File(PathBuf),

    /// A directory with its filtered immediate children, sorted
    /// lexicographically. A missing directory has no children.
    Dir {
        path: PathBuf,
        children: Vec<PathBuf>,
    },
}

impl ResolvedEntity {
    /// Returns the entity path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Dir { path, .. } => path,
        }
    }

    /// Whether the entity currently exists on disk with the right kind.
    #[must_use]
    pub fn exists(&self) -> bool {
        match self {
            Self::File(path) => path.is_file(),
            Self::Dir { path, .. } => path.is_dir(),
        }
    }
}

/// An ordered collection of explicit files and filtered directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<PathBuf>,
    dirs: Vec<DirectoryEntry>,
}

impl FileSet {
    /// Creates an empty collection.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a collection with a single file.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            files: vec![canonical(path.as_ref())],
            dirs: Vec::new(),
        }
    }

    /// Creates a collection of files.
    #[must_use]
    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut files = Vec::new();
        for path in paths {
            let path = canonical(path.as_ref());
            if !files.contains(&path) {
                files.push(path);
            }
        }
        Self {
            files,
            dirs: Vec::new(),
        }
    }

    /// Creates a collection with a single filtered directory.
    ///
    /// # Errors
    ///
    /// Fails if the path is absolute.
    pub fn dir(path: impl AsRef<Path>, filters: DirFilters) -> RaskResult<Self> {
        Self::dirs([path], filters)
    }

    /// Creates a collection of directories sharing the same filters.
    ///
    /// # Errors
    ///
    /// Fails if any path is absolute, listed twice, or overlaps another.
    pub fn dirs<I, P>(paths: I, filters: DirFilters) -> RaskResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let entries: Vec<DirectoryEntry> = paths
            .into_iter()
            .map(|p| DirectoryEntry::new(p, filters.clone()))
            .collect();
        Self::entities(Vec::<PathBuf>::new(), entries)
    }

    /// Creates a collection from explicit files and directory entries.
    ///
    /// # Errors
    ///
    /// Fails if any directory path is absolute, listed twice, or
    /// overlaps another directory of the collection.
    pub fn entities<F, P>(files: F, dirs: Vec<DirectoryEntry>) -> RaskResult<Self>
    where
        F: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        validate_dirs(&dirs)?;
        let mut set = Self::files(files);
        set.dirs = dirs;
        Ok(set)
    }

    /// Returns the explicit file paths.
    #[must_use]
    pub fn file_paths(&self) -> &[PathBuf] {
        &self.files
    }

    /// Returns the directory entries.
    #[must_use]
    pub fn dir_entries(&self) -> &[DirectoryEntry] {
        &self.dirs
    }

    /// Whether the collection mentions nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// Combines two collections, deduplicating exact duplicates.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut files = self.files.clone();
        for file in &other.files {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
        let mut dirs = self.dirs.clone();
        for dir in &other.dirs {
            if !dirs.contains(dir) {
                dirs.push(dir.clone());
            }
        }
        Self { files, dirs }
    }

    /// Computes the overlap between two collections without any I/O.
    ///
    /// A path is in the result when it is an explicit file of both
    /// sides, an explicit file of one side in scope of a directory of
    /// the other, or a directory of one side lying within a directory
    /// of the other whose extension filters are compatible. An empty
    /// extension filter is treated as "all files" when composing, so
    /// it never renders an otherwise-overlapping pair disjoint.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> BTreeSet<PathBuf> {
        let mut result = BTreeSet::new();

        for file in &self.files {
            if other.files.contains(file)
                || other.dirs.iter().any(|d| d.contains_file(file))
            {
                result.insert(file.clone());
            }
        }
        for file in &other.files {
            if self.dirs.iter().any(|d| d.contains_file(file)) {
                result.insert(file.clone());
            }
        }

        for ours in &self.dirs {
            for theirs in &other.dirs {
                if extensions_compatible(ours.filters(), theirs.filters()) {
                    if theirs.contains_dir(ours.path()) {
                        result.insert(ours.path.clone());
                    } else if ours.contains_dir(theirs.path()) {
                        result.insert(theirs.path.clone());
                    }
                }
            }
        }

        result
    }

    /// Whether `path` would be a file of this collection (pure, no I/O).
    #[must_use]
    pub fn includes_file(&self, path: impl AsRef<Path>) -> bool {
        let path = canonical(path.as_ref());
        self.files.contains(&path) || self.dirs.iter().any(|d| d.contains_file(&path))
    }

    /// Whether `path` would be a directory of this collection (pure, no I/O).
    #[must_use]
    pub fn includes_dir(&self, path: impl AsRef<Path>) -> bool {
        let path = canonical(path.as_ref());
        self.dirs.iter().any(|d| d.contains_dir(&path))
    }

    /// Resolves the collection against the file system.
    ///
    /// Yields every explicit file first (whether or not it exists),
    /// then each directory together with its filtered immediate
    /// children, descending depth-first into recursive directories.
    /// The returned iterator is lazy and not restartable.
    pub fn resolve(&self) -> impl Iterator<Item = Result<ResolvedEntity>> + '_ {
        resolve::ResolveIter::new(self)
    }
}

fn validate_dirs(dirs: &[DirectoryEntry]) -> RaskResult<()> {
    for (i, dir) in dirs.iter().enumerate() {
        if dir.path().is_absolute() {
            return Err(RaskError::AbsoluteDirectory(
                dir.path().display().to_string(),
            ));
        }
        for earlier in &dirs[..i] {
            if earlier.path() == dir.path() {
                return Err(RaskError::DuplicateDirectory(
                    dir.path().display().to_string(),
                ));
            }
            if dir.path().starts_with(earlier.path()) {
                return Err(RaskError::OverlappingDirectory {
                    outer: earlier.path().display().to_string(),
                    inner: dir.path().display().to_string(),
                });
            }
            if earlier.path().starts_with(dir.path()) {
                return Err(RaskError::OverlappingDirectory {
                    outer: dir.path().display().to_string(),
                    inner: earlier.path().display().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Extension filters compose by set intersection; empty means "all".
fn extensions_compatible(a: &DirFilters, b: &DirFilters) -> bool {
    if a.extensions().is_empty() || b.extensions().is_empty() {
        return true;
    }
    a.extensions().intersection(b.extensions()).next().is_some()
}

/// Lexically normalizes a path: strips `.` components and resolves
/// `..` against preceding normal components. The cache uses the same
/// normalization so an entity is addressed identically no matter how
/// its path was spelled.
pub(crate) fn canonical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

#[cfg(test)]
mod tests;
