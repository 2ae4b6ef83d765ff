// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Lazy resolution of a `FileSet` against the file system.

use std::path::PathBuf;

use anyhow::Context;

use crate::error::Result;

use super::{DirFilters, DirectoryEntry, FileSet, ResolvedEntity};

/// Iterator over the resolved entities of a `FileSet`.
///
/// Files come first, then each directory entry is walked depth-first.
/// The walk is lazy: directories are only read when the iterator
/// reaches them.
pub(super) struct ResolveIter<'a> {
    files: std::slice::Iter<'a, PathBuf>,
    dirs: std::slice::Iter<'a, DirectoryEntry>,
    // LIFO of directories still to visit within the current entry.
    stack: Vec<(PathBuf, &'a DirFilters)>,
}

impl<'a> ResolveIter<'a> {
    pub(super) fn new(set: &'a FileSet) -> Self {
        Self {
            files: set.files.iter(),
            dirs: set.dirs.iter(),
            stack: Vec::new(),
        }
    }

    fn visit_dir(&mut self, path: PathBuf, filters: &'a DirFilters) -> Result<ResolvedEntity> {
        let read = match std::fs::read_dir(&path) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResolvedEntity::Dir {
                    path,
                    children: Vec::new(),
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let mut children = Vec::new();
        let mut subdirs = Vec::new();
        for entry in read {
            let entry =
                entry.with_context(|| format!("failed to read entry of {}", path.display()))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !filters.allows_basename(&name, is_dir) {
                continue;
            }
            let child = path.join(&name);
            if is_dir && filters.recurse() {
                subdirs.push(child.clone());
            }
            children.push(child);
        }

        children.sort_unstable();
        // Reverse so popping visits subdirectories in lexicographic order.
        subdirs.sort_unstable();
        for subdir in subdirs.into_iter().rev() {
            self.stack.push((subdir, filters));
        }

        Ok(ResolvedEntity::Dir { path, children })
    }
}

impl Iterator for ResolveIter<'_> {
    type Item = Result<ResolvedEntity>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(file) = self.files.next() {
            return Some(Ok(ResolvedEntity::File(file.clone())));
        }
        loop {
            if let Some((path, filters)) = self.stack.pop() {
                return Some(self.visit_dir(path, filters));
            }
            let entry = self.dirs.next()?;
            self.stack.push((entry.path.clone(), &entry.filters));
        }
    }
}
