// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fs;
use std::path::{Path, PathBuf};

use super::{DirFilters, DirectoryEntry, FileSet, ResolvedEntity};
use crate::error::RaskError;

/// Temp dir under the working directory, so directory paths stay relative.
fn rel_tempdir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(".")
        .expect("tempdir in cwd")
}

/// Strips the cwd prefix tempfile adds, so the path is relative again.
fn relative(path: &Path) -> PathBuf {
    path.strip_prefix(std::env::current_dir().expect("cwd"))
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

fn resolve_all(set: &FileSet) -> Vec<ResolvedEntity> {
    set.resolve()
        .collect::<Result<Vec<_>, _>>()
        .expect("resolution should succeed")
}

#[test]
fn test_file_paths_are_canonicalized() {
    let set = FileSet::files(["./a.txt", "sub/../b.txt", "sub/./c.txt"]);
    assert_eq!(
        set.file_paths(),
        &[
            PathBuf::from("a.txt"),
            PathBuf::from("b.txt"),
            PathBuf::from("sub/c.txt"),
        ]
    );
}

#[test]
fn test_duplicate_files_are_dropped() {
    let set = FileSet::files(["a.txt", "./a.txt", "b.txt"]);
    assert_eq!(set.file_paths().len(), 2);
}

#[test]
fn test_absolute_dir_rejected() {
    let result = FileSet::dir("/etc", DirFilters::default());
    assert!(matches!(result, Err(RaskError::AbsoluteDirectory(_))));
}

#[test]
fn test_duplicate_dir_rejected() {
    let result = FileSet::dirs(["src", "./src"], DirFilters::default());
    assert!(matches!(result, Err(RaskError::DuplicateDirectory(_))));
}

#[test]
fn test_overlapping_dirs_rejected() {
    let result = FileSet::dirs(["src", "src/nested"], DirFilters::default());
    assert!(matches!(result, Err(RaskError::OverlappingDirectory { .. })));

    // Order does not matter.
    let result = FileSet::dirs(["src/nested", "src"], DirFilters::default());
    assert!(matches!(result, Err(RaskError::OverlappingDirectory { .. })));
}

#[test]
fn test_union_deduplicates() {
    let a = FileSet::files(["a.txt", "b.txt"]);
    let b = FileSet::files(["b.txt", "c.txt"]);
    let union = a.union(&b);
    assert_eq!(union.file_paths().len(), 3);

    let d1 = FileSet::dir("gen", DirFilters::default()).unwrap();
    let union = d1.union(&d1);
    assert_eq!(union.dir_entries().len(), 1);
}

#[test]
fn test_includes_file() {
    let set = FileSet::file("gen/out.txt");
    assert!(set.includes_file("gen/out.txt"));
    assert!(set.includes_file("./gen/out.txt"));
    assert!(!set.includes_file("gen/other.txt"));

    let dir = FileSet::dir(
        "src",
        DirFilters::builder()
            .with_recurse(true)
            .with_extensions(["rs".to_string()].into())
            .build(),
    )
    .unwrap();
    assert!(dir.includes_file("src/lib.rs"));
    assert!(dir.includes_file("src/nested/mod.rs"));
    assert!(!dir.includes_file("src/notes.txt"));
    assert!(!dir.includes_file("other/lib.rs"));
    // Hidden components are filtered by default.
    assert!(!dir.includes_file("src/.hidden/mod.rs"));
}

#[test]
fn test_includes_file_non_recursive() {
    let dir = FileSet::dir("src", DirFilters::default()).unwrap();
    assert!(dir.includes_file("src/lib.rs"));
    assert!(!dir.includes_file("src/nested/mod.rs"));
}

#[test]
fn test_includes_dir() {
    let recursive = FileSet::dir("src", DirFilters::builder().with_recurse(true).build())
        .unwrap();
    assert!(recursive.includes_dir("src"));
    assert!(recursive.includes_dir("src/nested/deep"));

    let flat = FileSet::dir("src", DirFilters::default()).unwrap();
    assert!(flat.includes_dir("src"));
    assert!(!flat.includes_dir("src/nested"));
}

#[test]
fn test_excluded_component_prunes_subtree() {
    let dir = FileSet::dir(
        "src",
        DirFilters::builder()
            .with_recurse(true)
            .with_exclusions(["target".to_string()].into())
            .build(),
    )
    .unwrap();
    assert!(dir.includes_file("src/a/b/c.rs"));
    assert!(!dir.includes_file("src/target/c.rs"));
    assert!(!dir.includes_file("src/a/target/b/c.rs"));
    assert!(!dir.includes_dir("src/a/target"));
}

#[test]
fn test_intersection_explicit_files() {
    let a = FileSet::files(["x.txt", "y.txt"]);
    let b = FileSet::files(["y.txt", "z.txt"]);
    let overlap = a.intersection(&b);
    assert_eq!(overlap.len(), 1);
    assert!(overlap.contains(Path::new("y.txt")));
}

#[test]
fn test_intersection_file_in_dir() {
    let outputs = FileSet::dir("gen", DirFilters::builder().with_recurse(true).build())
        .unwrap();
    let inputs = FileSet::file("gen/x.txt");
    let overlap = inputs.intersection(&outputs);
    assert!(overlap.contains(Path::new("gen/x.txt")));
    // Symmetric.
    let overlap = outputs.intersection(&inputs);
    assert!(overlap.contains(Path::new("gen/x.txt")));
}

#[test]
fn test_intersection_respects_dir_filters() {
    let sources = FileSet::dir(
        "gen",
        DirFilters::builder()
            .with_recurse(true)
            .with_extensions([".rs".to_string()].into())
            .build(),
    )
    .unwrap();
    assert!(
        sources
            .intersection(&FileSet::file("gen/notes.txt"))
            .is_empty()
    );
    assert!(
        !sources
            .intersection(&FileSet::file("gen/lib.rs"))
            .is_empty()
    );
}

#[test]
fn test_intersection_dir_in_dir() {
    let outer = FileSet::dir("gen", DirFilters::builder().with_recurse(true).build())
        .unwrap();
    let inner = FileSet::dir("gen/sub", DirFilters::default()).unwrap();
    let overlap = outer.intersection(&inner);
    assert!(overlap.contains(Path::new("gen/sub")));

    // Same directory on both sides.
    let overlap = outer.intersection(&outer.clone());
    assert!(overlap.contains(Path::new("gen")));
}

#[test]
fn test_intersection_extension_filters_compose() {
    let rs = FileSet::dir(
        "src",
        DirFilters::builder()
            .with_recurse(true)
            .with_extensions([".rs".to_string()].into())
            .build(),
    )
    .unwrap();
    let txt = FileSet::dir(
        "src/docs",
        DirFilters::builder()
            .with_extensions([".txt".to_string()].into())
            .build(),
    )
    .unwrap();
    // Disjoint extension filters: no overlap despite nested paths.
    assert!(rs.intersection(&txt).is_empty());

    // An empty filter matches all, so it overlaps any filter.
    let any = FileSet::dir("src/docs", DirFilters::default()).unwrap();
    assert!(!rs.intersection(&any).is_empty());
}

#[test]
fn test_resolve_yields_files_first() {
    let tmp = rel_tempdir("fs-order");
    let root = tmp.path().to_path_buf();
    fs::create_dir(root.join("d")).unwrap();
    fs::write(root.join("d/child.txt"), "x").unwrap();

    let set = FileSet::entities(
        [root.join("explicit.txt")],
        vec![DirectoryEntry::new(relative(&root.join("d")), DirFilters::default())],
    );
    // Directory paths must be relative; tempdir_in(".") keeps them so.
    let set = set.expect("valid fileset");

    let entities = resolve_all(&set);
    assert_eq!(entities.len(), 2);
    assert!(matches!(&entities[0], ResolvedEntity::File(p) if p.ends_with("explicit.txt")));
    assert!(matches!(&entities[1], ResolvedEntity::Dir { .. }));
}

#[test]
fn test_resolve_missing_file_still_yielded() {
    let set = FileSet::file("definitely/not/here.txt");
    let entities = resolve_all(&set);
    assert_eq!(entities.len(), 1);
    assert!(!entities[0].exists());
}

#[test]
fn test_resolve_missing_dir_has_no_children() {
    let set = FileSet::dir("definitely-not-here", DirFilters::default()).unwrap();
    let entities = resolve_all(&set);
    assert_eq!(entities.len(), 1);
    match &entities[0] {
        ResolvedEntity::Dir { children, .. } => assert!(children.is_empty()),
        other => panic!("expected dir entity, got {other:?}"),
    }
}

#[test]
fn test_resolve_recursive_depth_first() {
    let tmp = rel_tempdir("fs-dfs");
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("a/inner")).unwrap();
    fs::create_dir(root.join("b")).unwrap();
    fs::write(root.join("a/f1.txt"), "1").unwrap();
    fs::write(root.join("a/inner/f2.txt"), "2").unwrap();
    fs::write(root.join("b/f3.txt"), "3").unwrap();

    let set = FileSet::dir(relative(&root), DirFilters::builder().with_recurse(true).build())
        .unwrap();
    let dirs: Vec<PathBuf> = resolve_all(&set)
        .into_iter()
        .map(|e| e.path().to_path_buf())
        .collect();

    // Root, then a, then a/inner (before b): depth-first in name order.
    assert_eq!(dirs.len(), 4);
    assert!(dirs[1].ends_with("a"));
    assert!(dirs[2].ends_with("a/inner"));
    assert!(dirs[3].ends_with("b"));
}

#[test]
fn test_resolve_filters_children() {
    let tmp = rel_tempdir("fs-filter");
    let root = tmp.path().to_path_buf();
    fs::write(root.join("keep.rs"), "k").unwrap();
    fs::write(root.join("skip.txt"), "s").unwrap();
    fs::write(root.join(".hidden"), "h").unwrap();
    fs::create_dir(root.join("excluded")).unwrap();
    fs::write(root.join("excluded/inner.rs"), "i").unwrap();

    let set = FileSet::dir(
        relative(&root),
        DirFilters::builder()
            .with_recurse(true)
            .with_exclusions(["excluded".to_string()].into())
            .with_extensions(["rs".to_string()].into())
            .build(),
    )
    .unwrap();

    let entities = resolve_all(&set);
    assert_eq!(entities.len(), 1, "excluded subtree must not be visited");
    match &entities[0] {
        ResolvedEntity::Dir { children, .. } => {
            assert_eq!(children.len(), 1);
            assert!(children[0].ends_with("keep.rs"));
        }
        other => panic!("expected dir entity, got {other:?}"),
    }
}

#[test]
fn test_resolve_includes_subdirs_in_children() {
    let tmp = rel_tempdir("fs-subdir");
    let root = tmp.path().to_path_buf();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("f.txt"), "f").unwrap();

    // Extension filters apply to files only; subdirectories stay listed.
    let set = FileSet::dir(
        relative(&root),
        DirFilters::builder()
            .with_extensions([".md".to_string()].into())
            .build(),
    )
    .unwrap();
    let entities = resolve_all(&set);
    match &entities[0] {
        ResolvedEntity::Dir { children, .. } => {
            assert_eq!(children.len(), 1);
            assert!(children[0].ends_with("sub"));
        }
        other => panic!("expected dir entity, got {other:?}"),
    }
}

#[test]
fn test_extension_normalization() {
    let with_dot = DirectoryEntry::new(
        "src",
        DirFilters::builder()
            .with_extensions([".rs".to_string()].into())
            .build(),
    );
    let without_dot = DirectoryEntry::new(
        "src",
        DirFilters::builder()
            .with_extensions(["rs".to_string()].into())
            .build(),
    );
    assert_eq!(with_dot, without_dot);
}

#[test]
fn test_multi_dot_extension_suffix_match() {
    let set = FileSet::dir(
        "dist",
        DirFilters::builder()
            .with_extensions([".tar.gz".to_string()].into())
            .build(),
    )
    .unwrap();
    assert!(set.includes_file("dist/bundle.tar.gz"));
    assert!(!set.includes_file("dist/bundle.gz"));
}
