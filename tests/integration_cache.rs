// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end incremental scenarios: change detection, idempotence and
//! cache persistence across builds.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rask::{
    Action, BuildContext, FileSet, Options, RunCondition, Task, config::RaskConfig,
    run_build,
};

fn rel_tempdir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(".")
        .expect("tempdir in cwd")
}

fn context(tmp: &tempfile::TempDir) -> BuildContext {
    // A zero grace window makes edits visible immediately; the tests
    // bump mtimes into the future to defeat timestamp granularity.
    BuildContext::new()
        .with_cache_dir(tmp.path().join("cache"))
        .with_mtime_grace(Duration::ZERO)
}

fn touch_future(path: &Path) {
    let future = std::time::SystemTime::now() + Duration::from_secs(30);
    filetime::set_file_mtime(path, filetime::FileTime::from_system_time(future))
        .expect("set mtime");
}

/// `encode` copies input.txt to output.txt, counting its runs.
fn encode_task(input: &Path, output: &Path, runs: &Arc<AtomicUsize>) -> Task {
    let input_path = input.to_path_buf();
    let output_path = output.to_path_buf();
    let runs = Arc::clone(runs);
    Task::new(
        "encode",
        Action::plain(move |_args| {
            let input = input_path.clone();
            let output = output_path.clone();
            let runs = Arc::clone(&runs);
            Box::pin(async move {
                let text = tokio::fs::read_to_string(&input).await?;
                tokio::fs::write(&output, text.to_uppercase()).await?;
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }),
    )
    .with_run_condition(RunCondition::OnChanges {
        inputs: FileSet::file(input),
        outputs: FileSet::file(output),
        key: None,
        verify_outputs_exist: true,
    })
}

async fn build_encode(
    tmp: &tempfile::TempDir,
    input: &Path,
    output: &Path,
    runs: &Arc<AtomicUsize>,
) {
    run_build(
        &context(tmp),
        &Options::default(),
        vec![encode_task(input, output, runs)],
        &["encode"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");
}

#[tokio::test]
async fn test_change_detection_lifecycle() {
    let tmp = rel_tempdir("e2e-changes");
    let input = tmp.path().join("input.txt");
    let output = tmp.path().join("output.txt");
    std::fs::write(&input, "first").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    // First build runs the action and produces the output.
    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "FIRST");

    // Unchanged inputs: up-to-date, the action is not invoked.
    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // Modified input: out-of-date, the output is rewritten.
    std::fs::write(&input, "second").unwrap();
    touch_future(&input);
    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "SECOND");
}

#[tokio::test]
async fn test_deleted_output_triggers_rerun() {
    let tmp = rel_tempdir("e2e-delout");
    let input = tmp.path().join("input.txt");
    let output = tmp.path().join("output.txt");
    std::fs::write(&input, "data").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    std::fs::remove_file(&output).unwrap();
    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Snapshot of the cache directory: relative path -> file contents.
fn cache_snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).expect("read cache dir") {
            let entry = entry.expect("cache dir entry");
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path
                    .strip_prefix(root)
                    .expect("within root")
                    .to_string_lossy()
                    .into_owned();
                out.insert(rel, std::fs::read(&path).expect("read cache file"));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

#[tokio::test]
async fn test_idempotent_second_build_leaves_cache_identical() {
    let tmp = rel_tempdir("e2e-idem");
    let input = tmp.path().join("input.txt");
    let output = tmp.path().join("output.txt");
    std::fs::write(&input, "stable").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    build_encode(&tmp, &input, &output, &runs).await;
    let after_first = cache_snapshot(&tmp.path().join("cache"));

    build_encode(&tmp, &input, &output, &runs).await;
    let after_second = cache_snapshot(&tmp.path().join("cache"));

    assert_eq!(runs.load(Ordering::SeqCst), 1, "second build is a no-op");
    assert_eq!(after_first, after_second, "cache contents must not change");
}

#[tokio::test]
async fn test_reset_cache_forces_rerun() {
    let tmp = rel_tempdir("e2e-reset");
    let input = tmp.path().join("input.txt");
    let output = tmp.path().join("output.txt");
    std::fs::write(&input, "data").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    build_encode(&tmp, &input, &output, &runs).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let options = Options {
        reset_cache: true,
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        vec![encode_task(&input, &output, &runs)],
        &["encode"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");
    assert_eq!(runs.load(Ordering::SeqCst), 2, "wiped cache reruns the task");
}

#[tokio::test]
async fn test_disable_cache_always_runs() {
    let tmp = rel_tempdir("e2e-nocache");
    let input = tmp.path().join("input.txt");
    let output = tmp.path().join("output.txt");
    std::fs::write(&input, "data").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let options = Options {
        disable_cache: true,
        ..Options::default()
    };
    for _ in 0..2 {
        run_build(
            &context(&tmp),
            &options,
            vec![encode_task(&input, &output, &runs)],
            &["encode"],
            &RaskConfig::default(),
        )
        .await
        .expect("build succeeds");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    // No cache directory was ever populated.
    assert!(!tmp.path().join("cache").join("version").exists());
}

#[tokio::test]
async fn test_recursed_directory_tracks_deletions() {
    let tmp = rel_tempdir("e2e-dirdel");
    let sources = tmp.path().join("sources");
    std::fs::create_dir(&sources).unwrap();
    std::fs::write(sources.join("a.txt"), "a").unwrap();
    std::fs::write(sources.join("b.txt"), "b").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    // Directory inputs must be relative; build one from the tempdir name.
    let rel_sources = sources
        .strip_prefix(std::env::current_dir().unwrap())
        .map_or_else(|_| sources.clone(), Path::to_path_buf);
    let make_task = |runs: &Arc<AtomicUsize>| {
        let runs = Arc::clone(runs);
        Task::new(
            "bundle",
            Action::plain(move |_args| {
                let runs = Arc::clone(&runs);
                Box::pin(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        )
        .with_run_condition(RunCondition::on_changes(
            FileSet::dir(
                &rel_sources,
                rask::DirFilters::builder().with_recurse(true).build(),
            )
            .expect("relative dir"),
            FileSet::empty(),
        ))
    };

    for _ in 0..2 {
        run_build(
            &context(&tmp),
            &Options::default(),
            vec![make_task(&runs)],
            &["bundle"],
            &RaskConfig::default(),
        )
        .await
        .expect("build succeeds");
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1, "listing unchanged");

    // Deleting a file changes the directory's structural hash even
    // though no explicit input named it.
    std::fs::remove_file(sources.join("b.txt")).unwrap();
    run_build(
        &context(&tmp),
        &Options::default(),
        vec![make_task(&runs)],
        &["bundle"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
