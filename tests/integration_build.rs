// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end build scenarios: task selection, argument passing and
//! parallel group execution through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rask::{
    Action, BuildContext, BuildOutcome, Options, Task, config::RaskConfig, run_build,
};

fn rel_tempdir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(".")
        .expect("tempdir in cwd")
}

fn context(tmp: &tempfile::TempDir) -> BuildContext {
    BuildContext::new().with_cache_dir(tmp.path().join("cache"))
}

/// The hello/bye pair used by several scenarios: `hello` greets, `bye`
/// depends on `hello`.
fn greeting_tasks(log: &Arc<Mutex<Vec<String>>>) -> Vec<Task> {
    let hello_log = Arc::clone(log);
    let bye_log = Arc::clone(log);
    vec![
        Task::new(
            "hello",
            Action::plain(move |args| {
                let log = Arc::clone(&hello_log);
                Box::pin(async move {
                    let who = args.first().map_or("World", String::as_str);
                    let line = format!("Hello {who}!");
                    println!("{line}");
                    log.lock().expect("log lock").push(line);
                    Ok(())
                })
            }),
        ),
        Task::new(
            "bye",
            Action::plain(move |_args| {
                let log = Arc::clone(&bye_log);
                Box::pin(async move {
                    println!("Bye!");
                    log.lock().expect("log lock").push("Bye!".to_string());
                    Ok(())
                })
            }),
        )
        .with_depends_on(["hello"]),
    ]
}

#[tokio::test]
async fn test_default_task_runs_alone() {
    let tmp = rel_tempdir("e2e-default");
    let log = Arc::new(Mutex::new(Vec::new()));

    let outcome = run_build(
        &context(&tmp),
        &Options::default(),
        greeting_tasks(&log),
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    match outcome {
        BuildOutcome::Executed(summary) => {
            assert_eq!(summary.executed, 1, "only the default task runs");
        }
        BuildOutcome::DisplayOnly => panic!("expected execution"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["Hello World!"]);
}

#[tokio::test]
async fn test_argument_reaches_the_task() {
    let tmp = rel_tempdir("e2e-args");
    let log = Arc::new(Mutex::new(Vec::new()));

    let options = Options {
        tasks: vec!["hello".to_string(), ":Joe".to_string()],
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        greeting_tasks(&log),
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    assert_eq!(*log.lock().unwrap(), vec!["Hello Joe!"]);
}

#[tokio::test]
async fn test_dependency_runs_before_dependent() {
    let tmp = rel_tempdir("e2e-deps");
    let log = Arc::new(Mutex::new(Vec::new()));

    let options = Options {
        tasks: vec!["bye".to_string()],
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        greeting_tasks(&log),
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    assert_eq!(*log.lock().unwrap(), vec!["Hello World!", "Bye!"]);
}

fn gauge_task(
    name: &str,
    active: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
    runs: &Arc<AtomicUsize>,
) -> Task {
    let active = Arc::clone(active);
    let peak = Arc::clone(peak);
    let runs = Arc::clone(runs);
    Task::new(
        name,
        Action::plain(move |_args| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let runs = Arc::clone(&runs);
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
        }),
    )
    .with_parallelizable(true)
}

#[tokio::test]
async fn test_parallel_group_overlaps_and_runs_once() {
    let tmp = rel_tempdir("e2e-par");
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let options = Options {
        tasks: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        vec![
            gauge_task("a", &active, &peak, &runs),
            gauge_task("b", &active, &peak, &runs),
            gauge_task("c", &active, &peak, &runs),
        ],
        &["a"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    assert_eq!(runs.load(Ordering::SeqCst), 3, "each task runs exactly once");
    let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    if workers >= 2 {
        assert!(peak.load(Ordering::SeqCst) >= 2, "actions should overlap");
    }
}

#[tokio::test]
async fn test_no_parallel_tasks_run_sequentially() {
    let tmp = rel_tempdir("e2e-seq");
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let options = Options {
        tasks: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        no_parallel_tasks: true,
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        vec![
            gauge_task("a", &active, &peak, &runs),
            gauge_task("b", &active, &peak, &runs),
            gauge_task("c", &active, &peak, &runs),
        ],
        &["a"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(peak.load(Ordering::SeqCst), 1, "no two actions overlap");
}

#[tokio::test]
async fn test_force_tasks_bypasses_cache() {
    let tmp = rel_tempdir("e2e-force");
    let input = tmp.path().join("input.txt");
    std::fs::write(&input, "v1").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let make_task = |runs: &Arc<AtomicUsize>| {
        let runs = Arc::clone(runs);
        Task::new(
            "encode",
            Action::plain(move |_args| {
                let runs = Arc::clone(&runs);
                Box::pin(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        )
        .with_run_condition(rask::RunCondition::on_changes(
            rask::FileSet::file(&input),
            rask::FileSet::empty(),
        ))
    };

    // First run caches; a plain second run would be up-to-date.
    run_build(
        &context(&tmp),
        &Options::default(),
        vec![make_task(&runs)],
        &["encode"],
        &RaskConfig::default(),
    )
    .await
    .expect("first build");
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let options = Options {
        force_tasks: true,
        ..Options::default()
    };
    run_build(
        &context(&tmp),
        &options,
        vec![make_task(&runs)],
        &["encode"],
        &RaskConfig::default(),
    )
    .await
    .expect("forced build");
    assert_eq!(runs.load(Ordering::SeqCst), 2, "--force-tasks reruns");
}
