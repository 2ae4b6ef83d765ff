// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BuildOutcome, format_duration, render_task_graph, render_tasks, run_build};
use crate::cli::Options;
use crate::config::RaskConfig;
use crate::error::RaskError;
use crate::resolver::resolve_tasks;
use crate::task::{Action, BuildContext, Phase, Task};

fn rel_tempdir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(".")
        .expect("tempdir in cwd")
}

fn noop(name: &str) -> Task {
    Task::new(name, Action::plain(|_| Box::pin(async { Ok(()) })))
}

fn recording(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Task {
    let label = name.to_string();
    let log = Arc::clone(log);
    Task::new(
        name,
        Action::plain(move |_args| {
            let label = label.clone();
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().expect("log lock").push(label);
                Ok(())
            })
        }),
    )
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(12)), "12ms");
    assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
    assert_eq!(format_duration(Duration::from_millis(1200)), "1.2s");
    assert_eq!(format_duration(Duration::from_secs(59)), "59.0s");
    assert_eq!(format_duration(Duration::from_secs(63)), "1m 3s");
}

#[test]
fn test_render_tasks_groups_by_phase() {
    let resolved = resolve_tasks(
        &BuildContext::new(),
        vec![
            noop("compile").with_description("Compiles the sources"),
            noop("init").with_phase(Phase::setup()),
            noop("publish").with_phase(Phase::tear_down()),
        ],
    )
    .unwrap();

    let rendered = render_tasks(&resolved, &["compile"]);
    insta::assert_snapshot!(rendered, @r"
    Tasks in phase 'setup':
      * init
    Tasks in phase 'build':
      * compile [default]
          Compiles the sources
    Tasks in phase 'tearDown':
      * publish
    ");
}

#[test]
fn test_render_task_graph() {
    let resolved = resolve_tasks(
        &BuildContext::new(),
        vec![
            noop("all").with_depends_on(["compile"]),
            noop("compile").with_depends_on(["generate"]),
            noop("generate"),
        ],
    )
    .unwrap();

    let rendered = render_task_graph(&resolved);
    insta::assert_snapshot!(rendered, @r"
    - all
      - compile
        - generate
    - compile
      - generate
    - generate
    ");
}

#[tokio::test]
async fn test_run_build_executes_defaults() {
    let tmp = rel_tempdir("runner-defaults");
    let context = BuildContext::new().with_cache_dir(tmp.path().join("cache"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let outcome = run_build(
        &context,
        &Options::default(),
        vec![recording("hello", &log), recording("bye", &log)],
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    match outcome {
        BuildOutcome::Executed(summary) => {
            assert_eq!(summary.executed, 1);
        }
        BuildOutcome::DisplayOnly => panic!("expected execution"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["hello"]);
}

#[tokio::test]
async fn test_run_build_selects_requested_task_with_args() {
    let tmp = rel_tempdir("runner-args");
    let context = BuildContext::new().with_cache_dir(tmp.path().join("cache"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let greeter = {
        let log = Arc::clone(&log);
        Task::new(
            "hello",
            Action::plain(move |args| {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    let name = args.first().map_or("World", String::as_str);
                    log.lock().expect("log lock").push(format!("Hello {name}!"));
                    Ok(())
                })
            }),
        )
    };

    let options = Options {
        tasks: vec!["hello".to_string(), ":Joe".to_string()],
        ..Options::default()
    };
    run_build(
        &context,
        &options,
        vec![greeter, noop("bye")],
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("build succeeds");

    assert_eq!(*log.lock().unwrap(), vec!["Hello Joe!"]);
}

#[tokio::test]
async fn test_show_tasks_is_display_only() {
    let tmp = rel_tempdir("runner-show");
    let context = BuildContext::new().with_cache_dir(tmp.path().join("cache"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let options = Options {
        show_tasks: true,
        ..Options::default()
    };
    let outcome = run_build(
        &context,
        &options,
        vec![recording("hello", &log)],
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect("display succeeds");

    assert!(matches!(outcome, BuildOutcome::DisplayOnly));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_configuration_error_aborts_before_execution() {
    let tmp = rel_tempdir("runner-config-err");
    let context = BuildContext::new().with_cache_dir(tmp.path().join("cache"));
    let log = Arc::new(Mutex::new(Vec::new()));

    let err = run_build(
        &context,
        &Options::default(),
        vec![
            recording("x", &log).with_depends_on(["y"]),
            recording("y", &log).with_depends_on(["x"]),
        ],
        &["x"],
        &RaskConfig::default(),
    )
    .await
    .expect_err("cycle must abort");

    assert!(matches!(err, RaskError::CycleDetected { .. }));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_requested_task() {
    let tmp = rel_tempdir("runner-unknown");
    let context = BuildContext::new().with_cache_dir(tmp.path().join("cache"));

    let options = Options {
        tasks: vec!["ghost".to_string()],
        ..Options::default()
    };
    let err = run_build(
        &context,
        &options,
        vec![noop("hello")],
        &["hello"],
        &RaskConfig::default(),
    )
    .await
    .expect_err("unknown task");
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn test_config_defaults_apply_to_context() {
    let tmp = rel_tempdir("runner-conf");
    let config = RaskConfig {
        cache: crate::config::CacheConfig {
            dir: Some(tmp.path().join("custom-cache")),
            mtime_grace_ms: Some(5),
        },
        ..RaskConfig::default()
    };

    let input = tmp.path().join("input.txt");
    std::fs::write(&input, "v1").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    run_build(
        &BuildContext::new(),
        &Options::default(),
        vec![recording("hello", &log).with_run_condition(
            crate::task::RunCondition::on_changes(
                crate::fileset::FileSet::file(&input),
                crate::fileset::FileSet::empty(),
            ),
        )],
        &["hello"],
        &config,
    )
    .await
    .expect("build succeeds");

    // The cache landed in the configured directory.
    assert!(tmp.path().join("custom-cache").join("version").is_file());
}
