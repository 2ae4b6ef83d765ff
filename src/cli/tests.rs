// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{Options, try_parse_from};
use crate::logging::LogLevel;

fn parse(args: &[&str]) -> Options {
    try_parse_from(args.iter().copied()).expect("arguments should parse")
}

#[test]
fn test_defaults() {
    let options = parse(&[]);
    assert!(options.color_requested());
    assert!(options.parallel_enabled());
    assert!(!options.force());
    assert!(!options.show_info_only());
    assert!(!options.reset_cache);
    assert!(options.log_level.is_none());
    assert!(options.tasks.is_empty());
}

#[test]
fn test_tasks_and_args_are_positional() {
    let options = parse(&["hello", ":Joe", "bye"]);
    assert_eq!(options.tasks, vec!["hello", ":Joe", "bye"]);
}

#[test]
fn test_log_level_values() {
    assert_eq!(parse(&["-l", "debug"]).log_level, Some(LogLevel::Debug));
    assert_eq!(parse(&["--log-level", "fine"]).log_level, Some(LogLevel::Fine));
    assert_eq!(
        parse(&["--log-level", "profile"]).log_level,
        Some(LogLevel::Profile)
    );
    assert!(try_parse_from(["--log-level", "loud"]).is_err());
}

#[test]
fn test_color_toggle() {
    assert!(parse(&["-c"]).color_requested());
    assert!(!parse(&["--no-color"]).color_requested());
    // Last flag wins.
    assert!(parse(&["--no-color", "-c"]).color_requested());
    assert!(!parse(&["-c", "--no-color"]).color_requested());
}

#[test]
fn test_parallel_toggle() {
    assert!(parse(&["-p"]).parallel_enabled());
    assert!(!parse(&["--no-parallel-tasks"]).parallel_enabled());
    assert!(parse(&["--no-parallel-tasks", "-p"]).parallel_enabled());
}

#[test]
fn test_disable_cache_implies_force() {
    let options = parse(&["-d", "build"]);
    assert!(options.disable_cache);
    assert!(options.force());
    assert!(!options.force_tasks);
}

#[test]
fn test_show_flags() {
    assert!(parse(&["-s"]).show_info_only());
    assert!(parse(&["-g"]).show_info_only());
    assert!(parse(&["--show-tasks", "--show-task-graph"]).show_info_only());
}

#[test]
fn test_short_flags() {
    let options = parse(&["-f", "-z", "clean"]);
    assert!(options.force_tasks);
    assert!(options.reset_cache);
    assert_eq!(options.tasks, vec!["clean"]);
}
