// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Library root.
//!
//! # Crate Architecture
//!
//! ```text
//!          user build program (main)
//!                    |
//!                    v
//!              runner (orchestrator)
//!        cli (clap)   config   logging
//!                    |
//!        +-----------+-----------+
//!        v           v           v
//!    resolver    invocation   scheduler
//!    cycle/phase  TASK :ARG    status +
//!    I/O checks   fuzzy match  parallel groups
//!        |                        |
//!        v                        v
//!      task model             executor
//!   Task, Phase,          JoinSet workers,
//!   RunCondition          cancellation,
//!        |                post-run hooks
//!        +------+  +------+
//!               v  v
//!              cache
//!        hashes/ tasks/ (SHA-1)
//!               |
//!        fileset + hasher
//! ```
//!
//! A build program declares its tasks and hands over the command line:
//!
//! ```ignore
//! use rask::{Task, task_from_fn};
//!
//! fn hello(args: Vec<String>) -> rask::ActionFuture {
//!     Box::pin(async move {
//!         println!("Hello {}!", args.first().map_or("World", String::as_str));
//!         Ok(())
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let tasks = vec![task_from_fn!(hello)];
//!     rask::run(std::env::args().skip(1), tasks, &["hello"]).await
//! }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod fileset;
pub mod hasher;
pub mod invocation;
pub mod logging;
pub mod resolver;
pub mod runner;
pub mod scheduler;
pub mod task;

pub use cache::{ChangeKind, FileChange, RunCache};
pub use cli::Options;
pub use error::{RaskError, RaskResult, Result};
pub use executor::{ExecuteOptions, ExecutionSummary, TaskResult};
pub use fileset::{DirFilters, DirectoryEntry, FileSet, ResolvedEntity};
pub use runner::{BuildOutcome, run, run_build, run_with};
pub use scheduler::{ParallelGroup, TaskWithStatus};
pub use task::{
    Action, ActionFuture, ArgsValidator, BuildContext, ChangeSet, Phase, RunCondition, Task,
    TaskInvocation, TaskStatus, TaskWithDeps,
};
