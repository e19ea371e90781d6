// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background task scheduling for the Beacon pipeline.
//!
//! A deliberately small scheduler: tasks are identified by a typed
//! [`TaskKind`], triggering a kind that is already in flight replaces the
//! in-flight run instead of queueing behind it, and a task that reports
//! [`TaskOutcome::Retry`] is re-run with exponential backoff. Tasks that
//! need the network declare it and are deferred while a connectivity
//! probe reports offline.
//!
//! The scheduler is process-lifetime infrastructure; durable survival
//! across process restarts comes from the pipeline re-triggering every
//! kind at startup, not from persisting schedule state.

pub mod error;
pub mod scheduler;
pub mod task;

pub use error::{Result, TaskError};
pub use scheduler::TaskScheduler;
pub use task::{AlwaysConnected, ConnectivityProbe, NetworkConstraint, Task, TaskKind, TaskOutcome};
