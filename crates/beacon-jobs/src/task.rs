// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Task definitions and scheduling constraints.

use async_trait::async_trait;

use crate::error::Result;

/// Identity of a schedulable task.
///
/// Dispatch is keyed on this enum, so adding a worker means adding a
/// variant; there is no string-based lookup anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
	/// Drains the staging directory into the durable store.
	Ingest,
	/// Ships durable records to the collection endpoint.
	Upload,
}

impl TaskKind {
	/// Stable name for logging.
	pub fn as_str(&self) -> &'static str {
		match self {
			TaskKind::Ingest => "ingest",
			TaskKind::Upload => "upload",
		}
	}
}

impl std::fmt::Display for TaskKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Connectivity requirement of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkConstraint {
	/// Runs regardless of connectivity.
	None,
	/// Deferred while the connectivity probe reports offline.
	Connected,
}

/// Terminal outcome of a single task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
	/// The run finished; nothing more to do until the next trigger.
	Success,
	/// The run hit a transient condition; re-run after backoff.
	Retry,
}

/// A unit of background work.
///
/// Implementations must be idempotent across re-runs: the scheduler
/// guarantees at-least-once execution per trigger, never exactly-once.
#[async_trait]
pub trait Task: Send + Sync {
	/// The task's identity.
	fn kind(&self) -> TaskKind;

	/// Connectivity requirement; defaults to none.
	fn constraint(&self) -> NetworkConstraint {
		NetworkConstraint::None
	}

	/// Runs the task to a terminal outcome.
	async fn run(&self) -> Result<TaskOutcome>;
}

/// Reports whether the device currently has network connectivity.
pub trait ConnectivityProbe: Send + Sync {
	fn is_connected(&self) -> bool;
}

/// Probe that always reports connectivity; the default for hosts without
/// a platform connectivity source.
pub struct AlwaysConnected;

impl ConnectivityProbe for AlwaysConnected {
	fn is_connected(&self) -> bool {
		true
	}
}
