// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for background tasks.

use thiserror::Error;

/// Result type alias for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors that can occur while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
	/// The task failed terminally; the run is not retried.
	#[error("task failed: {0}")]
	Failed(String),

	/// No task is registered for the requested kind.
	#[error("no task registered for kind {0}")]
	NotRegistered(&'static str),
}
