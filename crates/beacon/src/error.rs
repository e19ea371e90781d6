// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the pipeline crate.

use thiserror::Error;

/// Errors surfaced while constructing or operating the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// The builder was not given a data directory.
	#[error("data directory is required")]
	MissingDataDir,

	/// Configuration validation failure.
	#[error(transparent)]
	Config(#[from] beacon_core::ConfigError),

	/// Key provisioning or codec failure.
	#[error(transparent)]
	Secrets(#[from] beacon_secrets::SecretsError),

	/// Durable store failure.
	#[error(transparent)]
	Store(#[from] beacon_store::StoreError),

	/// Filesystem failure.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

/// Internal failure while capturing a record.
///
/// Never escapes a capture entry point: both the non-fatal and fatal
/// paths catch this, log it, and move on, because crash reporting must
/// not itself disturb the host application.
#[derive(Debug, Error)]
pub enum CaptureError {
	/// Record encryption failed.
	#[error(transparent)]
	Crypto(#[from] beacon_secrets::SecretsError),

	/// Staged file could not be written.
	#[error("staging write failed: {0}")]
	Io(#[from] std::io::Error),
}
