// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types shared across the pipeline.

use thiserror::Error;

/// Errors raised while validating or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The endpoint base URL could not be parsed.
	#[error("invalid endpoint URL: {0}")]
	InvalidUrl(String),

	/// A plaintext `http://` base URL pointing at a non-development host.
	#[error("plaintext HTTP is only permitted for local development hosts, got {0}")]
	PlaintextNotAllowed(String),

	/// An operation that requires a base URL was attempted without one.
	#[error("endpoint base URL is not configured")]
	MissingBaseUrl,

	/// A certificate pin that is not a valid SHA-256 SPKI digest.
	#[error("invalid certificate pin: {0}")]
	InvalidPin(String),
}

/// Failure to parse a staged record line.
///
/// A staged file that produces this error is skipped, never fatal to a
/// worker pass.
#[derive(Debug, Error)]
pub enum RecordParseError {
	/// The line did not split into the six expected fields.
	#[error("expected 6 fields, found {0}")]
	FieldCount(usize),

	/// The timestamp field was not a valid integer.
	#[error("invalid timestamp field: {0}")]
	Timestamp(String),

	/// The fatal flag field was not a boolean.
	#[error("invalid fatal flag: {0}")]
	FatalFlag(String),
}
