// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the durable store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Underlying database failure.
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	/// Column encryption or decryption failure.
	#[error(transparent)]
	Crypto(#[from] beacon_secrets::SecretsError),

	/// A stored value that decrypted but could not be interpreted.
	#[error("corrupt stored value: {0}")]
	Corrupt(String),
}
