// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for key provisioning and record encryption.

use thiserror::Error;

/// Result type alias for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors that can occur in the vault or codec.
#[derive(Debug, Error)]
pub enum SecretsError {
	/// The backing key store could not be read or written.
	#[error("key store failure: {0}")]
	Vault(String),

	/// Encryption failed.
	#[error("encryption failed: {0}")]
	Encryption(String),

	/// Decryption failed: bad tag, wrong key, or malformed envelope.
	///
	/// Unrecoverable for the payload in question; callers must not retry
	/// the same bytes with the same key.
	#[error("decryption failed: {0}")]
	Decryption(String),

	/// Key material of the wrong length was supplied.
	#[error("invalid key size: expected {expected} bytes, got {actual}")]
	InvalidKeySize {
		/// Required length in bytes.
		expected: usize,
		/// Supplied length in bytes.
		actual: usize,
	},
}
