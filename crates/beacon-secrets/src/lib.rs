// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key provisioning and authenticated record encryption.
//!
//! Two concerns live here:
//!
//! - [`KeyVault`]: lazy, per-purpose provisioning of random key material,
//!   persisted through the OS keystore with an on-disk fallback, and
//!   regenerated when the persisted material cannot be read back.
//! - [`RecordCodec`]: AES-256-GCM encryption of record payloads with a
//!   fresh 96-bit nonce per call, packaged as base64 text for storage.
//!
//! Losing a key loses only already-queued telemetry, never user data, so
//! the vault trades durability for availability and recovers from any
//! corruption by regenerating.

pub mod codec;
pub mod error;
pub mod vault;

pub use codec::RecordCodec;
pub use error::{Result, SecretsError};
pub use vault::{FileKeyStore, KeyPurpose, KeyStore, KeyVault};

#[cfg(feature = "keyring")]
pub use vault::{KeyringKeyStore, KeyringThenFileStore};
