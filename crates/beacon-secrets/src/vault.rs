// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lazy key provisioning backed by the OS keystore.
//!
//! Key material never leaves the process unencoded: the keystore holds it
//! base64-encoded, in-memory copies live in [`Zeroizing`] buffers, and
//! nothing here ever logs material. A persisted entry that cannot be read
//! back is abandoned and regenerated; previously encrypted telemetry
//! becomes unreadable, which is the accepted cost.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{Result, SecretsError};

/// What a piece of key material is for.
///
/// Each purpose gets independent material; losing one never affects the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
	/// 256-bit symmetric key for staged-file and column encryption.
	RecordKey,
	/// Longer secret for database-level encryption.
	StoreSecret,
}

impl KeyPurpose {
	/// Name of the keystore entry for this purpose.
	pub fn entry_name(&self) -> &'static str {
		match self {
			KeyPurpose::RecordKey => "beacon-record-key",
			KeyPurpose::StoreSecret => "beacon-store-secret",
		}
	}

	/// Required material length in bytes.
	pub fn material_len(&self) -> usize {
		match self {
			KeyPurpose::RecordKey => 32,
			KeyPurpose::StoreSecret => 64,
		}
	}
}

/// Persistence backend for key material.
///
/// Implementations store the material however they like but must return
/// exactly the bytes that were saved. `load` distinguishes "absent"
/// (`Ok(None)`) from "present but unreadable" (`Err`); the vault treats
/// both errors and wrong-length material as corruption.
pub trait KeyStore: Send + Sync {
	/// Loads previously saved material, or `None` when never saved.
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
	/// Saves material under a name, replacing any previous value.
	fn save(&self, name: &str, material: &[u8]) -> Result<()>;
}

/// Key store backed by the operating system keyring.
#[cfg(feature = "keyring")]
#[derive(Debug)]
pub struct KeyringKeyStore {
	service: String,
}

#[cfg(feature = "keyring")]
impl KeyringKeyStore {
	pub fn new(service: impl Into<String>) -> Self {
		Self {
			service: service.into(),
		}
	}

	fn entry(&self, name: &str) -> Result<keyring::Entry> {
		keyring::Entry::new(&self.service, name).map_err(|e| SecretsError::Vault(e.to_string()))
	}
}

#[cfg(feature = "keyring")]
impl KeyStore for KeyringKeyStore {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		match self.entry(name)?.get_password() {
			Ok(encoded) => {
				let material = BASE64
					.decode(encoded)
					.map_err(|_| SecretsError::Vault(format!("undecodable keyring entry {name}")))?;
				Ok(Some(material))
			}
			Err(keyring::Error::NoEntry) => Ok(None),
			Err(e) => Err(SecretsError::Vault(e.to_string())),
		}
	}

	fn save(&self, name: &str, material: &[u8]) -> Result<()> {
		self.entry(name)?
			.set_password(&BASE64.encode(material))
			.map_err(|e| SecretsError::Vault(e.to_string()))
	}
}

/// File-based key store used when no OS keyring is available.
#[derive(Debug)]
pub struct FileKeyStore {
	dir: PathBuf,
}

impl FileKeyStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	fn path_for(&self, name: &str) -> PathBuf {
		self.dir.join(format!("{name}.key"))
	}
}

impl KeyStore for FileKeyStore {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		let path = self.path_for(name);
		let encoded = match std::fs::read_to_string(&path) {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(SecretsError::Vault(format!("{}: {e}", path.display()))),
		};
		let material = BASE64
			.decode(encoded.trim())
			.map_err(|_| SecretsError::Vault(format!("undecodable key file {}", path.display())))?;
		Ok(Some(material))
	}

	fn save(&self, name: &str, material: &[u8]) -> Result<()> {
		std::fs::create_dir_all(&self.dir)
			.map_err(|e| SecretsError::Vault(format!("{}: {e}", self.dir.display())))?;
		let path = self.path_for(name);
		std::fs::write(&path, BASE64.encode(material))
			.map_err(|e| SecretsError::Vault(format!("{}: {e}", path.display())))?;

		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = std::fs::Permissions::from_mode(0o600);
			std::fs::set_permissions(&path, perms)
				.map_err(|e| SecretsError::Vault(format!("{}: {e}", path.display())))?;
		}

		Ok(())
	}
}

/// Keyring-first store that falls back to a key file when the keyring is
/// unavailable.
#[cfg(feature = "keyring")]
#[derive(Debug)]
pub struct KeyringThenFileStore {
	keyring: KeyringKeyStore,
	file: FileKeyStore,
}

#[cfg(feature = "keyring")]
impl KeyringThenFileStore {
	pub fn new(service: impl Into<String>, fallback_dir: impl Into<PathBuf>) -> Self {
		Self {
			keyring: KeyringKeyStore::new(service),
			file: FileKeyStore::new(fallback_dir),
		}
	}
}

#[cfg(feature = "keyring")]
impl KeyStore for KeyringThenFileStore {
	fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
		match self.keyring.load(name) {
			Ok(Some(material)) => Ok(Some(material)),
			Ok(None) => self.file.load(name),
			Err(error) => {
				warn!(%error, "keyring load failed, trying key file");
				self.file.load(name)
			}
		}
	}

	fn save(&self, name: &str, material: &[u8]) -> Result<()> {
		match self.keyring.save(name, material) {
			Ok(()) => Ok(()),
			Err(error) => {
				warn!(%error, "keyring save failed, falling back to key file");
				self.file.save(name, material)
			}
		}
	}
}

/// Provisions and caches nothing: every call goes to the backing store so
/// that external invalidation is observed on next use.
pub struct KeyVault {
	store: Box<dyn KeyStore>,
}

impl KeyVault {
	/// Creates a vault over an explicit backing store.
	pub fn new(store: Box<dyn KeyStore>) -> Self {
		Self { store }
	}

	/// Creates a vault over the OS keyring with a file fallback.
	#[cfg(feature = "keyring")]
	pub fn with_os_keyring(service: impl Into<String>, fallback_dir: impl Into<PathBuf>) -> Self {
		Self::new(Box::new(KeyringThenFileStore::new(service, fallback_dir)))
	}

	/// Returns the key material for a purpose, generating and persisting
	/// it on first use.
	///
	/// Unreadable or wrong-length persisted material is regenerated; a
	/// failure to persist freshly generated material is logged and the
	/// in-memory key is still returned, so capture keeps working for the
	/// life of the process.
	pub fn get_or_create(&self, purpose: KeyPurpose) -> Result<Zeroizing<Vec<u8>>> {
		let name = purpose.entry_name();

		match self.store.load(name) {
			Ok(Some(material)) if material.len() == purpose.material_len() => {
				return Ok(Zeroizing::new(material));
			}
			Ok(Some(material)) => {
				warn!(
					entry = name,
					actual_len = material.len(),
					expected_len = purpose.material_len(),
					"persisted key material has wrong length, regenerating"
				);
			}
			Ok(None) => {
				debug!(entry = name, "provisioning new key material");
			}
			Err(error) => {
				warn!(entry = name, %error, "failed to load key material, regenerating");
			}
		}

		let mut material = Zeroizing::new(vec![0u8; purpose.material_len()]);
		OsRng.fill_bytes(material.as_mut_slice());

		if let Err(error) = self.store.save(name, &material) {
			warn!(entry = name, %error, "failed to persist key material, continuing in-memory");
		}

		Ok(material)
	}
}
