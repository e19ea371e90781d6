// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated encryption of record payloads.
//!
//! AES-256-GCM with a fresh 96-bit random nonce per call and a 128-bit
//! tag. The nonce is prepended to the ciphertext and the combined buffer
//! base64-encoded, so an encrypted payload is a single opaque text blob.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{Result, SecretsError};

/// Size of the codec key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Encrypts and decrypts record payloads with a fixed symmetric key.
#[derive(Clone)]
pub struct RecordCodec {
	cipher: Aes256Gcm,
}

impl RecordCodec {
	/// Builds a codec from 32 bytes of key material.
	pub fn new(key_material: &[u8]) -> Result<Self> {
		if key_material.len() != KEY_SIZE {
			return Err(SecretsError::InvalidKeySize {
				expected: KEY_SIZE,
				actual: key_material.len(),
			});
		}
		let key = Key::<Aes256Gcm>::from_slice(key_material);
		Ok(Self {
			cipher: Aes256Gcm::new(key),
		})
	}

	/// Encrypts a payload into an opaque base64 blob.
	///
	/// Every call draws a fresh nonce, so encrypting the same payload
	/// twice produces different blobs.
	pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = self
			.cipher
			.encrypt(nonce, plaintext)
			.map_err(|e| SecretsError::Encryption(e.to_string()))?;

		let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		combined.extend_from_slice(&nonce_bytes);
		combined.extend_from_slice(&ciphertext);
		Ok(BASE64.encode(combined))
	}

	/// Decrypts a blob produced by [`encrypt`](Self::encrypt).
	///
	/// Fails on a bad tag, a mismatched key, or a malformed envelope.
	/// The failure is terminal for the blob: retrying the same bytes with
	/// the same key can never succeed.
	pub fn decrypt(&self, encoded: &str) -> Result<Zeroizing<Vec<u8>>> {
		let combined = BASE64
			.decode(encoded.trim())
			.map_err(|e| SecretsError::Decryption(format!("invalid base64: {e}")))?;
		if combined.len() < NONCE_SIZE {
			return Err(SecretsError::Decryption(format!(
				"envelope too short: {} bytes",
				combined.len()
			)));
		}

		let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
		let nonce = Nonce::from_slice(nonce_bytes);

		let plaintext = self
			.cipher
			.decrypt(nonce, ciphertext)
			.map_err(|e| SecretsError::Decryption(e.to_string()))?;

		Ok(Zeroizing::new(plaintext))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn test_codec() -> RecordCodec {
		RecordCodec::new(&[7u8; KEY_SIZE]).unwrap()
	}

	#[test]
	fn rejects_wrong_key_size() {
		let result = RecordCodec::new(&[0u8; 16]);
		assert!(matches!(
			result,
			Err(SecretsError::InvalidKeySize {
				expected: 32,
				actual: 16
			})
		));
	}

	#[test]
	fn encryption_roundtrip() {
		let codec = test_codec();
		let blob = codec.encrypt(b"1700000000000|true|14|Acme|W|trace").unwrap();
		let plaintext = codec.decrypt(&blob).unwrap();
		assert_eq!(plaintext.as_slice(), b"1700000000000|true|14|Acme|W|trace");
	}

	#[test]
	fn repeated_encryption_differs() {
		let codec = test_codec();
		let first = codec.encrypt(b"same payload").unwrap();
		let second = codec.encrypt(b"same payload").unwrap();
		assert_ne!(first, second);
	}

	#[test]
	fn wrong_key_fails() {
		let codec = test_codec();
		let other = RecordCodec::new(&[8u8; KEY_SIZE]).unwrap();

		let blob = codec.encrypt(b"payload").unwrap();
		assert!(matches!(
			other.decrypt(&blob),
			Err(SecretsError::Decryption(_))
		));
	}

	#[test]
	fn tampered_blob_fails() {
		let codec = test_codec();
		let blob = codec.encrypt(b"payload").unwrap();

		let mut combined = BASE64.decode(&blob).unwrap();
		let last = combined.len() - 1;
		combined[last] ^= 0xFF;
		let tampered = BASE64.encode(combined);

		assert!(matches!(
			codec.decrypt(&tampered),
			Err(SecretsError::Decryption(_))
		));
	}

	#[test]
	fn malformed_envelopes_fail_cleanly() {
		let codec = test_codec();
		assert!(codec.decrypt("not base64 at all!!!").is_err());
		assert!(codec.decrypt("").is_err());
		assert!(codec.decrypt(&BASE64.encode([0u8; 4])).is_err());
	}

	proptest! {
		#[test]
		fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
			let codec = test_codec();
			let blob = codec.encrypt(&payload).unwrap();
			let plaintext = codec.decrypt(&blob).unwrap();
			prop_assert_eq!(plaintext.as_slice(), payload.as_slice());
		}

		#[test]
		fn prop_fresh_nonce(payload in proptest::collection::vec(any::<u8>(), 1..512)) {
			let codec = test_codec();
			prop_assert_ne!(codec.encrypt(&payload).unwrap(), codec.encrypt(&payload).unwrap());
		}
	}
}
