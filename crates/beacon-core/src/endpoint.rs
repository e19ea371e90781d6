// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Endpoint URL handling and transport-security validation.
//!
//! Plaintext HTTP is a configuration error unless the host is on the local
//! development allow-list: loopback, the emulator host address, or an
//! RFC-1918 private range. The check runs when configuration is applied,
//! never as a silent downgrade at request time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use url::Url;

use crate::error::ConfigError;

/// Size in bytes of a SHA-256 SPKI digest.
const PIN_DIGEST_LEN: usize = 32;

/// Pin string prefix; added automatically when a caller omits it.
const PIN_PREFIX: &str = "sha256/";

/// Joins an endpoint base and path into the final upload URL.
///
/// Trailing slashes on the base are trimmed and a leading slash on the
/// path is enforced, so `"https://api.example.com/"` + `"crashes"` and
/// `"https://api.example.com"` + `"/crashes"` produce the same URL.
pub fn join_endpoint(base: &str, path: &str) -> String {
	let base = base.trim_end_matches('/');
	if path.starts_with('/') {
		format!("{base}{path}")
	} else {
		format!("{base}/{path}")
	}
}

/// Extracts the host from a base URL.
pub fn host_of(base: &str) -> Result<String, ConfigError> {
	let url = Url::parse(base).map_err(|e| ConfigError::InvalidUrl(format!("{base}: {e}")))?;
	url
		.host_str()
		.map(|h| h.to_string())
		.ok_or_else(|| ConfigError::InvalidUrl(format!("{base}: missing host")))
}

/// Returns true when a host is on the local-development allow-list.
///
/// Covers loopback names and addresses, the Android emulator host alias
/// 10.0.2.2, and RFC-1918 private ranges used by development machines.
pub fn is_local_dev_host(host: &str) -> bool {
	let host = host.trim_start_matches('[').trim_end_matches(']');

	if host.eq_ignore_ascii_case("localhost") || host == "::1" {
		return true;
	}

	let octets: Vec<u8> = host
		.split('.')
		.filter_map(|part| part.parse::<u8>().ok())
		.collect();
	if octets.len() != 4 || host.split('.').count() != 4 {
		return false;
	}

	match octets[0] {
		127 => true,
		10 => true,
		192 => octets[1] == 168,
		172 => (16..=31).contains(&octets[1]),
		_ => false,
	}
}

/// Validates a base URL at configuration time.
///
/// `https` is always accepted; `http` only for local development hosts.
pub fn validate_endpoint_base(base: &str) -> Result<(), ConfigError> {
	let url = Url::parse(base).map_err(|e| ConfigError::InvalidUrl(format!("{base}: {e}")))?;
	match url.scheme() {
		"https" => Ok(()),
		"http" => {
			let host = url
				.host_str()
				.ok_or_else(|| ConfigError::InvalidUrl(format!("{base}: missing host")))?;
			if is_local_dev_host(host) {
				Ok(())
			} else {
				Err(ConfigError::PlaintextNotAllowed(base.to_string()))
			}
		}
		other => Err(ConfigError::InvalidUrl(format!("unsupported scheme {other}"))),
	}
}

/// A normalized SHA-256 SPKI certificate pin.
///
/// Stored in the `sha256/<base64>` form; the prefix is added when callers
/// supply a bare digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePin(String);

impl CertificatePin {
	/// Parses and normalizes a pin string.
	pub fn parse(pin: &str) -> Result<Self, ConfigError> {
		let digest_part = pin.strip_prefix(PIN_PREFIX).unwrap_or(pin);
		let decoded = BASE64
			.decode(digest_part)
			.map_err(|_| ConfigError::InvalidPin(pin.to_string()))?;
		if decoded.len() != PIN_DIGEST_LEN {
			return Err(ConfigError::InvalidPin(pin.to_string()));
		}
		Ok(Self(format!("{PIN_PREFIX}{digest_part}")))
	}

	/// The normalized `sha256/<base64>` form.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Decodes the raw 32-byte digest.
	pub fn digest(&self) -> [u8; PIN_DIGEST_LEN] {
		let decoded = BASE64
			.decode(&self.0[PIN_PREFIX.len()..])
			.expect("pin was validated at parse time");
		let mut digest = [0u8; PIN_DIGEST_LEN];
		digest.copy_from_slice(&decoded);
		digest
	}
}

impl std::fmt::Display for CertificatePin {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}
