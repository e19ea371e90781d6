// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide upload configuration.
//!
//! The configuration is replaced wholesale on every update and read
//! through an atomic `Arc` swap, so concurrent readers always observe a
//! complete old or new value, never a partially updated mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use beacon_core::CertificatePin;
use beacon_redact::RedactionRules;

/// Days a record may sit in the durable store before age-based deletion.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Upload and sanitization configuration.
///
/// `endpoint_base` and `endpoint_path` must both be set for upload to
/// activate; until then the pipeline stores records locally and the
/// upload worker reports success without action. A `retention_days` of
/// zero or less disables age-based deletion.
#[derive(Debug, Clone)]
pub struct UploadConfig {
	/// Scheme + host (+ optional port) of the collection endpoint.
	pub endpoint_base: Option<String>,
	/// Path under the base, e.g. `/api/crashes`.
	pub endpoint_path: Option<String>,
	/// Request headers; merged over persisted headers on update.
	pub headers: HashMap<String, String>,
	/// Redaction rules; `None` disables redaction entirely.
	pub redaction_rules: Option<RedactionRules>,
	/// Age limit for stored records in days.
	pub retention_days: i64,
	/// Certificate pins keyed by hostname; `None` disables pinning.
	pub certificate_pins: Option<HashMap<String, Vec<CertificatePin>>>,
}

impl Default for UploadConfig {
	fn default() -> Self {
		Self {
			endpoint_base: None,
			endpoint_path: None,
			headers: HashMap::new(),
			redaction_rules: None,
			retention_days: DEFAULT_RETENTION_DAYS,
			certificate_pins: None,
		}
	}
}

impl UploadConfig {
	/// True when both endpoint parts are configured.
	pub fn is_upload_configured(&self) -> bool {
		self.endpoint_base.is_some() && self.endpoint_path.is_some()
	}

	/// Pins configured for a host, if any.
	pub fn pins_for(&self, host: &str) -> Option<&[CertificatePin]> {
		self
			.certificate_pins
			.as_ref()
			.and_then(|pins| pins.get(host))
			.map(|pins| pins.as_slice())
	}
}

/// Holder of the current configuration.
///
/// Readers take a cheap `Arc` clone; writers swap the whole value. Lock
/// poisoning is recovered rather than propagated because the capture
/// path reads configuration inside the panic hook.
pub struct ConfigRegistry {
	current: RwLock<Arc<UploadConfig>>,
}

impl ConfigRegistry {
	/// Creates a registry with an initial configuration.
	pub fn new(initial: UploadConfig) -> Self {
		Self {
			current: RwLock::new(Arc::new(initial)),
		}
	}

	/// Returns the current configuration snapshot.
	pub fn current(&self) -> Arc<UploadConfig> {
		let guard = self
			.current
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		Arc::clone(&guard)
	}

	/// Replaces the configuration wholesale.
	pub fn swap(&self, config: Arc<UploadConfig>) {
		let mut guard = self
			.current
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		*guard = config;
	}
}
