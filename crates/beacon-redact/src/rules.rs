// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redaction rule configuration.

use serde::{Deserialize, Serialize};

/// Which redaction categories are active, plus caller-supplied additions.
///
/// Every category is independently toggleable; the default enables all of
/// them. Absence of a whole `RedactionRules` value (an `Option::None` at the
/// configuration level) means no redaction at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionRules {
	/// Government identifiers: SSNs, labeled passport numbers.
	pub identifiers: bool,
	/// Contact info: emails, phone numbers.
	pub contact: bool,
	/// Financial data: card numbers, IBANs.
	pub financial: bool,
	/// Authentication material: PEM blocks, JWTs, bearer tokens, cloud keys.
	pub secrets: bool,
	/// Network identifiers: IPv4/IPv6 addresses, MAC addresses.
	pub network: bool,
	/// Location data: labeled city/state/address values, GPS coordinates.
	pub location: bool,
	/// Vehicle identifiers: VINs, labeled plate numbers.
	pub vehicle: bool,
	/// Healthcare identifiers: labeled MRN/patient/diagnosis values.
	pub healthcare: bool,
	/// Generic `key=value` secrets such as `password=...`.
	pub key_values: bool,
	/// Literal names to redact, case-insensitive, word-boundary matched.
	pub literal_names: Vec<String>,
	/// Additional caller-supplied regex patterns. Patterns that fail to
	/// compile are skipped.
	pub custom_patterns: Vec<String>,
}

impl Default for RedactionRules {
	fn default() -> Self {
		Self {
			identifiers: true,
			contact: true,
			financial: true,
			secrets: true,
			network: true,
			location: true,
			vehicle: true,
			healthcare: true,
			key_values: true,
			literal_names: Vec::new(),
			custom_patterns: Vec::new(),
		}
	}
}

impl RedactionRules {
	/// Rules with every category disabled; useful as a base for opting in.
	pub fn none() -> Self {
		Self {
			identifiers: false,
			contact: false,
			financial: false,
			secrets: false,
			network: false,
			location: false,
			vehicle: false,
			healthcare: false,
			key_values: false,
			literal_names: Vec::new(),
			custom_patterns: Vec::new(),
		}
	}
}
