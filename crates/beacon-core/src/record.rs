// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash records and their serialized forms.
//!
//! A record crosses three representations during its life: the in-memory
//! [`CrashRecord`], the pipe-delimited line that gets encrypted into a
//! staged file, and the [`CrashReportDto`] sent to the collection endpoint.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceInfo;
use crate::error::RecordParseError;

/// Number of pipe-delimited fields in a serialized record line.
const FIELD_COUNT: usize = 6;

/// A single captured crash or handled error.
///
/// The stack trace is sanitized before the record is constructed; a record
/// never holds unsanitized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashRecord {
	/// Capture instant, millisecond precision.
	pub captured_at: DateTime<Utc>,
	/// True when the record came from the panic hook.
	pub is_fatal: bool,
	/// OS/platform version string from the environment snapshot.
	pub platform_version: String,
	/// Device manufacturer from the environment snapshot.
	pub device_make: String,
	/// Device model from the environment snapshot.
	pub device_model: String,
	/// Sanitized free-text stack trace. May contain pipes and newlines.
	pub stack_trace: String,
}

impl CrashRecord {
	/// Builds a record from a sanitized stack trace and the process-wide
	/// device snapshot, stamped with the current time.
	pub fn new(stack_trace: String, is_fatal: bool, device: &DeviceInfo) -> Self {
		Self {
			captured_at: Utc::now(),
			is_fatal,
			platform_version: device.platform_version.clone(),
			device_make: device.make.clone(),
			device_model: device.model.clone(),
			stack_trace,
		}
	}

	/// Serializes the record to the staged line format.
	///
	/// Six pipe-delimited fields; the stack trace is the last field and is
	/// not escaped, so it may itself contain pipes.
	pub fn to_line(&self) -> String {
		format!(
			"{}|{}|{}|{}|{}|{}",
			self.captured_at.timestamp_millis(),
			self.is_fatal,
			self.platform_version,
			self.device_make,
			self.device_model,
			self.stack_trace
		)
	}

	/// Parses a staged line back into a record.
	///
	/// Splits at most six times so trailing pipes remain inside the stack
	/// trace field. Any malformed line yields an error; callers skip the
	/// offending file rather than aborting the pass.
	pub fn parse_line(line: &str) -> Result<Self, RecordParseError> {
		let parts: Vec<&str> = line.splitn(FIELD_COUNT, '|').collect();
		if parts.len() != FIELD_COUNT {
			return Err(RecordParseError::FieldCount(parts.len()));
		}

		let millis: i64 = parts[0]
			.parse()
			.map_err(|_| RecordParseError::Timestamp(parts[0].to_string()))?;
		let captured_at = Utc
			.timestamp_millis_opt(millis)
			.single()
			.ok_or_else(|| RecordParseError::Timestamp(parts[0].to_string()))?;
		let is_fatal: bool = parts[1]
			.parse()
			.map_err(|_| RecordParseError::FatalFlag(parts[1].to_string()))?;

		Ok(Self {
			captured_at,
			is_fatal,
			platform_version: parts[2].to_string(),
			device_make: parts[3].to_string(),
			device_model: parts[4].to_string(),
			stack_trace: parts[5].to_string(),
		})
	}

	/// Maps the record to the upload wire format.
	pub fn to_dto(&self) -> CrashReportDto {
		CrashReportDto {
			time_stamp: self
				.captured_at
				.to_rfc3339_opts(SecondsFormat::Millis, true),
			stack_trace: self.stack_trace.clone(),
			platform_version: self.platform_version.clone(),
			device_make: self.device_make.clone(),
			device_model: self.device_model.clone(),
			is_fatal: self.is_fatal,
		}
	}
}

/// Wire representation of a single record in the upload batch.
///
/// Field names are fixed by the collection endpoint contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashReportDto {
	#[serde(rename = "timeStamp")]
	pub time_stamp: String,
	#[serde(rename = "stackTrace")]
	pub stack_trace: String,
	#[serde(rename = "androidVersion")]
	pub platform_version: String,
	#[serde(rename = "deviceMake")]
	pub device_make: String,
	#[serde(rename = "deviceModel")]
	pub device_model: String,
	#[serde(rename = "isFatal")]
	pub is_fatal: bool,
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn sample_device() -> DeviceInfo {
		DeviceInfo {
			platform_version: "14".to_string(),
			make: "Acme".to_string(),
			model: "Widget 9".to_string(),
		}
	}

	#[test]
	fn line_roundtrip_preserves_fields() {
		let record = CrashRecord::new("at com.example.Main(Main.kt:10)".to_string(), true, &sample_device());
		let parsed = CrashRecord::parse_line(&record.to_line()).unwrap();

		assert_eq!(parsed.is_fatal, record.is_fatal);
		assert_eq!(parsed.platform_version, record.platform_version);
		assert_eq!(parsed.device_make, record.device_make);
		assert_eq!(parsed.device_model, record.device_model);
		assert_eq!(parsed.stack_trace, record.stack_trace);
		assert_eq!(
			parsed.captured_at.timestamp_millis(),
			record.captured_at.timestamp_millis()
		);
	}

	#[test]
	fn stack_trace_keeps_embedded_pipes() {
		let record = CrashRecord::new("left | middle | right".to_string(), false, &sample_device());
		let parsed = CrashRecord::parse_line(&record.to_line()).unwrap();
		assert_eq!(parsed.stack_trace, "left | middle | right");
	}

	#[test]
	fn parse_rejects_short_line() {
		let result = CrashRecord::parse_line("123|true|14");
		assert!(matches!(result, Err(RecordParseError::FieldCount(3))));
	}

	#[test]
	fn parse_rejects_bad_timestamp() {
		let result = CrashRecord::parse_line("abc|true|14|Acme|W|trace");
		assert!(matches!(result, Err(RecordParseError::Timestamp(_))));
	}

	#[test]
	fn parse_rejects_bad_fatal_flag() {
		let result = CrashRecord::parse_line("123|yes|14|Acme|W|trace");
		assert!(matches!(result, Err(RecordParseError::FatalFlag(_))));
	}

	#[test]
	fn dto_uses_wire_field_names() {
		let record = CrashRecord::new("trace".to_string(), true, &sample_device());
		let json = serde_json::to_value(record.to_dto()).unwrap();

		assert!(json.get("timeStamp").is_some());
		assert!(json.get("stackTrace").is_some());
		assert!(json.get("androidVersion").is_some());
		assert!(json.get("deviceMake").is_some());
		assert!(json.get("deviceModel").is_some());
		assert_eq!(json.get("isFatal").unwrap(), &serde_json::Value::Bool(true));
	}

	#[test]
	fn dto_timestamp_is_rfc3339_with_millis() {
		let mut record = CrashRecord::new("trace".to_string(), false, &sample_device());
		record.captured_at = Utc.timestamp_millis_opt(1_705_315_845_123).single().unwrap();
		let dto = record.to_dto();
		assert_eq!(dto.time_stamp, "2024-01-15T10:50:45.123Z");
	}

	proptest! {
		#[test]
		fn prop_line_roundtrip(
			millis in 0i64..4_102_444_800_000i64,
			is_fatal in any::<bool>(),
			trace in "[ -~]{0,200}",
		) {
			let record = CrashRecord {
				captured_at: Utc.timestamp_millis_opt(millis).single().unwrap(),
				is_fatal,
				platform_version: "14".to_string(),
				device_make: "Acme".to_string(),
				device_model: "Widget".to_string(),
				stack_trace: trace.clone(),
			};
			let parsed = CrashRecord::parse_line(&record.to_line()).unwrap();
			prop_assert_eq!(parsed.stack_trace, trace);
			prop_assert_eq!(parsed.captured_at.timestamp_millis(), millis);
			prop_assert_eq!(parsed.is_fatal, is_fatal);
		}
	}
}
