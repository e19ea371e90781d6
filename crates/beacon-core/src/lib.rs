// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Beacon crash telemetry pipeline.
//!
//! This crate provides the shared vocabulary used across the pipeline:
//! crash records and their on-disk line format, the upload wire format,
//! the device environment snapshot, and endpoint/transport-security
//! validation. It deliberately has no async runtime, storage, or HTTP
//! dependencies so that the capture path can stay synchronous.

pub mod device;
pub mod endpoint;
pub mod error;
pub mod record;

pub use device::DeviceInfo;
pub use endpoint::{host_of, is_local_dev_host, join_endpoint, validate_endpoint_base, CertificatePin};
pub use error::{ConfigError, RecordParseError};
pub use record::{CrashRecord, CrashReportDto};
