// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-side crash telemetry pipeline.
//!
//! Beacon captures fatal and non-fatal errors, sanitizes their stack
//! traces, encrypts them into a durable staging queue that survives
//! process death, ingests staged records into an encrypted local store,
//! and ships them in batches to an operator-controlled endpoint with
//! at-least-once delivery.
//!
//! # Overview
//!
//! ```ignore
//! let pipeline = Pipeline::builder()
//!     .data_dir("/data/beacon")
//!     .build()
//!     .await?;
//!
//! pipeline.install_panic_hook();
//!
//! pipeline
//!     .update_configuration(UploadConfig {
//!         endpoint_base: Some("https://crash.example.com".into()),
//!         endpoint_path: Some("/api/crashes".into()),
//!         redaction_rules: Some(RedactionRules::default()),
//!         ..UploadConfig::default()
//!     })
//!     .await?;
//!
//! if let Err(e) = risky() {
//!     pipeline.report_non_fatal(&e);
//! }
//! ```
//!
//! The pipeline is an explicitly constructed service object: the host
//! application owns it, there is no global registry, and every dependency
//! (key store, connectivity probe, upload transport) can be injected for
//! testing.

pub mod backtrace;
pub mod config;
pub mod error;
mod ingest;
mod panic_hook;
pub mod pipeline;
pub mod staging;
mod tls;
pub mod upload;

pub use config::{ConfigRegistry, UploadConfig};
pub use error::{CaptureError, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use staging::StagingQueue;
pub use upload::{HttpTransport, TransportError, UploadTransport};

pub use beacon_core::{CertificatePin, ConfigError, CrashRecord, CrashReportDto, DeviceInfo};
pub use beacon_jobs::{AlwaysConnected, ConnectivityProbe, TaskKind, TaskOutcome};
pub use beacon_redact::{RedactionRules, REDACTED};
pub use beacon_secrets::{FileKeyStore, KeyStore, KeyVault};
pub use beacon_store::ReportStore;
