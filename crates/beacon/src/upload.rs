// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The upload worker: durable store → collection endpoint.
//!
//! One batched POST per run covering every stored record. Only the rows
//! that were actually in the batch are deleted on success, so records
//! inserted while the request was in flight wait for the next run. Any
//! non-success status or transport error leaves the store untouched and
//! signals retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use beacon_core::{host_of, is_local_dev_host, join_endpoint, CrashReportDto};
use beacon_jobs::{NetworkConstraint, Task, TaskKind, TaskOutcome};
use beacon_store::ReportStore;

use crate::config::{ConfigRegistry, UploadConfig};
use crate::tls::pinned_tls_config;

/// Connect/read/write timeout for upload requests.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP status codes the endpoint uses to confirm receipt.
const ACCEPTED_STATUSES: [u16; 2] = [200, 201];

/// Transport-level upload failure.
#[derive(Debug, Error)]
pub enum TransportError {
	/// Connection, TLS, or request construction failure.
	#[error("transport failure: {0}")]
	Transport(String),
}

/// Seam between the upload worker and the HTTP stack.
///
/// Returns the response status; transport failures (DNS, TLS, pin
/// mismatch, timeout) are errors. Test doubles implement this to avoid
/// real sockets.
#[async_trait]
pub trait UploadTransport: Send + Sync {
	async fn post_batch(
		&self,
		url: &str,
		headers: &HashMap<String, String>,
		batch: &[CrashReportDto],
	) -> Result<u16, TransportError>;
}

/// Production transport over reqwest with TLS restriction and optional
/// certificate pinning.
pub struct HttpTransport {
	registry: Arc<ConfigRegistry>,
}

impl HttpTransport {
	pub fn new(registry: Arc<ConfigRegistry>) -> Self {
		Self { registry }
	}

	/// Builds a client for the target host under the current config.
	///
	/// Local development hosts skip both the TLS floor and pinning; for
	/// everything else TLS 1.2+ is enforced and configured pins are wired
	/// into the connection as a custom verifier.
	fn build_client(config: &UploadConfig, host: &str) -> Result<reqwest::Client, TransportError> {
		let mut builder = reqwest::Client::builder()
			.user_agent(format!("beacon/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(UPLOAD_TIMEOUT)
			.timeout(UPLOAD_TIMEOUT);

		if !is_local_dev_host(host) {
			match config.pins_for(host) {
				Some(pins) if !pins.is_empty() => {
					builder = builder.use_preconfigured_tls(pinned_tls_config(pins)?);
				}
				_ => {
					builder = builder
						.min_tls_version(reqwest::tls::Version::TLS_1_2)
						.https_only(true);
				}
			}
		}

		builder
			.build()
			.map_err(|e| TransportError::Transport(e.to_string()))
	}

	fn build_headers(headers: &HashMap<String, String>) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in headers {
			let parsed_name = match HeaderName::try_from(name.as_str()) {
				Ok(parsed) => parsed,
				Err(_) => {
					warn!(header = name.as_str(), "skipping invalid header name");
					continue;
				}
			};
			match HeaderValue::from_str(value) {
				Ok(parsed_value) => {
					map.insert(parsed_name, parsed_value);
				}
				Err(_) => {
					warn!(header = name.as_str(), "skipping invalid header value");
				}
			}
		}
		map
	}
}

#[async_trait]
impl UploadTransport for HttpTransport {
	async fn post_batch(
		&self,
		url: &str,
		headers: &HashMap<String, String>,
		batch: &[CrashReportDto],
	) -> Result<u16, TransportError> {
		let config = self.registry.current();
		let host = host_of(url).map_err(|e| TransportError::Transport(e.to_string()))?;
		let client = Self::build_client(&config, &host)?;

		let response = client
			.post(url)
			.headers(Self::build_headers(headers))
			.json(batch)
			.send()
			.await
			.map_err(|e| TransportError::Transport(e.to_string()))?;

		Ok(response.status().as_u16())
	}
}

/// Background task shipping stored records to the endpoint.
pub struct UploadWorker {
	store: Arc<dyn ReportStore>,
	registry: Arc<ConfigRegistry>,
	transport: Arc<dyn UploadTransport>,
	// One batch in flight at a time; a second pass would retransmit the
	// same rows before the first one's delete lands.
	pass_lock: tokio::sync::Mutex<()>,
}

impl UploadWorker {
	pub fn new(
		store: Arc<dyn ReportStore>,
		registry: Arc<ConfigRegistry>,
		transport: Arc<dyn UploadTransport>,
	) -> Self {
		Self {
			store,
			registry,
			transport,
			pass_lock: tokio::sync::Mutex::new(()),
		}
	}
}

#[async_trait]
impl Task for UploadWorker {
	fn kind(&self) -> TaskKind {
		TaskKind::Upload
	}

	fn constraint(&self) -> NetworkConstraint {
		NetworkConstraint::Connected
	}

	async fn run(&self) -> beacon_jobs::Result<TaskOutcome> {
		let _pass = self.pass_lock.lock().await;

		let config = self.registry.current();
		let (Some(base), Some(path)) = (&config.endpoint_base, &config.endpoint_path) else {
			// Success, not retry: a permanently unconfigured endpoint must
			// not hot-loop the scheduler. Records stay stored locally.
			if cfg!(debug_assertions) {
				warn!("upload endpoint not configured, records remain stored locally");
			}
			return Ok(TaskOutcome::Success);
		};

		let reports = match self.store.list_all().await {
			Ok(reports) => reports,
			Err(error) => {
				warn!(%error, "failed to read stored records");
				return Ok(TaskOutcome::Retry);
			}
		};
		if reports.is_empty() {
			return Ok(TaskOutcome::Success);
		}

		let url = join_endpoint(base, path);
		let ids: Vec<i64> = reports.iter().map(|r| r.id).collect();
		let batch: Vec<CrashReportDto> = reports.iter().map(|r| r.record.to_dto()).collect();

		match self.transport.post_batch(&url, &config.headers, &batch).await {
			Ok(status) if ACCEPTED_STATUSES.contains(&status) => {
				match self.store.delete_by_ids(&ids).await {
					Ok(deleted) => debug!(uploaded = batch.len(), deleted, "batch delivered"),
					Err(error) => {
						// Delivered but not deleted: the rows retransmit next
						// run, which the endpoint must tolerate anyway.
						warn!(%error, "failed to delete uploaded records");
					}
				}
				Ok(TaskOutcome::Success)
			}
			Ok(status) => {
				warn!(status, count = batch.len(), "collection endpoint rejected batch");
				Ok(TaskOutcome::Retry)
			}
			Err(error) => {
				warn!(%error, count = batch.len(), "upload transport failure");
				Ok(TaskOutcome::Retry)
			}
		}
	}
}
