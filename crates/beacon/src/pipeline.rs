// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The pipeline service object and its builder.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use beacon_core::{host_of, validate_endpoint_base, CertificatePin, ConfigError, CrashRecord, DeviceInfo};
use beacon_jobs::{AlwaysConnected, ConnectivityProbe, TaskKind, TaskScheduler};
use beacon_redact::sanitize;
use beacon_secrets::{KeyPurpose, KeyStore, KeyVault, RecordCodec};
use beacon_store::{create_pool, init_schema, ReportStore, SqliteReportStore};

use crate::backtrace::capture_backtrace_text;
use crate::config::{ConfigRegistry, UploadConfig};
use crate::error::{CaptureError, PipelineError};
use crate::ingest::IngestWorker;
use crate::panic_hook::install_panic_hook;
use crate::staging::StagingQueue;
use crate::upload::{HttpTransport, UploadTransport, UploadWorker};

/// Keyring service name used for key material entries.
const KEYRING_SERVICE: &str = "beacon";

/// Internal pipeline state shared with the panic hook.
pub(crate) struct PipelineInner {
	device: DeviceInfo,
	codec: RecordCodec,
	registry: Arc<ConfigRegistry>,
	staging: StagingQueue,
	store: Arc<dyn ReportStore>,
	scheduler: Arc<TaskScheduler>,
}

impl PipelineInner {
	/// Builds, sanitizes, encrypts, and durably stages one record.
	///
	/// Fully synchronous; this is the path the panic hook runs on a dying
	/// thread, so it must not suspend or depend on the scheduler.
	pub(crate) fn capture(&self, stack_trace: String, is_fatal: bool) -> Result<CrashRecord, CaptureError> {
		let config = self.registry.current();
		let sanitized = sanitize(&stack_trace, config.redaction_rules.as_ref()).into_owned();

		let record = CrashRecord::new(sanitized, is_fatal, &self.device);
		let blob = self.codec.encrypt(record.to_line().as_bytes())?;
		self.staging.write(&blob, record.captured_at)?;

		Ok(record)
	}
}

/// Builder for a [`Pipeline`].
pub struct PipelineBuilder {
	data_dir: Option<PathBuf>,
	device: Option<DeviceInfo>,
	key_store: Option<Box<dyn KeyStore>>,
	probe: Option<Arc<dyn ConnectivityProbe>>,
	transport: Option<Arc<dyn UploadTransport>>,
	initial_config: Option<UploadConfig>,
}

impl PipelineBuilder {
	/// Creates a builder with default settings.
	pub fn new() -> Self {
		Self {
			data_dir: None,
			device: None,
			key_store: None,
			probe: None,
			transport: None,
			initial_config: None,
		}
	}

	/// Sets the directory holding the staging queue, database, and key
	/// fallback files. Required.
	pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.data_dir = Some(dir.into());
		self
	}

	/// Overrides the detected device snapshot.
	pub fn device_info(mut self, device: DeviceInfo) -> Self {
		self.device = Some(device);
		self
	}

	/// Overrides the key material store (defaults to the OS keyring with
	/// a file fallback under the data directory).
	pub fn key_store(mut self, store: Box<dyn KeyStore>) -> Self {
		self.key_store = Some(store);
		self
	}

	/// Overrides the connectivity probe (defaults to always-connected).
	pub fn connectivity_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
		self.probe = Some(probe);
		self
	}

	/// Overrides the upload transport; test doubles go here.
	pub fn upload_transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Applies an initial configuration during build.
	pub fn configuration(mut self, config: UploadConfig) -> Self {
		self.initial_config = Some(config);
		self
	}

	/// Builds the pipeline and triggers an ingest pass to pick up staged
	/// files left behind by a previous fatal crash.
	pub async fn build(self) -> Result<Pipeline, PipelineError> {
		let data_dir = self.data_dir.ok_or(PipelineError::MissingDataDir)?;
		std::fs::create_dir_all(&data_dir)?;

		let vault = match self.key_store {
			Some(store) => KeyVault::new(store),
			None => KeyVault::with_os_keyring(KEYRING_SERVICE, data_dir.join("keys")),
		};
		let record_key = vault.get_or_create(KeyPurpose::RecordKey)?;
		let store_secret = vault.get_or_create(KeyPurpose::StoreSecret)?;

		let codec = RecordCodec::new(&record_key)?;
		// The store secret is longer than one AES key; fold it down so the
		// column codec key stays independent of the staged-file key.
		let store_key = Sha256::digest(store_secret.as_slice());
		let store_codec = RecordCodec::new(store_key.as_slice())?;

		let database_url = format!("sqlite:{}", data_dir.join("beacon.db").display());
		let pool = create_pool(&database_url).await?;
		init_schema(&pool).await?;
		let store: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::new(pool, store_codec));

		let staging = StagingQueue::new(data_dir.join("staging"));
		let registry = Arc::new(ConfigRegistry::new(UploadConfig::default()));
		let probe = self.probe.unwrap_or_else(|| Arc::new(AlwaysConnected));
		let scheduler = Arc::new(TaskScheduler::new(Handle::current(), probe));

		scheduler.register(Arc::new(IngestWorker::new(
			staging.clone(),
			codec.clone(),
			Arc::clone(&store),
			Arc::clone(&registry),
			Arc::downgrade(&scheduler),
		)));

		let transport = self
			.transport
			.unwrap_or_else(|| Arc::new(HttpTransport::new(Arc::clone(&registry))));
		scheduler.register(Arc::new(UploadWorker::new(
			Arc::clone(&store),
			Arc::clone(&registry),
			transport,
		)));

		let inner = Arc::new(PipelineInner {
			device: self.device.unwrap_or_default(),
			codec,
			registry,
			staging,
			store,
			scheduler,
		});
		let pipeline = Pipeline { inner };

		if let Some(config) = self.initial_config {
			pipeline.update_configuration(config).await?;
		}

		info!(data_dir = %data_dir.display(), "crash pipeline initialized");

		// Catch anything a previous process death left behind.
		pipeline.inner.scheduler.trigger(TaskKind::Ingest);

		Ok(pipeline)
	}
}

impl Default for PipelineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// The crash telemetry pipeline.
///
/// Cheap to clone; all clones share the same state. The host application
/// constructs one at its composition root and owns it for the process
/// lifetime.
#[derive(Clone)]
pub struct Pipeline {
	inner: Arc<PipelineInner>,
}

impl Pipeline {
	/// Creates a new builder.
	pub fn builder() -> PipelineBuilder {
		PipelineBuilder::new()
	}

	/// Reports a handled error as a non-fatal crash record.
	///
	/// Never fails and never panics back into the caller: any internal
	/// capture failure is logged and swallowed.
	pub fn report_non_fatal(&self, error: &dyn std::error::Error) {
		let stack = format!("{error}\n{}", capture_backtrace_text());
		self.report_stack(stack);
	}

	/// Reports a free-text message as a non-fatal crash record.
	pub fn report_message(&self, message: &str) {
		let stack = format!("{message}\n{}", capture_backtrace_text());
		self.report_stack(stack);
	}

	fn report_stack(&self, stack: String) {
		match self.inner.capture(stack, false) {
			Ok(_) => self.inner.scheduler.trigger(TaskKind::Ingest),
			Err(error) => {
				warn!(%error, "failed to capture non-fatal report");
			}
		}
	}

	/// Installs the fatal crash hook, chaining the previous panic hook.
	pub fn install_panic_hook(&self) {
		install_panic_hook(Arc::clone(&self.inner));
		info!("panic hook installed");
	}

	/// Replaces the active configuration.
	///
	/// Validates transport security, merges the supplied headers over the
	/// persisted set (new values win), persists the merged result, and
	/// swaps the configuration atomically. A missing endpoint base or
	/// path is only a warning; the pipeline keeps storing locally.
	pub async fn update_configuration(&self, mut config: UploadConfig) -> Result<(), ConfigError> {
		if let Some(base) = &config.endpoint_base {
			validate_endpoint_base(base)?;
		}

		match self.inner.store.load_headers().await {
			Ok(persisted) if !persisted.is_empty() => {
				let mut merged = persisted;
				merged.extend(config.headers.drain());
				config.headers = merged;
			}
			Ok(_) => {}
			Err(error) => {
				warn!(%error, "failed to load persisted headers, using supplied headers only");
			}
		}

		if !config.headers.is_empty() {
			if let Err(error) = self.inner.store.save_headers(&config.headers).await {
				warn!(%error, "failed to persist headers");
			}
		}

		if !config.is_upload_configured() && cfg!(debug_assertions) {
			warn!("endpoint base or path missing, upload disabled until configured");
		}

		self.inner.registry.swap(Arc::new(config));
		debug!("configuration updated");
		Ok(())
	}

	/// Adds a certificate pin for the currently configured endpoint host.
	///
	/// Requires a base URL; the pin is stored under that URL's host with
	/// the `sha256/` prefix normalized.
	pub fn add_certificate_pin(&self, pin: &str) -> Result<(), ConfigError> {
		let current = self.inner.registry.current();
		let base = current
			.endpoint_base
			.as_deref()
			.ok_or(ConfigError::MissingBaseUrl)?;
		let host = host_of(base)?;
		let pin = CertificatePin::parse(pin)?;

		let mut updated = (*current).clone();
		updated
			.certificate_pins
			.get_or_insert_with(HashMap::new)
			.entry(host)
			.or_default()
			.push(pin);
		self.inner.registry.swap(Arc::new(updated));
		Ok(())
	}

	/// Clears persisted headers (used on logout) and re-applies the
	/// remaining configuration without them, so any missing-field
	/// warnings surface again.
	pub async fn clear_persisted_headers(&self) -> Result<(), PipelineError> {
		self.inner.store.clear_headers().await?;

		let mut config = (*self.inner.registry.current()).clone();
		config.headers.clear();
		self.update_configuration(config).await?;
		Ok(())
	}

	/// The current configuration snapshot.
	pub fn current_configuration(&self) -> Arc<UploadConfig> {
		self.inner.registry.current()
	}

	/// Runs one ingest pass and one upload pass inline.
	///
	/// Deterministic alternative to waiting for the background workers;
	/// outcomes are logged, not returned, since both workers already
	/// signal retry through the scheduler on the normal path.
	pub async fn flush(&self) {
		for kind in [TaskKind::Ingest, TaskKind::Upload] {
			match self.inner.scheduler.run_now(kind).await {
				Ok(outcome) => debug!(%kind, ?outcome, "flush pass finished"),
				Err(error) => warn!(%kind, %error, "flush pass failed"),
			}
		}
	}

	/// Number of records currently in the durable store.
	pub async fn stored_record_count(&self) -> Result<u64, PipelineError> {
		Ok(self.inner.store.count().await?)
	}

	/// Aborts in-flight background work.
	pub async fn shutdown(&self) {
		self.inner.scheduler.shutdown().await;
		info!("crash pipeline shut down");
	}
}
