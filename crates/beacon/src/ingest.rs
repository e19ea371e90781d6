// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ingest worker: staging directory → durable store.
//!
//! Each staged file moves through decrypt → parse → insert → delete
//! independently; one bad file never aborts the pass. A file whose
//! content is unreadable stays on disk and is skipped again next pass. A
//! storage failure aborts the pass with a retry signal since the store is
//! expected to come back.
//!
//! The worker needs no network and is idempotent: files are deleted only
//! after a successful insert, so a crash between the two re-ingests that
//! file later. The resulting duplicate row is the accepted at-least-once
//! cost.

use std::path::Path;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use beacon_core::CrashRecord;
use beacon_jobs::{Task, TaskKind, TaskOutcome, TaskScheduler};
use beacon_secrets::RecordCodec;
use beacon_store::ReportStore;

use crate::config::ConfigRegistry;
use crate::staging::StagingQueue;

/// Per-file ingestion failure.
enum IngestFileError {
	/// The file content is unreadable or not a valid record; the file is
	/// skipped and left on disk.
	Corrupt(String),
	/// The durable store rejected the insert; the whole pass retries.
	Store(beacon_store::StoreError),
}

/// Background task draining the staging queue.
pub struct IngestWorker {
	staging: StagingQueue,
	codec: RecordCodec,
	store: Arc<dyn ReportStore>,
	registry: Arc<ConfigRegistry>,
	scheduler: Weak<TaskScheduler>,
	// Serializes passes so a triggered run and an inline run never process
	// the same staged file concurrently.
	pass_lock: tokio::sync::Mutex<()>,
}

impl IngestWorker {
	pub fn new(
		staging: StagingQueue,
		codec: RecordCodec,
		store: Arc<dyn ReportStore>,
		registry: Arc<ConfigRegistry>,
		scheduler: Weak<TaskScheduler>,
	) -> Self {
		Self {
			staging,
			codec,
			store,
			registry,
			scheduler,
			pass_lock: tokio::sync::Mutex::new(()),
		}
	}

	async fn ingest_file(&self, path: &Path) -> Result<(), IngestFileError> {
		let blob = std::fs::read_to_string(path)
			.map_err(|e| IngestFileError::Corrupt(format!("unreadable: {e}")))?;
		let plaintext = self
			.codec
			.decrypt(&blob)
			.map_err(|e| IngestFileError::Corrupt(e.to_string()))?;
		let line = std::str::from_utf8(&plaintext)
			.map_err(|_| IngestFileError::Corrupt("payload is not UTF-8".to_string()))?;
		let record =
			CrashRecord::parse_line(line).map_err(|e| IngestFileError::Corrupt(e.to_string()))?;

		self
			.store
			.insert(&record)
			.await
			.map_err(IngestFileError::Store)?;

		// The record now lives in the store; losing the delete only means
		// a duplicate row after the next pass, never a lost record.
		if let Err(error) = self.staging.remove(path) {
			warn!(path = %path.display(), %error, "failed to delete ingested staged file");
		}

		Ok(())
	}

	async fn run_retention_cleanup(&self) {
		let retention_days = self.registry.current().retention_days;
		if retention_days <= 0 {
			return;
		}

		let cutoff = Utc::now() - Duration::days(retention_days);
		match self.store.delete_older_than(cutoff).await {
			Ok(0) => {}
			Ok(deleted) => debug!(deleted, retention_days, "retention cleanup removed expired records"),
			Err(error) => warn!(%error, "retention cleanup failed"),
		}
	}
}

#[async_trait]
impl Task for IngestWorker {
	fn kind(&self) -> TaskKind {
		TaskKind::Ingest
	}

	async fn run(&self) -> beacon_jobs::Result<TaskOutcome> {
		let _pass = self.pass_lock.lock().await;

		let files = match self.staging.list() {
			Ok(files) => files,
			Err(error) => {
				warn!(%error, "failed to scan staging directory");
				return Ok(TaskOutcome::Retry);
			}
		};

		let mut inserted = 0usize;
		for path in &files {
			match self.ingest_file(path).await {
				Ok(()) => inserted += 1,
				Err(IngestFileError::Corrupt(reason)) => {
					warn!(path = %path.display(), %reason, "skipping staged file");
				}
				Err(IngestFileError::Store(error)) => {
					warn!(path = %path.display(), %error, "storage failure during ingestion");
					return Ok(TaskOutcome::Retry);
				}
			}
		}

		self.run_retention_cleanup().await;

		if inserted > 0 {
			debug!(inserted, "staged records ingested");
			if let Some(scheduler) = self.scheduler.upgrade() {
				scheduler.trigger(TaskKind::Upload);
			}
		}

		Ok(TaskOutcome::Success)
	}
}
