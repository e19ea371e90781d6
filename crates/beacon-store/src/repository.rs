// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for crash record and header persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use tracing::{instrument, warn};

use beacon_core::CrashRecord;
use beacon_secrets::RecordCodec;

use crate::error::{Result, StoreError};

/// A crash record with its durable identity.
#[derive(Debug, Clone)]
pub struct StoredReport {
	/// Auto-increment row id, assigned at insert.
	pub id: i64,
	/// The decrypted record.
	pub record: CrashRecord,
}

/// Repository trait for the durable store.
#[async_trait]
pub trait ReportStore: Send + Sync {
	/// Inserts a record, returning its new row id.
	async fn insert(&self, record: &CrashRecord) -> Result<i64>;
	/// Returns every stored report, oldest first.
	async fn list_all(&self) -> Result<Vec<StoredReport>>;
	/// Deletes the given row ids, returning how many rows went away.
	async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64>;
	/// Deletes rows captured before the cutoff, returning the count.
	async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
	/// Number of stored reports.
	async fn count(&self) -> Result<u64>;

	/// Replaces the persisted header set.
	async fn save_headers(&self, headers: &HashMap<String, String>) -> Result<()>;
	/// Loads the persisted header set; empty when never saved.
	async fn load_headers(&self) -> Result<HashMap<String, String>>;
	/// Removes the persisted header set.
	async fn clear_headers(&self) -> Result<()>;
}

/// SQLite implementation with the stack trace column encrypted at rest.
#[derive(Clone)]
pub struct SqliteReportStore {
	pool: SqlitePool,
	codec: RecordCodec,
}

impl SqliteReportStore {
	/// Creates a store over an initialized pool.
	///
	/// The codec should be built from store-purpose key material, distinct
	/// from the staged-file key.
	pub fn new(pool: SqlitePool, codec: RecordCodec) -> Self {
		Self { pool, codec }
	}

	fn decrypt_text(&self, encrypted: &str) -> Result<String> {
		let plaintext = self.codec.decrypt(encrypted)?;
		String::from_utf8(plaintext.to_vec())
			.map_err(|_| StoreError::Corrupt("stored text is not UTF-8".to_string()))
	}
}

#[async_trait]
impl ReportStore for SqliteReportStore {
	#[instrument(skip(self, record), fields(is_fatal = record.is_fatal))]
	async fn insert(&self, record: &CrashRecord) -> Result<i64> {
		let encrypted_trace = self.codec.encrypt(record.stack_trace.as_bytes())?;

		let result = sqlx::query(
			r#"
			INSERT INTO crash_reports (captured_at, is_fatal, platform_version, device_make, device_model, stack_trace)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(record.captured_at.timestamp_millis())
		.bind(record.is_fatal)
		.bind(&record.platform_version)
		.bind(&record.device_make)
		.bind(&record.device_model)
		.bind(&encrypted_trace)
		.execute(&self.pool)
		.await?;

		Ok(result.last_insert_rowid())
	}

	#[instrument(skip(self))]
	async fn list_all(&self) -> Result<Vec<StoredReport>> {
		let rows = sqlx::query_as::<_, (i64, i64, bool, String, String, String, String)>(
			r#"
			SELECT id, captured_at, is_fatal, platform_version, device_make, device_model, stack_trace
			FROM crash_reports
			ORDER BY id ASC
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		let mut reports = Vec::with_capacity(rows.len());
		for (id, captured_at, is_fatal, platform_version, device_make, device_model, encrypted) in rows
		{
			let stack_trace = match self.decrypt_text(&encrypted) {
				Ok(text) => text,
				Err(error) => {
					// A row we can no longer read is left for retention
					// cleanup rather than blocking the rest of the batch.
					warn!(row_id = id, %error, "skipping undecryptable stored report");
					continue;
				}
			};
			let captured_at = Utc
				.timestamp_millis_opt(captured_at)
				.single()
				.ok_or_else(|| StoreError::Corrupt(format!("row {id} timestamp out of range")))?;

			reports.push(StoredReport {
				id,
				record: CrashRecord {
					captured_at,
					is_fatal,
					platform_version,
					device_make,
					device_model,
					stack_trace,
				},
			});
		}

		Ok(reports)
	}

	#[instrument(skip(self), fields(count = ids.len()))]
	async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64> {
		if ids.is_empty() {
			return Ok(0);
		}

		let placeholders = vec!["?"; ids.len()].join(", ");
		let sql = format!("DELETE FROM crash_reports WHERE id IN ({placeholders})");

		let mut query = sqlx::query(&sql);
		for id in ids {
			query = query.bind(id);
		}

		let result = query.execute(&self.pool).await?;
		Ok(result.rows_affected())
	}

	#[instrument(skip(self))]
	async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM crash_reports WHERE captured_at < ?")
			.bind(cutoff.timestamp_millis())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}

	#[instrument(skip(self))]
	async fn count(&self) -> Result<u64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM crash_reports")
			.fetch_one(&self.pool)
			.await?;
		Ok(count as u64)
	}

	#[instrument(skip(self, headers), fields(count = headers.len()))]
	async fn save_headers(&self, headers: &HashMap<String, String>) -> Result<()> {
		let json = serde_json::to_string(headers)
			.map_err(|e| StoreError::Corrupt(format!("header serialization: {e}")))?;
		let payload = self.codec.encrypt(json.as_bytes())?;

		sqlx::query(
			r#"
			INSERT INTO persisted_headers (id, payload) VALUES (1, ?)
			ON CONFLICT(id) DO UPDATE SET payload = excluded.payload
			"#,
		)
		.bind(&payload)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self))]
	async fn load_headers(&self) -> Result<HashMap<String, String>> {
		let row: Option<(String,)> =
			sqlx::query_as("SELECT payload FROM persisted_headers WHERE id = 1")
				.fetch_optional(&self.pool)
				.await?;

		let Some((payload,)) = row else {
			return Ok(HashMap::new());
		};

		let json = self.decrypt_text(&payload)?;
		serde_json::from_str(&json)
			.map_err(|e| StoreError::Corrupt(format!("header deserialization: {e}")))
	}

	#[instrument(skip(self))]
	async fn clear_headers(&self) -> Result<()> {
		sqlx::query("DELETE FROM persisted_headers WHERE id = 1")
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::{create_pool, init_schema};
	use beacon_core::DeviceInfo;
	use chrono::Duration;

	async fn setup_store(dir: &tempfile::TempDir) -> SqliteReportStore {
		let url = format!("sqlite:{}", dir.path().join("beacon.db").display());
		let pool = create_pool(&url).await.unwrap();
		init_schema(&pool).await.unwrap();
		SqliteReportStore::new(pool, RecordCodec::new(&[3u8; 32]).unwrap())
	}

	fn sample_record(stack: &str) -> CrashRecord {
		CrashRecord::new(
			stack.to_string(),
			false,
			&DeviceInfo {
				platform_version: "14".to_string(),
				make: "Acme".to_string(),
				model: "W9".to_string(),
			},
		)
	}

	#[tokio::test]
	async fn insert_and_list_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;

		let id = store.insert(&sample_record("trace one")).await.unwrap();
		assert!(id > 0);

		let reports = store.list_all().await.unwrap();
		assert_eq!(reports.len(), 1);
		assert_eq!(reports[0].id, id);
		assert_eq!(reports[0].record.stack_trace, "trace one");
		assert_eq!(reports[0].record.device_make, "Acme");
	}

	#[tokio::test]
	async fn stack_trace_is_not_stored_in_plaintext() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;
		store.insert(&sample_record("very secret trace")).await.unwrap();

		let (raw,): (String,) = sqlx::query_as("SELECT stack_trace FROM crash_reports")
			.fetch_one(&store.pool)
			.await
			.unwrap();
		assert!(!raw.contains("very secret trace"));
	}

	#[tokio::test]
	async fn delete_by_ids_removes_only_named_rows() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;

		let a = store.insert(&sample_record("a")).await.unwrap();
		let _b = store.insert(&sample_record("b")).await.unwrap();

		let deleted = store.delete_by_ids(&[a]).await.unwrap();
		assert_eq!(deleted, 1);

		let remaining = store.list_all().await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].record.stack_trace, "b");
	}

	#[tokio::test]
	async fn delete_by_ids_with_empty_slice_is_noop() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;
		store.insert(&sample_record("a")).await.unwrap();

		assert_eq!(store.delete_by_ids(&[]).await.unwrap(), 0);
		assert_eq!(store.count().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn delete_older_than_respects_boundary() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;

		let mut old = sample_record("old");
		old.captured_at = Utc::now() - Duration::days(91);
		let mut young = sample_record("young");
		young.captured_at = Utc::now() - Duration::days(89);

		store.insert(&old).await.unwrap();
		store.insert(&young).await.unwrap();

		let cutoff = Utc::now() - Duration::days(90);
		let deleted = store.delete_older_than(cutoff).await.unwrap();
		assert_eq!(deleted, 1);

		let remaining = store.list_all().await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].record.stack_trace, "young");
	}

	#[tokio::test]
	async fn undecryptable_row_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;
		store.insert(&sample_record("good")).await.unwrap();

		sqlx::query(
			r#"
			INSERT INTO crash_reports (captured_at, is_fatal, platform_version, device_make, device_model, stack_trace)
			VALUES (?, 0, '14', 'Acme', 'W9', 'not an envelope')
			"#,
		)
		.bind(Utc::now().timestamp_millis())
		.execute(&store.pool)
		.await
		.unwrap();

		let reports = store.list_all().await.unwrap();
		assert_eq!(reports.len(), 1);
		assert_eq!(reports[0].record.stack_trace, "good");
	}

	#[tokio::test]
	async fn headers_roundtrip_and_clear() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;

		assert!(store.load_headers().await.unwrap().is_empty());

		let mut headers = HashMap::new();
		headers.insert("Authorization".to_string(), "Bearer tok".to_string());
		headers.insert("X-Tenant".to_string(), "acme".to_string());
		store.save_headers(&headers).await.unwrap();

		let loaded = store.load_headers().await.unwrap();
		assert_eq!(loaded, headers);

		let mut updated = headers.clone();
		updated.insert("X-Tenant".to_string(), "globex".to_string());
		store.save_headers(&updated).await.unwrap();
		assert_eq!(
			store.load_headers().await.unwrap().get("X-Tenant").unwrap(),
			"globex"
		);

		store.clear_headers().await.unwrap();
		assert!(store.load_headers().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn headers_are_encrypted_at_rest() {
		let dir = tempfile::tempdir().unwrap();
		let store = setup_store(&dir).await;

		let mut headers = HashMap::new();
		headers.insert("Authorization".to_string(), "Bearer sensitive".to_string());
		store.save_headers(&headers).await.unwrap();

		let (raw,): (String,) = sqlx::query_as("SELECT payload FROM persisted_headers")
			.fetch_one(&store.pool)
			.await
			.unwrap();
		assert!(!raw.contains("sensitive"));
	}
}
