// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable encrypted crash record store.
//!
//! The system of record between ingestion and successful upload. Records
//! live in a SQLite table with the stack trace column encrypted at rest;
//! persisted request headers share the database, stored as one encrypted
//! blob. Inserts and deletes are atomic per call, which is all the
//! pipeline's at-least-once semantics require.

pub mod error;
pub mod pool;
pub mod repository;

pub use error::{Result, StoreError};
pub use pool::{create_pool, init_schema};
pub use repository::{ReportStore, SqliteReportStore, StoredReport};
