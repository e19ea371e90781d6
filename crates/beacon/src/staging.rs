// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The staging queue: a directory of encrypted files awaiting ingestion.
//!
//! Each file is one pending crash record, named from its capture
//! timestamp. Writes go through a temp file and an atomic rename so the
//! ingest worker can never observe a half-written record. The queue is
//! the write-ahead buffer that survives process death; everything here is
//! synchronous `std::fs` because the fatal capture path runs on a thread
//! that is about to die and must not suspend.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Extension of staged record files.
const STAGED_EXTENSION: &str = "crash";

/// Process-wide disambiguator for captures landing in the same
/// millisecond, possibly from different threads.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory-backed queue of staged records.
#[derive(Debug, Clone)]
pub struct StagingQueue {
	dir: PathBuf,
}

impl StagingQueue {
	/// Creates a queue over a directory; the directory is created lazily
	/// on first write.
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// The queue directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes an encrypted blob as a new staged file.
	///
	/// The filename is derived from the capture timestamp plus a
	/// process-wide sequence number, so concurrent captures in the same
	/// millisecond never overwrite each other. The content lands via a
	/// temp file and an atomic rename.
	pub fn write(&self, blob: &str, captured_at: DateTime<Utc>) -> io::Result<PathBuf> {
		std::fs::create_dir_all(&self.dir)?;

		let millis = captured_at.timestamp_millis();
		let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
		let mut path = self.path_for(millis, seq);
		// A leftover file from an earlier process can only collide if the
		// clock did not advance; step past it.
		while path.exists() {
			path = self.path_for(millis, WRITE_SEQ.fetch_add(1, Ordering::Relaxed));
		}

		let tmp = path.with_extension("tmp");
		std::fs::write(&tmp, blob)?;
		std::fs::rename(&tmp, &path)?;
		Ok(path)
	}

	/// Lists every staged file.
	///
	/// A missing directory is an empty queue, not an error; nothing has
	/// ever been staged there.
	pub fn list(&self) -> io::Result<Vec<PathBuf>> {
		let entries = match std::fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e),
		};

		let mut files: Vec<PathBuf> = entries
			.filter_map(|entry| entry.ok())
			.map(|entry| entry.path())
			.filter(|path| {
				path
					.extension()
					.map(|ext| ext == STAGED_EXTENSION)
					.unwrap_or(false)
			})
			.collect();
		files.sort();
		Ok(files)
	}

	/// Removes a staged file after successful ingestion.
	pub fn remove(&self, path: &Path) -> io::Result<()> {
		std::fs::remove_file(path)
	}

	fn path_for(&self, millis: i64, seq: u64) -> PathBuf {
		self.dir.join(format!("{millis}-{seq}.{STAGED_EXTENSION}"))
	}
}
