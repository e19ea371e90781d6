// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, TaskError};
use crate::task::{ConnectivityProbe, NetworkConstraint, Task, TaskKind, TaskOutcome};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;
const MAX_CONSTRAINT_DEFERRALS: u32 = 10;

/// Dispatches background tasks with replace-on-trigger semantics.
///
/// Each [`TaskKind`] owns at most one in-flight run. Triggering a kind
/// whose run is still in flight aborts that run and starts a fresh one,
/// so bursts of triggers coalesce instead of piling up. Tasks tolerate
/// this because every worker is idempotent over its backing state.
pub struct TaskScheduler {
	runtime: Handle,
	probe: Arc<dyn ConnectivityProbe>,
	registry: RwLock<HashMap<TaskKind, Arc<dyn Task>>>,
	slots: Mutex<HashMap<TaskKind, JoinHandle<()>>>,
}

impl TaskScheduler {
	/// Creates a scheduler that spawns onto the given runtime handle.
	pub fn new(runtime: Handle, probe: Arc<dyn ConnectivityProbe>) -> Self {
		Self {
			runtime,
			probe,
			registry: RwLock::new(HashMap::new()),
			slots: Mutex::new(HashMap::new()),
		}
	}

	/// Registers a task under its own kind, replacing any previous
	/// registration.
	pub fn register(&self, task: Arc<dyn Task>) {
		let kind = task.kind();
		self
			.registry
			.write()
			.expect("registry lock poisoned")
			.insert(kind, task);
	}

	/// Triggers a task, replacing any in-flight run of the same kind.
	///
	/// Safe to call from synchronous code; the run itself happens on the
	/// scheduler's runtime.
	pub fn trigger(&self, kind: TaskKind) {
		let task = {
			let registry = self.registry.read().expect("registry lock poisoned");
			match registry.get(&kind) {
				Some(task) => Arc::clone(task),
				None => {
					warn!(%kind, "trigger for unregistered task kind ignored");
					return;
				}
			}
		};

		let probe = Arc::clone(&self.probe);
		let mut slots = self.slots.lock().expect("slots lock poisoned");
		if let Some(existing) = slots.get(&kind) {
			if !existing.is_finished() {
				debug!(%kind, "replacing in-flight run");
				existing.abort();
			}
		}

		let handle = self.runtime.spawn(run_with_retry(task, probe));
		slots.insert(kind, handle);
	}

	/// Runs a task once, inline, without retry.
	///
	/// A task with an unmet connectivity constraint reports
	/// [`TaskOutcome::Retry`] without running.
	pub async fn run_now(&self, kind: TaskKind) -> Result<TaskOutcome> {
		let task = {
			let registry = self.registry.read().expect("registry lock poisoned");
			registry
				.get(&kind)
				.cloned()
				.ok_or(TaskError::NotRegistered(kind.as_str()))?
		};

		if task.constraint() == NetworkConstraint::Connected && !self.probe.is_connected() {
			debug!(%kind, "deferring run, no connectivity");
			return Ok(TaskOutcome::Retry);
		}

		task.run().await
	}

	/// Aborts every in-flight run and waits for the aborts to land.
	pub async fn shutdown(&self) {
		let handles: Vec<(TaskKind, JoinHandle<()>)> = {
			let mut slots = self.slots.lock().expect("slots lock poisoned");
			slots.drain().collect()
		};

		for (kind, handle) in handles {
			handle.abort();
			if handle.await.is_err() {
				debug!(%kind, "run aborted during shutdown");
			}
		}
	}
}

async fn run_with_retry(task: Arc<dyn Task>, probe: Arc<dyn ConnectivityProbe>) {
	let kind = task.kind();
	let run_id = uuid::Uuid::new_v4();
	let mut retries = 0u32;
	let mut deferrals = 0u32;

	loop {
		if task.constraint() == NetworkConstraint::Connected && !probe.is_connected() {
			deferrals += 1;
			if deferrals > MAX_CONSTRAINT_DEFERRALS {
				warn!(%kind, %run_id, "still offline, giving up until next trigger");
				return;
			}
			tokio::time::sleep(Duration::from_secs(calculate_backoff_delay(deferrals))).await;
			continue;
		}

		match task.run().await {
			Ok(TaskOutcome::Success) => {
				debug!(%kind, %run_id, "task completed");
				return;
			}
			Ok(TaskOutcome::Retry) => {
				retries += 1;
				if retries > MAX_RETRIES {
					warn!(%kind, %run_id, retries, "retries exhausted, giving up until next trigger");
					return;
				}
				let delay_secs = calculate_backoff_delay(retries);
				debug!(%kind, %run_id, retries, delay_secs, "task signalled retry");
				tokio::time::sleep(Duration::from_secs(delay_secs)).await;
			}
			Err(error) => {
				warn!(%kind, %run_id, %error, "task failed");
				return;
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	struct CountingTask {
		kind: TaskKind,
		constraint: NetworkConstraint,
		runs: AtomicUsize,
		outcome: fn(usize) -> Result<TaskOutcome>,
	}

	impl CountingTask {
		fn new(kind: TaskKind, outcome: fn(usize) -> Result<TaskOutcome>) -> Self {
			Self {
				kind,
				constraint: NetworkConstraint::None,
				runs: AtomicUsize::new(0),
				outcome,
			}
		}

		fn run_count(&self) -> usize {
			self.runs.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl Task for CountingTask {
		fn kind(&self) -> TaskKind {
			self.kind
		}

		fn constraint(&self) -> NetworkConstraint {
			self.constraint
		}

		async fn run(&self) -> Result<TaskOutcome> {
			let run = self.runs.fetch_add(1, Ordering::SeqCst);
			(self.outcome)(run)
		}
	}

	struct TogglingProbe {
		connected: AtomicBool,
	}

	impl ConnectivityProbe for TogglingProbe {
		fn is_connected(&self) -> bool {
			self.connected.load(Ordering::SeqCst)
		}
	}

	#[test]
	fn backoff_delay_grows_and_caps() {
		assert_eq!(calculate_backoff_delay(1), 1);
		assert_eq!(calculate_backoff_delay(2), 2);
		assert_eq!(calculate_backoff_delay(3), 4);
		assert_eq!(calculate_backoff_delay(100), MAX_RETRY_DELAY_SECS);
	}

	#[tokio::test]
	async fn run_now_executes_registered_task() {
		let scheduler = TaskScheduler::new(Handle::current(), Arc::new(crate::AlwaysConnected));
		let task = Arc::new(CountingTask::new(TaskKind::Ingest, |_| Ok(TaskOutcome::Success)));
		scheduler.register(task.clone());

		let outcome = scheduler.run_now(TaskKind::Ingest).await.unwrap();
		assert_eq!(outcome, TaskOutcome::Success);
		assert_eq!(task.run_count(), 1);
	}

	#[tokio::test]
	async fn run_now_without_registration_errors() {
		let scheduler = TaskScheduler::new(Handle::current(), Arc::new(crate::AlwaysConnected));
		let result = scheduler.run_now(TaskKind::Upload).await;
		assert!(matches!(result, Err(TaskError::NotRegistered("upload"))));
	}

	#[tokio::test]
	async fn run_now_defers_without_connectivity() {
		let probe = Arc::new(TogglingProbe {
			connected: AtomicBool::new(false),
		});
		let scheduler = TaskScheduler::new(Handle::current(), probe);

		let task = Arc::new(CountingTask {
			kind: TaskKind::Upload,
			constraint: NetworkConstraint::Connected,
			runs: AtomicUsize::new(0),
			outcome: |_| Ok(TaskOutcome::Success),
		});
		scheduler.register(task.clone());

		let outcome = scheduler.run_now(TaskKind::Upload).await.unwrap();
		assert_eq!(outcome, TaskOutcome::Retry);
		assert_eq!(task.run_count(), 0);
	}

	#[tokio::test]
	async fn double_trigger_coalesces_to_one_run() {
		let scheduler = TaskScheduler::new(Handle::current(), Arc::new(crate::AlwaysConnected));
		let task = Arc::new(CountingTask::new(TaskKind::Ingest, |_| Ok(TaskOutcome::Success)));
		scheduler.register(task.clone());

		// Neither spawned future is polled until the first await below, so
		// the second trigger replaces the first before it ever starts.
		scheduler.trigger(TaskKind::Ingest);
		scheduler.trigger(TaskKind::Ingest);

		tokio::time::sleep(Duration::from_millis(50)).await;
		assert_eq!(task.run_count(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn retry_outcome_is_retried_then_abandoned() {
		let scheduler = TaskScheduler::new(Handle::current(), Arc::new(crate::AlwaysConnected));
		let task = Arc::new(CountingTask::new(TaskKind::Upload, |_| Ok(TaskOutcome::Retry)));
		scheduler.register(task.clone());

		scheduler.trigger(TaskKind::Upload);

		for _ in 0..50 {
			tokio::time::sleep(Duration::from_secs(2)).await;
			if task.run_count() >= (MAX_RETRIES + 1) as usize {
				break;
			}
		}

		// Initial run plus MAX_RETRIES re-runs, then the scheduler gives up.
		assert_eq!(task.run_count(), (MAX_RETRIES + 1) as usize);
		tokio::time::sleep(Duration::from_secs(120)).await;
		assert_eq!(task.run_count(), (MAX_RETRIES + 1) as usize);
	}

	#[tokio::test(start_paused = true)]
	async fn constrained_task_runs_once_connectivity_returns() {
		let probe = Arc::new(TogglingProbe {
			connected: AtomicBool::new(false),
		});
		let scheduler = TaskScheduler::new(Handle::current(), Arc::clone(&probe) as Arc<dyn ConnectivityProbe>);

		let task = Arc::new(CountingTask {
			kind: TaskKind::Upload,
			constraint: NetworkConstraint::Connected,
			runs: AtomicUsize::new(0),
			outcome: |_| Ok(TaskOutcome::Success),
		});
		scheduler.register(task.clone());

		scheduler.trigger(TaskKind::Upload);
		tokio::time::sleep(Duration::from_secs(2)).await;
		assert_eq!(task.run_count(), 0);

		probe.connected.store(true, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_secs(10)).await;
		assert_eq!(task.run_count(), 1);
	}

	#[tokio::test]
	async fn shutdown_aborts_in_flight_runs() {
		struct StallingTask;

		#[async_trait]
		impl Task for StallingTask {
			fn kind(&self) -> TaskKind {
				TaskKind::Ingest
			}

			async fn run(&self) -> Result<TaskOutcome> {
				tokio::time::sleep(Duration::from_secs(3600)).await;
				Ok(TaskOutcome::Success)
			}
		}

		let scheduler = TaskScheduler::new(Handle::current(), Arc::new(crate::AlwaysConnected));
		scheduler.register(Arc::new(StallingTask));
		scheduler.trigger(TaskKind::Ingest);

		tokio::time::sleep(Duration::from_millis(10)).await;
		scheduler.shutdown().await;
	}
}
