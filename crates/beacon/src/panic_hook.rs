// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fatal error interception via the process panic hook.
//!
//! The hook wraps the previously installed hook and always delegates to
//! it, whatever happens inside capture, so the platform's own crash
//! behavior (abort, unwind, crash dialog) is preserved exactly. Capture
//! runs synchronously on the panicking thread and touches neither the
//! async runtime nor the scheduler; the staged file it writes is picked
//! up by the ingest pass on next launch.

use std::panic::{AssertUnwindSafe, PanicHookInfo};
use std::sync::Arc;

use tracing::error;

use crate::backtrace::capture_backtrace_text;
use crate::pipeline::PipelineInner;

/// Installs the crash capture panic hook, chaining the previous hook.
pub(crate) fn install_panic_hook(inner: Arc<PipelineInner>) {
	let previous = std::panic::take_hook();

	std::panic::set_hook(Box::new(move |info| {
		let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
			let stack = format!("{}\n{}", panic_message(info), capture_backtrace_text());
			inner.capture(stack, true)
		}));

		match outcome {
			Ok(Ok(_)) => {}
			Ok(Err(err)) => {
				error!(error = %err, "failed to persist fatal crash record");
			}
			Err(_) => {
				error!("crash capture itself panicked");
			}
		}

		// Unconditional: the original hook runs no matter how capture went.
		previous(info);
	}));
}

/// Renders the panic payload and location as the first stack trace line.
fn panic_message(info: &PanicHookInfo<'_>) -> String {
	let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = info.payload().downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic payload".to_string()
	};

	match info.location() {
		Some(location) => format!("panic at {location}: {payload}"),
		None => format!("panic: {payload}"),
	}
}
