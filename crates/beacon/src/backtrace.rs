// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free-text backtrace capture.

use std::backtrace::Backtrace;

/// Captures the current backtrace as free text.
///
/// Forces capture regardless of `RUST_BACKTRACE`, since a crash record
/// without frames is close to worthless. The output stays unstructured;
/// the pipeline treats stack traces as opaque text all the way to the
/// collection endpoint.
pub fn capture_backtrace_text() -> String {
	Backtrace::force_capture().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capture_produces_nonempty_text() {
		let text = capture_backtrace_text();
		assert!(!text.is_empty());
	}
}
