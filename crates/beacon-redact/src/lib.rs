// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule-based redaction of sensitive content in free text.
//!
//! Stack traces routinely carry whatever the application had in flight when
//! it died: emails, tokens, card numbers, addresses. [`sanitize`] applies an
//! ordered set of category detectors over the raw text and replaces every
//! match with a fixed placeholder before anything is persisted or shipped.
//!
//! The approach is pattern matching and therefore best-effort: novel formats
//! slip through and coincidental digit runs get caught. That is an accepted
//! property of the design, not a bug.

pub mod engine;
pub mod rules;

pub use engine::{sanitize, REDACTED};
pub use rules::RedactionRules;
