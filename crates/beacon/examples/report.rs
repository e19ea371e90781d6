// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: capture and ship a crash report through the Beacon pipeline.
//!
//! Run with:
//!   cargo run --example report -p beacon

use beacon::{Pipeline, RedactionRules, UploadConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "beacon=debug".into()),
		)
		.init();

	let base_url =
		std::env::var("BEACON_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
	let data_dir = std::env::temp_dir().join("beacon-example");

	println!("Initializing crash pipeline...");
	println!("  Endpoint: {}", base_url);
	println!("  Data dir: {}", data_dir.display());

	let pipeline = Pipeline::builder().data_dir(&data_dir).build().await?;

	// Fatal errors are captured from here on, even if this process dies
	// before the background workers run.
	pipeline.install_panic_hook();

	pipeline
		.update_configuration(UploadConfig {
			endpoint_base: Some(base_url),
			endpoint_path: Some("/api/crashes".to_string()),
			redaction_rules: Some(RedactionRules::default()),
			..UploadConfig::default()
		})
		.await?;

	// Report a handled error; the email in the message will be redacted
	// before anything touches disk.
	println!("\nReporting a non-fatal error...");
	pipeline.report_message("example failure while mailing user@example.com");

	// Drain the queue and attempt delivery now rather than waiting for
	// the background workers.
	pipeline.flush().await;

	let pending = pipeline.stored_record_count().await?;
	println!("Records still pending upload: {pending}");

	pipeline.shutdown().await;
	println!("Pipeline shutdown complete.");

	Ok(())
}
