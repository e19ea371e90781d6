// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Certificate pinning via a custom rustls verifier.
//!
//! The verifier chains the standard webpki path validation first, then
//! requires at least one certificate in the presented chain whose SPKI
//! SHA-256 digest matches a configured pin. A chain that validates but
//! matches no pin aborts the handshake, which surfaces to the upload
//! worker as a transport failure and a retry.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};

use beacon_core::CertificatePin;

use crate::upload::TransportError;

/// Builds a TLS 1.2/1.3 client config that enforces the given pins on
/// top of normal certificate validation.
pub fn pinned_tls_config(pins: &[CertificatePin]) -> Result<rustls::ClientConfig, TransportError> {
	let mut roots = rustls::RootCertStore::empty();
	roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

	let provider = Arc::new(rustls::crypto::ring::default_provider());
	let webpki = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
		.build()
		.map_err(|e| TransportError::Transport(format!("verifier build failed: {e}")))?;

	let verifier = Arc::new(PinnedCertVerifier {
		inner: webpki,
		pins: pins.iter().map(CertificatePin::digest).collect(),
	});

	let config = rustls::ClientConfig::builder_with_provider(provider)
		.with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
		.map_err(|e| TransportError::Transport(format!("protocol selection failed: {e}")))?
		.dangerous()
		.with_custom_certificate_verifier(verifier)
		.with_no_client_auth();

	Ok(config)
}

/// Webpki validation plus SPKI pin enforcement.
#[derive(Debug)]
struct PinnedCertVerifier {
	inner: Arc<WebPkiServerVerifier>,
	pins: Vec<[u8; 32]>,
}

impl PinnedCertVerifier {
	fn chain_matches_pin(&self, end_entity: &CertificateDer<'_>, intermediates: &[CertificateDer<'_>]) -> bool {
		std::iter::once(end_entity)
			.chain(intermediates.iter())
			.filter_map(|cert| spki_sha256(cert))
			.any(|digest| self.pins.contains(&digest))
	}
}

impl ServerCertVerifier for PinnedCertVerifier {
	fn verify_server_cert(
		&self,
		end_entity: &CertificateDer<'_>,
		intermediates: &[CertificateDer<'_>],
		server_name: &ServerName<'_>,
		ocsp_response: &[u8],
		now: UnixTime,
	) -> Result<ServerCertVerified, rustls::Error> {
		let verified = self.inner.verify_server_cert(
			end_entity,
			intermediates,
			server_name,
			ocsp_response,
			now,
		)?;

		if self.chain_matches_pin(end_entity, intermediates) {
			Ok(verified)
		} else {
			Err(rustls::Error::General(
				"certificate chain matches no configured pin".to_string(),
			))
		}
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.inner.verify_tls12_signature(message, cert, dss)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, rustls::Error> {
		self.inner.verify_tls13_signature(message, cert, dss)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.inner.supported_verify_schemes()
	}
}

/// SHA-256 over a certificate's SubjectPublicKeyInfo DER bytes.
fn spki_sha256(cert: &CertificateDer<'_>) -> Option<[u8; 32]> {
	let (_, parsed) = x509_parser::parse_x509_certificate(cert.as_ref()).ok()?;
	let spki = parsed.tbs_certificate.subject_pki.raw;
	Some(Sha256::digest(spki).into())
}

#[cfg(test)]
mod tests {
	use super::*;
	use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

	fn pin_from(digest: [u8; 32]) -> CertificatePin {
		CertificatePin::parse(&BASE64.encode(digest)).unwrap()
	}

	#[test]
	fn pinned_config_builds() {
		let _config = pinned_tls_config(&[pin_from([9u8; 32])]).unwrap();
	}

	#[test]
	fn pin_matching_is_exact() {
		let verifier = PinnedCertVerifier {
			inner: WebPkiServerVerifier::builder_with_provider(
				Arc::new({
					let mut roots = rustls::RootCertStore::empty();
					roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
					roots
				}),
				Arc::new(rustls::crypto::ring::default_provider()),
			)
			.build()
			.unwrap(),
			pins: vec![[9u8; 32]],
		};

		// A chain with no parseable certificate can never match a pin.
		let garbage = CertificateDer::from(vec![0u8; 16]);
		assert!(!verifier.chain_matches_pin(&garbage, &[]));
	}

	#[test]
	fn spki_digest_of_garbage_is_none() {
		let cert = CertificateDer::from(vec![0u8; 16]);
		assert!(spki_sha256(&cert).is_none());
	}
}
