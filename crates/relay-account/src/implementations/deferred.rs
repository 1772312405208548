//! Deferred signer for the two-party relay flow.
//!
//! The submitting party builds a request and passes its signing hash to the
//! user, who signs elsewhere. The returned signature is injected with
//! [`DeferredSigner::provide_signature`] and published through a `watch`
//! channel, so a reader that observes it also observes the write.

use crate::{RelaySigner, SignerError, SignerInterface};
use alloy_primitives::{Address, Bytes, Signature, B256};
use async_trait::async_trait;
use relay_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	SIGNATURE_LENGTH,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Holds no key; replays the most recently provided signature.
#[derive(Clone)]
pub struct DeferredSigner {
	/// Expected signer, checked on every `sign_hash` when set.
	expected: Option<Address>,
	latest: Arc<watch::Sender<Option<Bytes>>>,
}

impl std::fmt::Debug for DeferredSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeferredSigner")
			.field("expected", &self.expected)
			.field("has_signature", &self.has_signature())
			.finish()
	}
}

impl Default for DeferredSigner {
	fn default() -> Self {
		Self::new(None)
	}
}

impl DeferredSigner {
	pub fn new(expected: Option<Address>) -> Self {
		let (latest, _) = watch::channel(None);
		Self {
			expected,
			latest: Arc::new(latest),
		}
	}

	/// Publishes a signature computed out-of-band.
	///
	/// Anything other than 65 bytes is refused, as is the all-zero value some
	/// wallets use as an "unsigned" placeholder.
	pub fn provide_signature(&self, signature: Bytes) -> Result<(), SignerError> {
		if signature.len() != SIGNATURE_LENGTH {
			return Err(SignerError::InvalidSignature(format!(
				"expected {} bytes, got {}",
				SIGNATURE_LENGTH,
				signature.len()
			)));
		}
		if signature.iter().all(|b| *b == 0) {
			return Err(SignerError::InvalidSignature(
				"all-zero placeholder is not a signature".into(),
			));
		}
		self.latest.send_replace(Some(signature));
		tracing::debug!("Signature provided to deferred signer");
		Ok(())
	}

	pub fn has_signature(&self) -> bool {
		self.latest.borrow().is_some()
	}

	/// Returns the most recently provided signature.
	pub fn sign(&self) -> Result<Bytes, SignerError> {
		self.latest
			.borrow()
			.clone()
			.ok_or(SignerError::NoSignatureAvailable)
	}

	/// Waits until a signature has been provided.
	///
	/// Resolves immediately if one already has been.
	pub async fn wait_for_signature(&self, timeout: Duration) -> Result<Bytes, SignerError> {
		let mut receiver = self.latest.subscribe();
		let waited = tokio::time::timeout(timeout, async move {
			receiver
				.wait_for(|signature| signature.is_some())
				.await
				.map(|signature| signature.clone())
		})
		.await;

		match waited {
			Ok(Ok(Some(signature))) => Ok(signature),
			Ok(Ok(None)) => Err(SignerError::NoSignatureAvailable),
			Ok(Err(_)) => Err(SignerError::Implementation(
				"signature channel closed".into(),
			)),
			Err(_) => Err(SignerError::Timeout),
		}
	}

	fn check_expected_signer(&self, signature: &Bytes, hash: &B256) -> Result<(), SignerError> {
		let Some(expected) = self.expected else {
			return Ok(());
		};
		let recovered = Signature::from_raw(signature)
			.and_then(|s| s.recover_address_from_prehash(hash))
			.map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
		if recovered != expected {
			return Err(SignerError::InvalidSignature(format!(
				"signature recovers {}, expected {}",
				recovered, expected
			)));
		}
		Ok(())
	}
}

/// Schema for `[account.implementations.deferred]`.
pub struct DeferredSignerSchema;

impl ConfigSchema for DeferredSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(vec![], vec![Field::new("address", FieldType::Address)]);
		schema.validate(config)
	}
}

#[async_trait]
impl SignerInterface for DeferredSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(DeferredSignerSchema)
	}

	async fn address(&self) -> Result<Option<Address>, SignerError> {
		Ok(self.expected)
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, SignerError> {
		let signature = self.sign()?;
		self.check_expected_signer(&signature, hash)?;
		Ok(signature)
	}
}

/// Builds a deferred signer, optionally bound to an expected `address`.
pub fn create_signer(config: &toml::Value) -> Result<RelaySigner, SignerError> {
	DeferredSignerSchema
		.validate(config)
		.map_err(|e| SignerError::Implementation(e.to_string()))?;

	let expected = config
		.get("address")
		.and_then(|v| v.as_str())
		.map(|s| s.parse::<Address>())
		.transpose()
		.map_err(|e| SignerError::Implementation(format!("Invalid address: {}", e)))?;

	Ok(RelaySigner::deferred(DeferredSigner::new(expected)))
}

/// Registry for the deferred signer.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "deferred";
	type Factory = crate::SignerFactory;

	fn factory() -> Self::Factory {
		create_signer
	}
}

impl crate::SignerRegistry for Registry {}
