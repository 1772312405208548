//! Detachable signing for relay requests.
//!
//! The party that builds and submits a relay request is usually not the
//! party that holds the user's key. Signing therefore sits behind
//! [`SignerInterface`] and is exposed to the rest of the client through the
//! tagged [`RelaySigner`]:
//!
//! - `Live` wraps a signer that holds a key and signs immediately.
//! - `Deferred` holds no key. The signature is computed elsewhere and handed
//!   in with [`RelaySigner::provide_signature`]; until then `sign` fails with
//!   [`SignerError::NoSignatureAvailable`].

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use relay_types::{ConfigSchema, ImplementationRegistry};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod deferred;
	pub mod local;
}

pub use implementations::deferred::DeferredSigner;
pub use implementations::local::LocalSigner;

/// Errors that can occur during signing.
#[derive(Debug, Error)]
pub enum SignerError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// A deferred signer was asked to sign before a signature was provided.
	#[error("No signature available: the signature has not been provided yet")]
	NoSignatureAvailable,
	#[error("Invalid signature: {0}")]
	InvalidSignature(String),
	#[error("Timed out waiting for a signature")]
	Timeout,
	#[error("Unsupported operation: {0}")]
	Unsupported(String),
	#[error("Implementation error: {0}")]
	Implementation(String),
}

/// A capability that produces a signature over a 32-byte digest.
#[async_trait]
pub trait SignerInterface: Send + Sync {
	/// Schema of this implementation's `[account.implementations.<name>]` table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address the signature is expected to recover to, when known.
	async fn address(&self) -> Result<Option<Address>, SignerError>;

	/// Signs a prehashed digest, returning the 65-byte `r || s || v` encoding.
	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, SignerError>;
}

/// Signer handed to the relay flow.
#[derive(Clone)]
pub enum RelaySigner {
	Live(Arc<dyn SignerInterface>),
	Deferred(DeferredSigner),
}

impl std::fmt::Debug for RelaySigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RelaySigner::Live(_) => f.write_str("RelaySigner::Live"),
			RelaySigner::Deferred(d) => write!(f, "RelaySigner::Deferred({:?})", d),
		}
	}
}

impl RelaySigner {
	pub fn live(signer: impl SignerInterface + 'static) -> Self {
		RelaySigner::Live(Arc::new(signer))
	}

	pub fn deferred(signer: DeferredSigner) -> Self {
		RelaySigner::Deferred(signer)
	}

	pub fn is_deferred(&self) -> bool {
		matches!(self, RelaySigner::Deferred(_))
	}

	pub async fn address(&self) -> Result<Option<Address>, SignerError> {
		match self {
			RelaySigner::Live(signer) => signer.address().await,
			RelaySigner::Deferred(signer) => signer.address().await,
		}
	}

	/// Signs `hash`, or returns the most recently provided signature.
	pub async fn sign(&self, hash: &B256) -> Result<Bytes, SignerError> {
		match self {
			RelaySigner::Live(signer) => signer.sign_hash(hash).await,
			RelaySigner::Deferred(signer) => signer.sign_hash(hash).await,
		}
	}

	/// Injects an out-of-band signature. Only valid on deferred signers.
	pub fn provide_signature(&self, signature: Bytes) -> Result<(), SignerError> {
		match self {
			RelaySigner::Live(_) => Err(SignerError::Unsupported(
				"a live signer computes its own signatures".into(),
			)),
			RelaySigner::Deferred(signer) => signer.provide_signature(signature),
		}
	}
}

/// Factory building a signer from its TOML table.
pub type SignerFactory = fn(&toml::Value) -> Result<RelaySigner, SignerError>;

/// Registry trait for signer implementations.
pub trait SignerRegistry: ImplementationRegistry<Factory = SignerFactory> {}

/// All registered signer implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, SignerFactory)> {
	use implementations::{deferred, local};

	vec![
		(local::Registry::NAME, local::Registry::factory()),
		(deferred::Registry::NAME, deferred::Registry::factory()),
	]
}

/// Builds the signer named `name` from its configuration table.
pub fn create_signer(name: &str, config: &toml::Value) -> Result<RelaySigner, SignerError> {
	let factory = get_all_implementations()
		.into_iter()
		.find(|(registered, _)| *registered == name)
		.map(|(_, factory)| factory)
		.ok_or_else(|| {
			SignerError::Implementation(format!("Unknown signer implementation '{}'", name))
		})?;
	factory(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_live_signer_rejects_injection() {
		let config: toml::Value = toml::from_str(&format!("private_key = \"{}\"", KEY)).unwrap();
		let signer = create_signer("local", &config).unwrap();
		assert!(!signer.is_deferred());
		assert!(matches!(
			signer.provide_signature(Bytes::from(vec![1u8; 65])),
			Err(SignerError::Unsupported(_))
		));
		let signature = signer.sign(&B256::repeat_byte(7)).await.unwrap();
		assert_eq!(signature.len(), 65);
	}

	#[tokio::test]
	async fn test_deferred_signer_from_config() {
		let config = toml::Value::Table(toml::Table::new());
		let signer = create_signer("deferred", &config).unwrap();
		assert!(signer.is_deferred());
		assert!(matches!(
			signer.sign(&B256::ZERO).await,
			Err(SignerError::NoSignatureAvailable)
		));
	}

	#[test]
	fn test_unknown_implementation() {
		let config = toml::Value::Table(toml::Table::new());
		assert!(create_signer("hardware", &config).is_err());
	}
}
