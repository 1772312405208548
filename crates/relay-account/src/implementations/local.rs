//! Live signer backed by a local private key.

use crate::{RelaySigner, SignerError, SignerInterface};
use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use relay_types::{
	with_0x_prefix, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SecretString, ValidationError,
};

/// Signs with a key held in process memory.
pub struct LocalSigner {
	signer: PrivateKeySigner,
}

impl LocalSigner {
	/// Creates a signer from a hex private key, with or without `0x`.
	pub fn new(private_key: &SecretString) -> Result<Self, SignerError> {
		let signer = private_key
			.with_exposed(|key| with_0x_prefix(key.trim()).parse::<PrivateKeySigner>())
			.map_err(|e| SignerError::InvalidKey(e.to_string()))?;
		Ok(Self { signer })
	}

	pub fn signer_address(&self) -> Address {
		self.signer.address()
	}
}

/// Schema for `[account.implementations.local]`.
pub struct LocalSignerSchema;

impl ConfigSchema for LocalSignerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let hex_part = key.trim().trim_start_matches("0x");
					if hex_part.len() != 64 || hex::decode(hex_part).is_err() {
						return Err("Private key must be 32 bytes of hex".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl SignerInterface for LocalSigner {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalSignerSchema)
	}

	async fn address(&self) -> Result<Option<Address>, SignerError> {
		Ok(Some(self.signer.address()))
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, SignerError> {
		let signature = self
			.signer
			.sign_hash(hash)
			.await
			.map_err(|e| SignerError::SigningFailed(e.to_string()))?;
		Ok(Bytes::from(signature.as_bytes().to_vec()))
	}
}

/// Builds a live signer from `private_key`.
pub fn create_signer(config: &toml::Value) -> Result<RelaySigner, SignerError> {
	LocalSignerSchema
		.validate(config)
		.map_err(|e| SignerError::InvalidKey(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| SignerError::InvalidKey("private_key is required".into()))?;

	Ok(RelaySigner::live(LocalSigner::new(&private_key)?))
}

/// Registry for the local signer.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::SignerFactory;

	fn factory() -> Self::Factory {
		create_signer
	}
}

impl crate::SignerRegistry for Registry {}
