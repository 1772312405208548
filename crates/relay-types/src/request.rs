//! The relay request: the unit of work a user authorizes and a relay submits.
//!
//! A [`RelayRequest`] pairs the forwarded call ([`ForwardRequest`]) with the
//! relay-specific metadata ([`RelayData`]). Both halves are covered by the
//! user's EIP-712 signature; only the signature itself is excluded from the
//! signed payload, so changing the worker, the fees or the paymaster data
//! after signing invalidates the request.

use crate::utils::eip712::{
	compute_domain_hash, compute_final_digest, relay_data_type_hash, relay_request_type_hash,
	Eip712AbiEncoder,
};
use crate::utils::serde_helpers::u256_string;
use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default EIP-712 domain name used by GSN v3 forwarders.
pub const DEFAULT_DOMAIN_NAME: &str = "GSN Relayed Transaction";
/// Default EIP-712 domain version used by GSN v3 forwarders.
pub const DEFAULT_DOMAIN_VERSION: &str = "3";
/// Length of an `r || s || v` ECDSA signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors raised while attaching or checking a request signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureCheckError {
	#[error("Request is not signed")]
	Unsigned,
	#[error("Signature is the all-zero placeholder")]
	ZeroSignature,
	#[error("Malformed signature: {0}")]
	Malformed(String),
	#[error("Signature recovers {recovered}, expected {expected}")]
	SignerMismatch { expected: Address, recovered: Address },
}

/// Call details as supplied by the party requesting the relay.
///
/// Addresses stay unparsed here; the builder validates them before any
/// network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDetails {
	pub from: String,
	pub to: String,
	#[serde(default)]
	pub data: Bytes,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<U256>,
	/// Call gas limit; estimated from the chain when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas: Option<U256>,
}

/// EIP-1559 fee terms plus the call gas limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTerms {
	pub max_fee_per_gas: u128,
	pub max_priority_fee_per_gas: u128,
	pub gas: U256,
}

/// Relay metadata needed to complete a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayParams {
	pub paymaster: Address,
	pub paymaster_data: Bytes,
	pub forwarder: Address,
	pub relay_worker: Address,
	pub client_id: U256,
	/// Forwarder nonce of `from`.
	pub nonce: U256,
	/// Unix timestamp after which the request must not execute.
	pub valid_until_time: U256,
	/// Calldata gas charged to the request; left at zero until estimated.
	pub transaction_calldata_gas_used: Option<U256>,
}

/// The forwarded call, as verified by the forwarder contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
	pub from: Address,
	pub to: Address,
	#[serde(with = "u256_string")]
	pub value: U256,
	#[serde(with = "u256_string")]
	pub gas: U256,
	#[serde(with = "u256_string")]
	pub nonce: U256,
	pub data: Bytes,
	#[serde(with = "u256_string")]
	pub valid_until_time: U256,
}

/// Relay-specific fields of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayData {
	#[serde(with = "u256_string")]
	pub max_fee_per_gas: U256,
	#[serde(with = "u256_string")]
	pub max_priority_fee_per_gas: U256,
	#[serde(with = "u256_string")]
	pub transaction_calldata_gas_used: U256,
	pub relay_worker: Address,
	pub paymaster: Address,
	pub forwarder: Address,
	pub paymaster_data: Bytes,
	#[serde(with = "u256_string")]
	pub client_id: U256,
}

impl RelayData {
	fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&relay_data_type_hash());
		enc.push_u256(self.max_fee_per_gas);
		enc.push_u256(self.max_priority_fee_per_gas);
		enc.push_u256(self.transaction_calldata_gas_used);
		enc.push_address(&self.relay_worker);
		enc.push_address(&self.paymaster);
		enc.push_address(&self.forwarder);
		enc.push_bytes(&self.paymaster_data);
		enc.push_u256(self.client_id);
		alloy_primitives::keccak256(enc.finish())
	}
}

/// EIP-712 domain the request is signed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl RelayDomain {
	/// The GSN v3 domain for a forwarder on `chain_id`.
	pub fn gsn(chain_id: u64, forwarder: Address) -> Self {
		Self {
			name: DEFAULT_DOMAIN_NAME.to_string(),
			version: DEFAULT_DOMAIN_VERSION.to_string(),
			chain_id,
			verifying_contract: forwarder,
		}
	}

	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}

/// A relay request, signed or awaiting its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
	pub request: ForwardRequest,
	pub relay_data: RelayData,
	/// `None` until the signing step completes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signature: Option<Bytes>,
}

impl RelayRequest {
	/// EIP-712 struct hash over every field except the signature.
	pub fn struct_hash(&self) -> B256 {
		let r = &self.request;
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&relay_request_type_hash());
		enc.push_address(&r.from);
		enc.push_address(&r.to);
		enc.push_u256(r.value);
		enc.push_u256(r.gas);
		enc.push_u256(r.nonce);
		enc.push_bytes(&r.data);
		enc.push_u256(r.valid_until_time);
		enc.push_b256(&self.relay_data.struct_hash());
		alloy_primitives::keccak256(enc.finish())
	}

	/// The digest the user signs: `keccak256(0x1901 || domain || structHash)`.
	pub fn signing_hash(&self, domain: &RelayDomain) -> B256 {
		compute_final_digest(&domain.separator(), &self.struct_hash())
	}

	pub fn is_signed(&self) -> bool {
		self.signature.is_some()
	}

	/// Stores a signature produced out-of-band.
	///
	/// Rejects anything that is not 65 bytes and the all-zero placeholder, so
	/// an "unsigned" marker can never be forwarded to a relay.
	pub fn attach_signature(&mut self, signature: Bytes) -> Result<(), SignatureCheckError> {
		check_signature_shape(&signature)?;
		self.signature = Some(signature);
		Ok(())
	}

	/// Recovers the signer and checks it is `request.from`.
	pub fn verify_signature(&self, domain: &RelayDomain) -> Result<Address, SignatureCheckError> {
		let raw = self
			.signature
			.as_ref()
			.ok_or(SignatureCheckError::Unsigned)?;
		check_signature_shape(raw)?;
		let signature = Signature::from_raw(raw)
			.map_err(|e| SignatureCheckError::Malformed(e.to_string()))?;
		let recovered = signature
			.recover_address_from_prehash(&self.signing_hash(domain))
			.map_err(|e| SignatureCheckError::Malformed(e.to_string()))?;
		if recovered != self.request.from {
			return Err(SignatureCheckError::SignerMismatch {
				expected: self.request.from,
				recovered,
			});
		}
		Ok(recovered)
	}
}

fn check_signature_shape(signature: &[u8]) -> Result<(), SignatureCheckError> {
	if signature.len() != SIGNATURE_LENGTH {
		return Err(SignatureCheckError::Malformed(format!(
			"expected {} bytes, got {}",
			SIGNATURE_LENGTH,
			signature.len()
		)));
	}
	if signature.iter().all(|b| *b == 0) {
		return Err(SignatureCheckError::ZeroSignature);
	}
	Ok(())
}
