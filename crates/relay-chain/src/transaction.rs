//! Inspection of raw signed transactions returned by relays.

use crate::ChainError;
use alloy_consensus::{Transaction as _, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{keccak256, Address, Bytes};
use relay_types::TransactionHash;

/// The fields of a relayed transaction the client checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransactionSummary {
	/// `keccak256` of the raw bytes.
	pub hash: TransactionHash,
	pub to: Option<Address>,
	pub nonce: u64,
}

/// Decodes a typed (EIP-2718) or legacy signed transaction.
pub fn decode_signed_transaction(raw: &Bytes) -> Result<SignedTransactionSummary, ChainError> {
	let mut buf = raw.as_ref();
	let envelope = TxEnvelope::decode_2718(&mut buf)
		.map_err(|e| ChainError::Decode(format!("Invalid signed transaction: {}", e)))?;

	Ok(SignedTransactionSummary {
		hash: TransactionHash(keccak256(raw)),
		to: envelope.to(),
		nonce: envelope.nonce(),
	})
}
