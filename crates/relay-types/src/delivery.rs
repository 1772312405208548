//! Transaction references, receipts and confirmation outcomes.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of a relayed transaction, `keccak256` of its raw signed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Receipt of a mined transaction.
///
/// `success == false` means the transaction was mined but reverted, which is
/// reported separately from a confirmation timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
	pub hash: TransactionHash,
	pub block_number: u64,
	pub gas_used: u64,
	pub success: bool,
}

/// Outcome of waiting for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
	Mined(TransactionReceipt),
	/// Local waiting was cancelled; the transaction may still confirm later.
	Cancelled,
}
