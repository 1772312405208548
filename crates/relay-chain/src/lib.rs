//! Chain access for the relay client.
//!
//! The relay flow reads a handful of facts from the chain (fees, nonces,
//! paymaster limits, receipts) and simulates `relayCall` against the relay
//! hub. Those reads go through [`ChainInterface`] so the orchestration can be
//! exercised without a node.

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use relay_types::{GasAndDataLimits, TransactionHash, TransactionReceipt};
use thiserror::Error;

pub mod contracts;
pub mod transaction;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use contracts::{encode_relay_call, relay_request_id};
pub use implementations::evm::alloy::AlloyChain;
pub use transaction::{decode_signed_transaction, SignedTransactionSummary};

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Request timed out: {0}")]
	Timeout(String),
	/// The call reverted; carries the decoded reason when one was available.
	#[error("Call reverted: {0}")]
	Reverted(String),
	#[error("Decode error: {0}")]
	Decode(String),
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

impl ChainError {
	/// Whether repeating the same call later may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, ChainError::Network(_) | ChainError::Timeout(_))
	}
}

/// Latest block number and timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
	pub number: u64,
	pub timestamp: u64,
}

/// EIP-1559 fee estimate in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
	pub max_fee_per_gas: u128,
	pub max_priority_fee_per_gas: u128,
}

/// A `relayCall` to simulate with `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCallSimulation {
	pub relay_hub: Address,
	/// The relay worker the call is made from.
	pub from: Address,
	pub gas_limit: u64,
	pub max_fee_per_gas: u128,
	pub max_priority_fee_per_gas: u128,
	pub calldata: Bytes,
}

/// `RelayCallStatus` reported by the relay hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCallStatus {
	Ok,
	RelayedCallFailed,
	RejectedByPreRelayed,
	RejectedByForwarder,
	RejectedByRecipientRevert,
	PostRelayedFailed,
	PaymasterBalanceChanged,
	Unknown(u8),
}

impl From<u8> for RelayCallStatus {
	fn from(value: u8) -> Self {
		match value {
			0 => RelayCallStatus::Ok,
			1 => RelayCallStatus::RelayedCallFailed,
			2 => RelayCallStatus::RejectedByPreRelayed,
			3 => RelayCallStatus::RejectedByForwarder,
			4 => RelayCallStatus::RejectedByRecipientRevert,
			5 => RelayCallStatus::PostRelayedFailed,
			6 => RelayCallStatus::PaymasterBalanceChanged,
			other => RelayCallStatus::Unknown(other),
		}
	}
}

/// Decoded return values of a simulated `relayCall`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCallOutcome {
	pub paymaster_accepted: bool,
	pub charge: U256,
	pub status: RelayCallStatus,
	pub return_value: Bytes,
}

/// Read-only chain collaborator used by the relay flow.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait ChainInterface: Send + Sync {
	async fn chain_id(&self) -> Result<u64, ChainError>;

	async fn get_latest_block(&self) -> Result<BlockInfo, ChainError>;

	async fn estimate_eip1559_fees(&self) -> Result<FeeEstimate, ChainError>;

	/// Estimates gas for calling `to` with `data` from `from`.
	async fn estimate_gas(
		&self,
		from: Address,
		to: Address,
		data: Bytes,
		value: U256,
	) -> Result<u64, ChainError>;

	async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

	/// ERC-20 allowance of `owner` to `spender` on `token`.
	async fn get_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError>;

	/// Pending transaction count of `address`.
	async fn get_nonce(&self, address: Address) -> Result<u64, ChainError>;

	/// Forwarder nonce of `from`.
	async fn get_forwarder_nonce(
		&self,
		forwarder: Address,
		from: Address,
	) -> Result<U256, ChainError>;

	async fn get_gas_and_data_limits(
		&self,
		paymaster: Address,
	) -> Result<GasAndDataLimits, ChainError>;

	/// Simulates `relayCall`. A reverting call is `Err(ChainError::Reverted)`.
	async fn simulate_relay_call(
		&self,
		call: RelayCallSimulation,
	) -> Result<RelayCallOutcome, ChainError>;

	/// Receipt of a transaction, or `None` while it is not yet mined.
	async fn get_receipt(
		&self,
		hash: TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError>;
}
