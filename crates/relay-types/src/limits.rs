//! Paymaster and client-side size limits.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Limits reported by the paymaster's `getGasAndDataLimits()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasAndDataLimits {
	pub acceptance_budget: U256,
	/// Gas available to `preRelayedCall`, the paymaster's verification step.
	pub pre_relayed_call_gas_limit: U256,
	pub post_relayed_call_gas_limit: U256,
	pub calldata_size_limit: U256,
}

/// Worst-case lengths the client budgets calldata gas for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLengthLimits {
	pub max_paymaster_data_length: usize,
	pub max_approval_data_length: usize,
}

