//! Fee terms and gas accounting for relay requests.

use crate::{RelayError, RelaySettings};
use alloy_primitives::{Address, Bytes, U256};
use relay_chain::{encode_relay_call, ChainInterface, FeeEstimate};
use relay_types::{DataLengthLimits, GasAndDataLimits, RelayRequest, SIGNATURE_LENGTH};
use std::sync::Arc;

/// Gas charged per zero calldata byte.
const ZERO_BYTE_GAS: u64 = 4;
/// Gas charged per non-zero calldata byte.
const NON_ZERO_BYTE_GAS: u64 = 16;
/// Placeholder numeric value used when sizing worst-case calldata.
const WORST_CASE_NUMBER: u64 = 0xff_ffff_ffff;

/// Intrinsic calldata gas of `data`.
pub fn calldata_gas(data: &[u8]) -> u64 {
	data.iter()
		.map(|b| if *b == 0 { ZERO_BYTE_GAS } else { NON_ZERO_BYTE_GAS })
		.sum()
}

/// Reads fees and paymaster limits and prices calldata.
pub struct FeeOracle {
	chain: Arc<dyn ChainInterface>,
	settings: Arc<RelaySettings>,
}

impl FeeOracle {
	pub fn new(chain: Arc<dyn ChainInterface>, settings: Arc<RelaySettings>) -> Self {
		Self { chain, settings }
	}

	/// Current EIP-1559 fees with the configured markup applied.
	///
	/// The priority fee never drops below the configured floor and the max
	/// fee never drops below the priority fee.
	pub async fn current_fees(&self) -> Result<FeeEstimate, RelayError> {
		let estimate = self.chain.estimate_eip1559_fees().await?;
		let factor = u128::from(100 + self.settings.gas_price_factor_percent);

		let priority = (estimate.max_priority_fee_per_gas.saturating_mul(factor) / 100)
			.max(self.settings.min_max_priority_fee_per_gas);
		let max_fee = (estimate.max_fee_per_gas.saturating_mul(factor) / 100).max(priority);

		tracing::debug!(
			max_fee_per_gas = max_fee,
			max_priority_fee_per_gas = priority,
			"Computed relay fees"
		);
		Ok(FeeEstimate {
			max_fee_per_gas: max_fee,
			max_priority_fee_per_gas: priority,
		})
	}

	/// Calldata gas of the hub's `relayCall` for `request`, sized for the
	/// largest paymaster data, approval data and signature the relay may
	/// attach.
	pub fn estimate_calldata_cost(&self, request: &RelayRequest, limits: DataLengthLimits) -> u64 {
		let mut worst_case = request.clone();
		worst_case.relay_data.transaction_calldata_gas_used = U256::from(WORST_CASE_NUMBER);
		worst_case.relay_data.paymaster_data =
			Bytes::from(vec![0xff; limits.max_paymaster_data_length]);

		let calldata = encode_relay_call(
			&self.settings.domain_name,
			U256::from(WORST_CASE_NUMBER),
			&worst_case,
			&Bytes::from(vec![0xff; SIGNATURE_LENGTH]),
			&Bytes::from(vec![0xff; limits.max_approval_data_length]),
		);
		calldata_gas(&calldata)
	}

	pub async fn get_gas_and_data_limits(
		&self,
		paymaster: Address,
	) -> Result<GasAndDataLimits, RelayError> {
		Ok(self.chain.get_gas_and_data_limits(paymaster).await?)
	}
}
