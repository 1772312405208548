//! Relay request construction.
//!
//! [`build_request`] assembles a request from already-known values and does
//! no I/O. [`RequestBuilder`] fills in the values that come from the chain
//! (fees, gas, forwarder nonce) and prices the request's calldata.

use crate::fees::FeeOracle;
use crate::{RelayError, RelaySettings};
use alloy_primitives::{Address, U256};
use relay_chain::ChainInterface;
use relay_types::{
	current_timestamp, CallDetails, FeeTerms, ForwardRequest, RelayData, RelayParams,
	RelayRequest, RelayWorkerInfo,
};
use std::sync::Arc;
use tracing::instrument;

/// Builds an unsigned request, checking expiry against the local clock.
pub fn build_request(
	call: &CallDetails,
	fees: &FeeTerms,
	params: &RelayParams,
) -> Result<RelayRequest, RelayError> {
	build_request_at(call, fees, params, current_timestamp())
}

/// Builds an unsigned request as of `now` (unix seconds).
pub fn build_request_at(
	call: &CallDetails,
	fees: &FeeTerms,
	params: &RelayParams,
	now: u64,
) -> Result<RelayRequest, RelayError> {
	let (from, to) = validate_call(call)?;
	validate_fee_terms(fees)?;
	if params.valid_until_time <= U256::from(now) {
		return Err(RelayError::InvalidRequest(format!(
			"validUntilTime {} is not in the future (now {})",
			params.valid_until_time, now
		)));
	}

	Ok(RelayRequest {
		request: ForwardRequest {
			from,
			to,
			value: call.value.unwrap_or(U256::ZERO),
			gas: fees.gas,
			nonce: params.nonce,
			data: call.data.clone(),
			valid_until_time: params.valid_until_time,
		},
		relay_data: RelayData {
			max_fee_per_gas: U256::from(fees.max_fee_per_gas),
			max_priority_fee_per_gas: U256::from(fees.max_priority_fee_per_gas),
			transaction_calldata_gas_used: params
				.transaction_calldata_gas_used
				.unwrap_or(U256::ZERO),
			relay_worker: params.relay_worker,
			paymaster: params.paymaster,
			forwarder: params.forwarder,
			paymaster_data: params.paymaster_data.clone(),
			client_id: params.client_id,
		},
		signature: None,
	})
}

fn parse_address(field: &str, value: &str) -> Result<Address, RelayError> {
	value
		.trim()
		.parse::<Address>()
		.map_err(|e| RelayError::InvalidRequest(format!("Invalid {} address '{}': {}", field, value, e)))
}

/// Parses the call's addresses.
pub fn validate_call(call: &CallDetails) -> Result<(Address, Address), RelayError> {
	let from = parse_address("from", &call.from)?;
	let to = parse_address("to", &call.to)?;
	if from == Address::ZERO {
		return Err(RelayError::InvalidRequest("from cannot be the zero address".into()));
	}
	Ok((from, to))
}

pub fn validate_fee_terms(fees: &FeeTerms) -> Result<(), RelayError> {
	if fees.max_fee_per_gas < fees.max_priority_fee_per_gas {
		return Err(RelayError::InvalidRequest(format!(
			"maxFeePerGas {} is below maxPriorityFeePerGas {}",
			fees.max_fee_per_gas, fees.max_priority_fee_per_gas
		)));
	}
	Ok(())
}

/// Prepares requests from live chain state.
pub struct RequestBuilder {
	chain: Arc<dyn ChainInterface>,
	fees: Arc<FeeOracle>,
	settings: Arc<RelaySettings>,
}

impl RequestBuilder {
	pub fn new(
		chain: Arc<dyn ChainInterface>,
		fees: Arc<FeeOracle>,
		settings: Arc<RelaySettings>,
	) -> Self {
		Self {
			chain,
			fees,
			settings,
		}
	}

	/// Builds an unsigned request for `call`, relayed through `worker`.
	///
	/// Explicit fee terms are used as given; otherwise live fees are read.
	/// The call gas comes from `call.gas`, then from non-zero explicit fee
	/// terms, and is estimated otherwise. Inputs are validated before any
	/// network call.
	#[instrument(skip_all, fields(from = %call.from, to = %call.to, worker = %worker.worker_address()))]
	pub async fn prepare_request(
		&self,
		call: &CallDetails,
		fees: Option<FeeTerms>,
		worker: &RelayWorkerInfo,
	) -> Result<RelayRequest, RelayError> {
		let (from, to) = validate_call(call)?;
		if let Some(fees) = &fees {
			validate_fee_terms(fees)?;
		}

		let gas = match (call.gas, fees.as_ref().map(|f| f.gas)) {
			(Some(gas), _) => gas,
			(None, Some(gas)) if !gas.is_zero() => gas,
			_ => {
				let estimated = self
					.chain
					.estimate_gas(from, to, call.data.clone(), call.value.unwrap_or(U256::ZERO))
					.await?;
				tracing::debug!(gas = estimated, "Estimated call gas");
				U256::from(estimated)
			},
		};

		let fee_terms = match fees {
			Some(fees) => FeeTerms { gas, ..fees },
			None => {
				let live = self.fees.current_fees().await?;
				FeeTerms {
					max_fee_per_gas: live.max_fee_per_gas,
					max_priority_fee_per_gas: live.max_priority_fee_per_gas,
					gas,
				}
			},
		};

		let nonce = self
			.chain
			.get_forwarder_nonce(self.settings.forwarder, from)
			.await?;

		let now = current_timestamp();
		let params = RelayParams {
			paymaster: self.settings.paymaster,
			paymaster_data: self.settings.paymaster_data.clone(),
			forwarder: self.settings.forwarder,
			relay_worker: worker.worker_address(),
			client_id: self.settings.client_id,
			nonce,
			valid_until_time: U256::from(now + self.settings.request_valid_seconds),
			transaction_calldata_gas_used: None,
		};

		let mut request = build_request_at(call, &fee_terms, &params, now)?;
		let calldata_gas = self
			.fees
			.estimate_calldata_cost(&request, self.settings.data_limits);
		request.relay_data.transaction_calldata_gas_used = U256::from(calldata_gas);

		tracing::info!(
			nonce = %nonce,
			gas = %gas,
			calldata_gas,
			valid_until = %request.request.valid_until_time,
			"Prepared relay request"
		);
		Ok(request)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::settings::tests::settings;
	use alloy_primitives::{address, Bytes};
	use relay_chain::{FeeEstimate, MockChainInterface};
	use relay_types::{PingResponse, RelayInfo};

	const FROM: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
	const TARGET: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

	fn call() -> CallDetails {
		CallDetails {
			from: FROM.to_string(),
			to: TARGET.to_string(),
			data: Bytes::from(vec![0xd0, 0x9d, 0xe0, 0x8a]),
			value: None,
			gas: None,
		}
	}

	fn fees() -> FeeTerms {
		FeeTerms {
			max_fee_per_gas: 30_000_000_000,
			max_priority_fee_per_gas: 2_000_000_000,
			gas: U256::from(100_000u64),
		}
	}

	fn params(valid_until: u64) -> RelayParams {
		RelayParams {
			paymaster: Address::repeat_byte(0x11),
			paymaster_data: Bytes::new(),
			forwarder: Address::repeat_byte(0x22),
			relay_worker: Address::repeat_byte(0x33),
			client_id: U256::from(1u64),
			nonce: U256::from(5u64),
			valid_until_time: U256::from(valid_until),
			transaction_calldata_gas_used: None,
		}
	}

	fn worker() -> RelayWorkerInfo {
		RelayWorkerInfo {
			ping_response: PingResponse {
				relay_worker_address: address!("0x58a4ee5eb91b32d8d525355590cb7dc6c6d978db"),
				relay_manager_address: Address::repeat_byte(0x44),
				relay_hub_address: address!("0x3232f21A6E08312654270c78A773f00dd61d60f5"),
				owner_address: Address::ZERO,
				min_max_priority_fee_per_gas: U256::from(1u64),
				max_max_fee_per_gas: U256::from(u64::MAX),
				min_max_fee_per_gas: U256::from(1u64),
				max_acceptance_budget: U256::from(285_252u64),
				chain_id: 80001,
				network_id: 80001,
				ready: true,
				version: "3.0.0".to_string(),
			},
			relay_info: RelayInfo {
				last_seen_block_number: 0,
				last_seen_timestamp: 0,
				first_seen_block_number: 0,
				first_seen_timestamp: 0,
				relay_manager: Address::repeat_byte(0x44),
				relay_url: "https://relay.example/".to_string(),
			},
		}
	}

	fn request_builder(chain: MockChainInterface) -> RequestBuilder {
		let chain: Arc<dyn ChainInterface> = Arc::new(chain);
		let settings = Arc::new(settings());
		let fees = Arc::new(FeeOracle::new(chain.clone(), settings.clone()));
		RequestBuilder::new(chain, fees, settings)
	}

	#[test]
	fn test_build_request_fields() {
		let request = build_request_at(&call(), &fees(), &params(2_000), 1_000).unwrap();
		assert_eq!(request.request.from, FROM.parse::<Address>().unwrap());
		assert_eq!(request.request.nonce, U256::from(5u64));
		assert_eq!(request.request.gas, U256::from(100_000u64));
		assert_eq!(request.relay_data.relay_worker, Address::repeat_byte(0x33));
		assert_eq!(request.relay_data.transaction_calldata_gas_used, U256::ZERO);
		assert!(!request.is_signed());
	}

	#[test]
	fn test_build_rejects_inverted_fees() {
		let mut inverted = fees();
		inverted.max_fee_per_gas = 1;
		let err = build_request_at(&call(), &inverted, &params(2_000), 1_000).unwrap_err();
		assert!(matches!(err, RelayError::InvalidRequest(_)));
	}

	#[test]
	fn test_build_rejects_expired_and_bad_addresses() {
		assert!(build_request_at(&call(), &fees(), &params(1_000), 1_000).is_err());

		let mut bad = call();
		bad.to = "0x1234".to_string();
		assert!(build_request_at(&bad, &fees(), &params(2_000), 1_000).is_err());
	}

	#[tokio::test]
	async fn test_prepare_reads_chain_state() {
		let mut chain = MockChainInterface::new();
		chain.expect_estimate_gas().times(1).returning(|_, _, _, _| Ok(42_000));
		chain.expect_estimate_eip1559_fees().times(1).returning(|| {
			Ok(FeeEstimate {
				max_fee_per_gas: 20_000_000_000,
				max_priority_fee_per_gas: 1_500_000_000,
			})
		});
		chain
			.expect_get_forwarder_nonce()
			.times(1)
			.returning(|_, _| Ok(U256::from(9u64)));

		let before = current_timestamp();
		let request = request_builder(chain)
			.prepare_request(&call(), None, &worker())
			.await
			.unwrap();

		assert_eq!(request.request.gas, U256::from(42_000u64));
		assert_eq!(request.request.nonce, U256::from(9u64));
		assert_eq!(request.relay_data.max_fee_per_gas, U256::from(24_000_000_000u64));
		assert_eq!(request.relay_data.max_priority_fee_per_gas, U256::from(1_800_000_000u64));
		assert_eq!(request.relay_data.relay_worker, worker().worker_address());
		assert!(request.relay_data.transaction_calldata_gas_used > U256::ZERO);
		assert!(request.request.valid_until_time >= U256::from(before + 3600));
	}

	#[tokio::test]
	async fn test_prepare_with_explicit_fees_skips_estimation() {
		let mut chain = MockChainInterface::new();
		chain.expect_estimate_gas().never();
		chain.expect_estimate_eip1559_fees().never();
		chain
			.expect_get_forwarder_nonce()
			.returning(|_, _| Ok(U256::ZERO));

		let request = request_builder(chain)
			.prepare_request(&call(), Some(fees()), &worker())
			.await
			.unwrap();
		assert_eq!(request.relay_data.max_fee_per_gas, U256::from(30_000_000_000u64));
		assert_eq!(request.request.gas, U256::from(100_000u64));
	}

	#[tokio::test]
	async fn test_prepare_validates_before_network() {
		let mut chain = MockChainInterface::new();
		chain.expect_estimate_gas().never();
		chain.expect_estimate_eip1559_fees().never();
		chain.expect_get_forwarder_nonce().never();

		let mut inverted = fees();
		inverted.max_priority_fee_per_gas = inverted.max_fee_per_gas + 1;
		let err = request_builder(chain)
			.prepare_request(&call(), Some(inverted), &worker())
			.await
			.unwrap_err();
		assert!(matches!(err, RelayError::InvalidRequest(_)));
	}
}
