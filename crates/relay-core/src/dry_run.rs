//! Off-chain prediction of whether a relay request will be accepted.
//!
//! Cheap local checks run first so the `relayCall` simulation is reached
//! only for requests that could plausibly succeed. A rejection is an
//! ordinary outcome, reported in [`DryRunResult`]; only failures to reach
//! the chain are errors.

use crate::{RelayError, RelaySettings};
use alloy_primitives::{Bytes, U256};
use relay_chain::{
	encode_relay_call, ChainError, ChainInterface, RelayCallSimulation, RelayCallStatus,
};
use relay_types::{
	DryRunRejection, DryRunResult, GasAndDataLimits, PingResponse, RelayRequest,
};
use std::sync::Arc;
use tracing::instrument;

pub struct DryRunValidator {
	chain: Arc<dyn ChainInterface>,
	settings: Arc<RelaySettings>,
}

fn saturating_u64(value: U256) -> u64 {
	value.saturating_to::<u64>()
}

fn saturating_u128(value: U256) -> u128 {
	value.saturating_to::<u128>()
}

impl DryRunValidator {
	pub fn new(chain: Arc<dyn ChainInterface>, settings: Arc<RelaySettings>) -> Self {
		Self { chain, settings }
	}

	/// Gas ceiling for the simulated `relayCall`.
	pub fn view_call_gas_limit(&self, request: &RelayRequest, limits: &GasAndDataLimits) -> u64 {
		saturating_u64(limits.pre_relayed_call_gas_limit)
			.saturating_add(saturating_u64(limits.post_relayed_call_gas_limit))
			.saturating_add(saturating_u64(request.request.gas))
			.saturating_add(saturating_u64(request.relay_data.transaction_calldata_gas_used))
			.saturating_add(self.settings.relay_hub_gas_overhead)
	}

	/// Dry-runs `request` against the chain.
	///
	/// `worker` is the latest ping of the worker the request names; when
	/// given, the fee terms are checked against its band.
	#[instrument(skip_all, fields(from = %request.request.from, nonce = %request.request.nonce))]
	pub async fn verify_dry_run(
		&self,
		request: &RelayRequest,
		limits: &GasAndDataLimits,
		worker: Option<&PingResponse>,
	) -> Result<DryRunResult, RelayError> {
		let Some(signature) = request.signature.as_ref() else {
			return Ok(DryRunResult::rejected(
				0,
				DryRunRejection::Unsigned("the request has no signature yet".into()),
			));
		};

		let block = self.chain.get_latest_block().await?;
		if U256::from(block.timestamp) >= request.request.valid_until_time {
			return Ok(DryRunResult::rejected(
				0,
				DryRunRejection::Expired(format!(
					"validUntilTime {} reached at block {} (timestamp {})",
					request.request.valid_until_time, block.number, block.timestamp
				)),
			));
		}

		if let Some(ping) = worker {
			if let Err(violation) = ping.check_fee_band(&request.relay_data) {
				return Ok(DryRunResult::rejected(
					0,
					DryRunRejection::FeeOutOfBand(violation.to_string()),
				));
			}
		}

		let approval_data = Bytes::new();
		if let Some(rejection) = self.check_data_lengths(request, &approval_data) {
			return Ok(DryRunResult::rejected(0, rejection));
		}

		if let Some(requirement) = self.settings.fee_token {
			let allowance = self
				.chain
				.get_allowance(requirement.token, request.request.from, request.relay_data.paymaster)
				.await?;
			if allowance < requirement.min_allowance {
				return Ok(DryRunResult::rejected(
					0,
					DryRunRejection::PaymasterRejected(format!(
						"allowance {} of token {} to paymaster is below {}",
						allowance, requirement.token, requirement.min_allowance
					)),
				));
			}
		}

		let view_call_gas_limit = self.view_call_gas_limit(request, limits);
		let max_acceptance_budget = worker
			.map(|ping| ping.max_acceptance_budget)
			.unwrap_or(limits.acceptance_budget);
		let calldata = encode_relay_call(
			&self.settings.domain_name,
			max_acceptance_budget,
			request,
			signature,
			&approval_data,
		);

		if !limits.calldata_size_limit.is_zero()
			&& U256::from(calldata.len()) > limits.calldata_size_limit
		{
			return Ok(DryRunResult::rejected(
				view_call_gas_limit,
				DryRunRejection::DataTooLarge(format!(
					"relayCall calldata is {} bytes, paymaster allows {}",
					calldata.len(),
					limits.calldata_size_limit
				)),
			));
		}

		let simulation = RelayCallSimulation {
			relay_hub: self.settings.relay_hub,
			from: request.relay_data.relay_worker,
			gas_limit: view_call_gas_limit,
			max_fee_per_gas: saturating_u128(request.relay_data.max_fee_per_gas),
			max_priority_fee_per_gas: saturating_u128(request.relay_data.max_priority_fee_per_gas),
			calldata,
		};

		let outcome = match self.chain.simulate_relay_call(simulation).await {
			Ok(outcome) => outcome,
			Err(ChainError::Reverted(reason)) => {
				return Ok(DryRunResult::rejected(
					view_call_gas_limit,
					DryRunRejection::SimulationFailed(reason),
				));
			},
			Err(e) => return Err(e.into()),
		};

		let reason = || decode_return_reason(&outcome.return_value);
		let rejection = if !outcome.paymaster_accepted {
			Some(DryRunRejection::PaymasterRejected(reason()))
		} else {
			match outcome.status {
				RelayCallStatus::Ok => None,
				RelayCallStatus::RejectedByForwarder => {
					Some(DryRunRejection::ForwarderRejected(reason()))
				},
				RelayCallStatus::RelayedCallFailed | RelayCallStatus::RejectedByRecipientRevert => {
					Some(DryRunRejection::CallReverted(reason()))
				},
				RelayCallStatus::RejectedByPreRelayed => {
					Some(DryRunRejection::PaymasterRejected(reason()))
				},
				other => Some(DryRunRejection::SimulationFailed(format!(
					"{:?}: {}",
					other,
					reason()
				))),
			}
		};

		match &rejection {
			None => tracing::info!(view_call_gas_limit, charge = %outcome.charge, "Dry run accepted"),
			Some(rejection) => tracing::warn!(view_call_gas_limit, %rejection, "Dry run rejected"),
		}

		Ok(DryRunResult {
			view_call_gas_limit,
			rejection,
		})
	}

	fn check_data_lengths(
		&self,
		request: &RelayRequest,
		approval_data: &Bytes,
	) -> Option<DryRunRejection> {
		let limits = &self.settings.data_limits;
		let paymaster_data = request.relay_data.paymaster_data.len();
		if paymaster_data > limits.max_paymaster_data_length {
			return Some(DryRunRejection::DataTooLarge(format!(
				"paymasterData is {} bytes, limit is {}",
				paymaster_data, limits.max_paymaster_data_length
			)));
		}
		if approval_data.len() > limits.max_approval_data_length {
			return Some(DryRunRejection::DataTooLarge(format!(
				"approvalData is {} bytes, limit is {}",
				approval_data.len(),
				limits.max_approval_data_length
			)));
		}
		None
	}
}

/// Turns a `relayCall` return value into a readable reason.
fn decode_return_reason(data: &Bytes) -> String {
	if data.is_empty() {
		return "no reason given".to_string();
	}
	alloy_sol_types::decode_revert_reason(data).unwrap_or_else(|| format!("returned {}", data))
}
