//! Relay worker snapshots.
//!
//! A worker advertises its capabilities through `GET {relayUrl}/getaddr`.
//! The snapshot is a point-in-time fact: it is re-fetched before each
//! submission and never mutated locally.

use crate::request::RelayData;
use crate::utils::serde_helpers::{u256_string, u64_flexible};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Worker self-description as returned by `/getaddr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
	pub relay_worker_address: Address,
	pub relay_manager_address: Address,
	pub relay_hub_address: Address,
	#[serde(default)]
	pub owner_address: Address,
	#[serde(with = "u256_string")]
	pub min_max_priority_fee_per_gas: U256,
	#[serde(with = "u256_string")]
	pub max_max_fee_per_gas: U256,
	#[serde(with = "u256_string")]
	pub min_max_fee_per_gas: U256,
	#[serde(with = "u256_string")]
	pub max_acceptance_budget: U256,
	#[serde(with = "u64_flexible")]
	pub chain_id: u64,
	#[serde(with = "u64_flexible")]
	pub network_id: u64,
	pub ready: bool,
	pub version: String,
}

/// Why a request's fee terms fall outside a worker's advertised band.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeBandViolation {
	#[error("maxPriorityFeePerGas {offered} below worker minimum {minimum}")]
	PriorityFeeTooLow { offered: U256, minimum: U256 },
	#[error("maxFeePerGas {offered} below worker minimum {minimum}")]
	MaxFeeTooLow { offered: U256, minimum: U256 },
	#[error("maxFeePerGas {offered} above worker maximum {maximum}")]
	MaxFeeTooHigh { offered: U256, maximum: U256 },
}

impl PingResponse {
	/// Checks the request fees against the advertised band:
	/// priority fee at least `minMaxPriorityFeePerGas`, max fee within
	/// `[minMaxFeePerGas, maxMaxFeePerGas]`.
	pub fn check_fee_band(&self, relay_data: &RelayData) -> Result<(), FeeBandViolation> {
		if relay_data.max_priority_fee_per_gas < self.min_max_priority_fee_per_gas {
			return Err(FeeBandViolation::PriorityFeeTooLow {
				offered: relay_data.max_priority_fee_per_gas,
				minimum: self.min_max_priority_fee_per_gas,
			});
		}
		if relay_data.max_fee_per_gas < self.min_max_fee_per_gas {
			return Err(FeeBandViolation::MaxFeeTooLow {
				offered: relay_data.max_fee_per_gas,
				minimum: self.min_max_fee_per_gas,
			});
		}
		if relay_data.max_fee_per_gas > self.max_max_fee_per_gas {
			return Err(FeeBandViolation::MaxFeeTooHigh {
				offered: relay_data.max_fee_per_gas,
				maximum: self.max_max_fee_per_gas,
			});
		}
		Ok(())
	}
}

/// Registry metadata about a relay's observed activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayInfo {
	#[serde(default)]
	pub last_seen_block_number: u64,
	#[serde(default)]
	pub last_seen_timestamp: u64,
	#[serde(default)]
	pub first_seen_block_number: u64,
	#[serde(default)]
	pub first_seen_timestamp: u64,
	pub relay_manager: Address,
	pub relay_url: String,
}

/// A worker selected for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayWorkerInfo {
	pub ping_response: PingResponse,
	pub relay_info: RelayInfo,
}

impl RelayWorkerInfo {
	pub fn worker_address(&self) -> Address {
		self.ping_response.relay_worker_address
	}

	pub fn relay_url(&self) -> &str {
		&self.relay_info.relay_url
	}
}
