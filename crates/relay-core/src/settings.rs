//! Flattened view of the configuration used by the relay flow.

use alloy_primitives::{Address, Bytes, U256};
use relay_config::Config;
use relay_types::{DataLengthLimits, RelayDomain};
use std::time::Duration;

/// Optional ERC-20 allowance the paymaster expects from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTokenRequirement {
	pub token: Address,
	pub min_allowance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
	pub chain_id: u64,
	pub domain_name: String,
	pub domain_version: String,
	pub relay_hub: Address,
	pub forwarder: Address,
	pub paymaster: Address,
	pub paymaster_data: Bytes,
	pub client_id: U256,
	pub request_valid_seconds: u64,
	pub data_limits: DataLengthLimits,
	/// Markup applied to estimated fees, in percent.
	pub gas_price_factor_percent: u64,
	pub min_max_priority_fee_per_gas: u128,
	pub max_relay_nonce_gap: u64,
	pub relay_hub_gas_overhead: u64,
	pub fee_token: Option<FeeTokenRequirement>,
	pub poll_interval: Duration,
	pub confirmation_timeout: Duration,
}

impl RelaySettings {
	pub fn from_config(config: &Config) -> Self {
		let relay = &config.relay;
		Self {
			chain_id: relay.chain_id,
			domain_name: relay.domain_separator_name.clone(),
			domain_version: relay.domain_version.clone(),
			relay_hub: config.network.relay_hub,
			forwarder: config.network.forwarder,
			paymaster: config.network.paymaster,
			paymaster_data: config.network.paymaster_data.clone(),
			client_id: U256::from(relay.client_id),
			request_valid_seconds: relay.request_valid_seconds,
			data_limits: DataLengthLimits {
				max_paymaster_data_length: relay.max_paymaster_data_length,
				max_approval_data_length: relay.max_approval_data_length,
			},
			gas_price_factor_percent: relay.gas_price_factor_percent,
			min_max_priority_fee_per_gas: u128::from(relay.min_max_priority_fee_per_gas),
			max_relay_nonce_gap: relay.max_relay_nonce_gap,
			relay_hub_gas_overhead: relay.relay_hub_gas_overhead,
			fee_token: relay.fee_token.as_ref().map(|token| FeeTokenRequirement {
				token: token.address,
				min_allowance: U256::from(token.min_allowance),
			}),
			poll_interval: config.timeouts.poll_interval(),
			confirmation_timeout: config.timeouts.confirmation(),
		}
	}

	/// The EIP-712 domain requests are signed under.
	pub fn domain(&self) -> RelayDomain {
		RelayDomain {
			name: self.domain_name.clone(),
			version: self.domain_version.clone(),
			chain_id: self.chain_id,
			verifying_contract: self.forwarder,
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use alloy_primitives::address;

	/// Settings for a Mumbai-style deployment used across the unit tests.
	pub(crate) fn settings() -> RelaySettings {
		RelaySettings {
			chain_id: 80001,
			domain_name: "GSN Relayed Transaction".to_string(),
			domain_version: "3".to_string(),
			relay_hub: address!("0x3232f21A6E08312654270c78A773f00dd61d60f5"),
			forwarder: address!("0xB2b5841DBeF766d4b521221732F9B618fCf34A87"),
			paymaster: address!("0x1111111111111111111111111111111111111111"),
			paymaster_data: Bytes::new(),
			client_id: U256::from(1u64),
			request_valid_seconds: 3600,
			data_limits: DataLengthLimits::default(),
			gas_price_factor_percent: 20,
			min_max_priority_fee_per_gas: 1_000_000_000,
			max_relay_nonce_gap: 3,
			relay_hub_gas_overhead: 50_000,
			fee_token: None,
			poll_interval: Duration::from_millis(100),
			confirmation_timeout: Duration::from_secs(30),
		}
	}

	#[test]
	fn test_from_config() {
		let toml = r#"
[relay]
id = "settings-test"
chain_id = 80001
max_paymaster_data_length = 32

[relay.fee_token]
address = "0x2222222222222222222222222222222222222222"
min_allowance = 1000

[network]
rpc_url = "http://localhost:8545"
relay_hub = "0x3232f21A6E08312654270c78A773f00dd61d60f5"
forwarder = "0xB2b5841DBeF766d4b521221732F9B618fCf34A87"
paymaster = "0x1111111111111111111111111111111111111111"

[workers]
selection = "pinned"
[workers.pinned]
url = "https://relay.example/gsn1"

[account]
primary = "deferred"
[account.implementations.deferred]
"#;
		let config: Config = toml.parse().unwrap();
		let settings = RelaySettings::from_config(&config);
		assert_eq!(settings.chain_id, 80001);
		assert_eq!(settings.data_limits.max_paymaster_data_length, 32);
		assert_eq!(settings.fee_token.unwrap().min_allowance, U256::from(1000u64));
		assert_eq!(settings.domain().verifying_contract, settings.forwarder);
		assert_eq!(settings.domain().version, "3");
	}
}
