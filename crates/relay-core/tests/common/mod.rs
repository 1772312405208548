#![allow(dead_code)]

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{address, Address, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use relay_core::RelaySettings;
use relay_types::{CallDetails, DataLengthLimits, GasAndDataLimits, PingResponse};
use std::time::Duration;

pub const RELAY_URL: &str = "https://relay.example/gsn1/";
pub const TARGET: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const HUB: Address = address!("0x3232f21A6E08312654270c78A773f00dd61d60f5");
pub const FORWARDER: Address = address!("0xB2b5841DBeF766d4b521221732F9B618fCf34A87");
pub const PAYMASTER: Address = address!("0x1111111111111111111111111111111111111111");

pub fn user() -> PrivateKeySigner {
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
		.parse()
		.unwrap()
}

pub fn worker_key() -> PrivateKeySigner {
	"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
		.parse()
		.unwrap()
}

pub fn settings() -> RelaySettings {
	RelaySettings {
		chain_id: 80001,
		domain_name: "GSN Relayed Transaction".to_string(),
		domain_version: "3".to_string(),
		relay_hub: HUB,
		forwarder: FORWARDER,
		paymaster: PAYMASTER,
		paymaster_data: Bytes::new(),
		client_id: U256::from(1u64),
		request_valid_seconds: 3600,
		data_limits: DataLengthLimits::default(),
		gas_price_factor_percent: 20,
		min_max_priority_fee_per_gas: 1_000_000_000,
		max_relay_nonce_gap: 3,
		relay_hub_gas_overhead: 50_000,
		fee_token: None,
		poll_interval: Duration::from_millis(500),
		confirmation_timeout: Duration::from_secs(60),
	}
}

pub fn ping(ready: bool) -> PingResponse {
	PingResponse {
		relay_worker_address: worker_key().address(),
		relay_manager_address: address!("0x4232f78050f6b6005fb658fde988a19997da87ee"),
		relay_hub_address: HUB,
		owner_address: Address::ZERO,
		min_max_priority_fee_per_gas: U256::from(1_000_000_000u64),
		max_max_fee_per_gas: U256::from(500_000_000_000u64),
		min_max_fee_per_gas: U256::from(1u64),
		max_acceptance_budget: U256::from(285_252u64),
		chain_id: 80001,
		network_id: 80001,
		ready,
		version: "3.0.0".to_string(),
	}
}

pub fn limits() -> GasAndDataLimits {
	GasAndDataLimits {
		acceptance_budget: U256::from(285_252u64),
		pre_relayed_call_gas_limit: U256::from(100_000u64),
		post_relayed_call_gas_limit: U256::from(110_000u64),
		calldata_size_limit: U256::from(10_500u64),
	}
}

/// A call to `increment()` on the target contract.
pub fn increment_call() -> CallDetails {
	CallDetails {
		from: user().address().to_string(),
		to: TARGET.to_string(),
		data: Bytes::from(vec![0xd0, 0x9d, 0xe0, 0x8a]),
		value: None,
		gas: None,
	}
}

/// A transaction the worker signed, as a relay would return it.
pub fn worker_transaction(to: Address, nonce: u64) -> Bytes {
	let tx = TxEip1559 {
		chain_id: 80001,
		nonce,
		gas_limit: 500_000,
		max_fee_per_gas: 36_000_000_000,
		max_priority_fee_per_gas: 2_400_000_000,
		to: TxKind::Call(to),
		value: U256::ZERO,
		input: Bytes::from(vec![0x6c, 0xa8, 0x62, 0xe2]),
		..Default::default()
	};
	let signature = worker_key().sign_hash_sync(&tx.signature_hash()).unwrap();
	let envelope: TxEnvelope = tx.into_signed(signature).into();
	Bytes::from(envelope.encoded_2718())
}
