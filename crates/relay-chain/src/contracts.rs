//! Solidity interfaces of the relay protocol contracts.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use relay_types as types;

sol! {
	struct ForwardRequest {
		address from;
		address to;
		uint256 value;
		uint256 gas;
		uint256 nonce;
		bytes data;
		uint256 validUntilTime;
	}

	struct RelayData {
		uint256 maxFeePerGas;
		uint256 maxPriorityFeePerGas;
		uint256 transactionCalldataGasUsed;
		address relayWorker;
		address paymaster;
		address forwarder;
		bytes paymasterData;
		uint256 clientId;
	}

	struct RelayRequest {
		ForwardRequest request;
		RelayData relayData;
	}

	struct GasAndDataLimits {
		uint256 acceptanceBudget;
		uint256 preRelayedCallGasLimit;
		uint256 postRelayedCallGasLimit;
		uint256 calldataSizeLimit;
	}

	interface IRelayHub {
		function relayCall(
			string calldata domainSeparatorName,
			uint256 maxAcceptanceBudget,
			RelayRequest calldata relayRequest,
			bytes calldata signature,
			bytes calldata approvalData
		) external returns (bool paymasterAccepted, uint96 charge, uint8 status, bytes memory returnValue);
	}

	interface IPaymaster {
		function getGasAndDataLimits() external view returns (GasAndDataLimits memory limits);
	}

	interface IForwarder {
		function getNonce(address from) external view returns (uint256);
	}

	interface IERC20 {
		function allowance(address owner, address spender) external view returns (uint256);
		function balanceOf(address account) external view returns (uint256);
	}
}

impl From<&types::RelayRequest> for RelayRequest {
	fn from(value: &types::RelayRequest) -> Self {
		let r = &value.request;
		let d = &value.relay_data;
		RelayRequest {
			request: ForwardRequest {
				from: r.from,
				to: r.to,
				value: r.value,
				gas: r.gas,
				nonce: r.nonce,
				data: r.data.clone(),
				validUntilTime: r.valid_until_time,
			},
			relayData: RelayData {
				maxFeePerGas: d.max_fee_per_gas,
				maxPriorityFeePerGas: d.max_priority_fee_per_gas,
				transactionCalldataGasUsed: d.transaction_calldata_gas_used,
				relayWorker: d.relay_worker,
				paymaster: d.paymaster,
				forwarder: d.forwarder,
				paymasterData: d.paymaster_data.clone(),
				clientId: d.client_id,
			},
		}
	}
}

impl From<GasAndDataLimits> for types::GasAndDataLimits {
	fn from(value: GasAndDataLimits) -> Self {
		types::GasAndDataLimits {
			acceptance_budget: value.acceptanceBudget,
			pre_relayed_call_gas_limit: value.preRelayedCallGasLimit,
			post_relayed_call_gas_limit: value.postRelayedCallGasLimit,
			calldata_size_limit: value.calldataSizeLimit,
		}
	}
}

/// ABI-encodes `IRelayHub.relayCall` for a request.
pub fn encode_relay_call(
	domain_separator_name: &str,
	max_acceptance_budget: U256,
	request: &types::RelayRequest,
	signature: &Bytes,
	approval_data: &Bytes,
) -> Bytes {
	IRelayHub::relayCallCall {
		domainSeparatorName: domain_separator_name.to_string(),
		maxAcceptanceBudget: max_acceptance_budget,
		relayRequest: request.into(),
		signature: signature.clone(),
		approvalData: approval_data.clone(),
	}
	.abi_encode()
	.into()
}

/// Identifier relays use to track a request: `keccak256(abi.encode(from,
/// nonce, signature))` with the first four bytes cleared.
pub fn relay_request_id(from: Address, nonce: U256, signature: &Bytes) -> B256 {
	let mut id = keccak256((from, nonce, signature.clone()).abi_encode_params());
	id.0[..4].fill(0);
	id
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_relay_call_selector() {
		let signature = "relayCall(string,uint256,((address,address,uint256,uint256,uint256,bytes,uint256),(uint256,uint256,uint256,address,address,address,bytes,uint256)),bytes,bytes)";
		assert_eq!(
			IRelayHub::relayCallCall::SELECTOR,
			keccak256(signature.as_bytes())[..4]
		);
	}

	#[test]
	fn test_encoding_grows_with_dynamic_data() {
		let request = types::RelayRequest {
			request: types::ForwardRequest {
				from: Address::repeat_byte(1),
				to: Address::repeat_byte(2),
				value: U256::ZERO,
				gas: U256::from(50_000u64),
				nonce: U256::ZERO,
				data: Bytes::new(),
				valid_until_time: U256::from(1u64),
			},
			relay_data: types::RelayData {
				max_fee_per_gas: U256::from(2u64),
				max_priority_fee_per_gas: U256::from(1u64),
				transaction_calldata_gas_used: U256::ZERO,
				relay_worker: Address::repeat_byte(3),
				paymaster: Address::repeat_byte(4),
				forwarder: Address::repeat_byte(5),
				paymaster_data: Bytes::new(),
				client_id: U256::from(1u64),
			},
			signature: None,
		};
		let short = encode_relay_call(
			"GSN Relayed Transaction",
			U256::ZERO,
			&request,
			&Bytes::new(),
			&Bytes::new(),
		);
		let long = encode_relay_call(
			"GSN Relayed Transaction",
			U256::ZERO,
			&request,
			&Bytes::from(vec![0xffu8; 65]),
			&Bytes::from(vec![0xffu8; 40]),
		);
		assert_eq!(short.len() % 32, 4);
		// 65 bytes pad to 96, 40 bytes pad to 64
		assert_eq!(long.len() - short.len(), 96 + 64);
	}

	#[test]
	fn test_relay_request_id_prefix_cleared() {
		let signature = Bytes::from(vec![0x1bu8; 65]);
		let id = relay_request_id(Address::repeat_byte(1), U256::from(4u64), &signature);
		assert_eq!(&id[..4], &[0u8; 4]);
		assert_ne!(id, B256::ZERO);

		let other = relay_request_id(Address::repeat_byte(1), U256::from(5u64), &signature);
		assert_ne!(id, other);
	}
}
