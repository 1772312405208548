//! Alloy-based chain access.
//!
//! Every RPC is bounded by the configured request timeout. Contract reads use
//! the `sol!` bindings in [`crate::contracts`] and plain `eth_call`.

use crate::contracts::{IERC20, IForwarder, IPaymaster, IRelayHub};
use crate::{
	BlockInfo, ChainError, ChainInterface, FeeEstimate, RelayCallOutcome, RelayCallSimulation,
	RelayCallStatus,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, TransactionRequest};
use alloy_sol_types::{decode_revert_reason, SolCall};
use alloy_transport::TransportError;
use async_trait::async_trait;
use relay_types::{truncate_id, GasAndDataLimits, TransactionHash, TransactionReceipt};
use std::future::IntoFuture;
use std::time::Duration;

/// Chain access over an HTTP JSON-RPC endpoint.
pub struct AlloyChain {
	provider: DynProvider,
	request_timeout: Duration,
}

impl AlloyChain {
	/// Connects to `rpc_url`. No request is made until the first call.
	pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self, ChainError> {
		let url = rpc_url
			.parse()
			.map_err(|e| ChainError::InvalidConfig(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;

		let provider = ProviderBuilder::new()
			.disable_recommended_fillers()
			.connect_http(url)
			.erased();

		Ok(Self {
			provider,
			request_timeout,
		})
	}

	/// Runs an RPC future under the request timeout.
	async fn bounded<T, F>(&self, what: &str, call: F) -> Result<T, ChainError>
	where
		F: IntoFuture<Output = Result<T, TransportError>>,
	{
		match tokio::time::timeout(self.request_timeout, call.into_future()).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(e)) => Err(ChainError::Network(format!("{} failed: {}", what, e))),
			Err(_) => Err(ChainError::Timeout(format!(
				"{} exceeded {}s",
				what,
				self.request_timeout.as_secs()
			))),
		}
	}

	async fn view_call(&self, to: Address, data: Vec<u8>, what: &str) -> Result<Bytes, ChainError> {
		let request = TransactionRequest::default().to(to).input(Bytes::from(data).into());
		self.bounded(what, self.provider.call(request)).await
	}
}

/// Extracts a readable revert reason from an RPC error, if the error is a revert.
fn revert_reason(err: &TransportError) -> Option<String> {
	let payload = err.as_error_resp()?;
	match payload.as_revert_data() {
		Some(data) => Some(
			decode_revert_reason(&data)
				.unwrap_or_else(|| format!("reverted with data {}", data)),
		),
		None if payload.message.contains("revert") => Some(payload.message.to_string()),
		None => None,
	}
}

#[async_trait]
impl ChainInterface for AlloyChain {
	async fn chain_id(&self) -> Result<u64, ChainError> {
		self.bounded("eth_chainId", self.provider.get_chain_id())
			.await
	}

	async fn get_latest_block(&self) -> Result<BlockInfo, ChainError> {
		let block = self
			.bounded(
				"eth_getBlockByNumber",
				self.provider.get_block_by_number(BlockNumberOrTag::Latest),
			)
			.await?
			.ok_or_else(|| ChainError::Network("Latest block not available".to_string()))?;

		Ok(BlockInfo {
			number: block.header.number,
			timestamp: block.header.timestamp,
		})
	}

	async fn estimate_eip1559_fees(&self) -> Result<FeeEstimate, ChainError> {
		let estimate = self
			.bounded("fee estimation", self.provider.estimate_eip1559_fees())
			.await?;
		Ok(FeeEstimate {
			max_fee_per_gas: estimate.max_fee_per_gas,
			max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
		})
	}

	async fn estimate_gas(
		&self,
		from: Address,
		to: Address,
		data: Bytes,
		value: U256,
	) -> Result<u64, ChainError> {
		let request = TransactionRequest::default()
			.from(from)
			.to(to)
			.value(value)
			.input(data.into());

		match tokio::time::timeout(
			self.request_timeout,
			self.provider.estimate_gas(request).into_future(),
		)
		.await
		{
			Ok(Ok(gas)) => Ok(gas),
			Ok(Err(e)) => match revert_reason(&e) {
				Some(reason) => Err(ChainError::Reverted(reason)),
				None => Err(ChainError::Network(format!("eth_estimateGas failed: {}", e))),
			},
			Err(_) => Err(ChainError::Timeout("eth_estimateGas".to_string())),
		}
	}

	async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
		self.bounded("eth_getBalance", self.provider.get_balance(address))
			.await
	}

	async fn get_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, ChainError> {
		let call = IERC20::allowanceCall { owner, spender };
		let data = self.view_call(token, call.abi_encode(), "allowance").await?;
		IERC20::allowanceCall::abi_decode_returns(&data)
			.map_err(|e| ChainError::Decode(format!("Invalid allowance response: {}", e)))
	}

	async fn get_nonce(&self, address: Address) -> Result<u64, ChainError> {
		self.bounded(
			"eth_getTransactionCount",
			self.provider.get_transaction_count(address).pending(),
		)
		.await
	}

	async fn get_forwarder_nonce(
		&self,
		forwarder: Address,
		from: Address,
	) -> Result<U256, ChainError> {
		let call = IForwarder::getNonceCall { from };
		let data = self.view_call(forwarder, call.abi_encode(), "getNonce").await?;
		IForwarder::getNonceCall::abi_decode_returns(&data)
			.map_err(|e| ChainError::Decode(format!("Invalid getNonce response: {}", e)))
	}

	async fn get_gas_and_data_limits(
		&self,
		paymaster: Address,
	) -> Result<GasAndDataLimits, ChainError> {
		let call = IPaymaster::getGasAndDataLimitsCall {};
		let data = self
			.view_call(paymaster, call.abi_encode(), "getGasAndDataLimits")
			.await?;
		let limits = IPaymaster::getGasAndDataLimitsCall::abi_decode_returns(&data).map_err(|e| {
			ChainError::Decode(format!("Invalid getGasAndDataLimits response: {}", e))
		})?;
		Ok(limits.into())
	}

	async fn simulate_relay_call(
		&self,
		call: RelayCallSimulation,
	) -> Result<RelayCallOutcome, ChainError> {
		let request = TransactionRequest::default()
			.from(call.from)
			.to(call.relay_hub)
			.gas_limit(call.gas_limit)
			.max_fee_per_gas(call.max_fee_per_gas)
			.max_priority_fee_per_gas(call.max_priority_fee_per_gas)
			.input(call.calldata.into());

		let returned = match tokio::time::timeout(
			self.request_timeout,
			self.provider.call(request).into_future(),
		)
		.await
		{
			Ok(Ok(data)) => data,
			Ok(Err(e)) => {
				return match revert_reason(&e) {
					Some(reason) => {
						tracing::debug!(reason = %reason, "relayCall simulation reverted");
						Err(ChainError::Reverted(reason))
					},
					None => Err(ChainError::Network(format!("relayCall simulation failed: {}", e))),
				};
			},
			Err(_) => return Err(ChainError::Timeout("relayCall simulation".to_string())),
		};

		let decoded = IRelayHub::relayCallCall::abi_decode_returns(&returned)
			.map_err(|e| ChainError::Decode(format!("Invalid relayCall response: {}", e)))?;

		Ok(RelayCallOutcome {
			paymaster_accepted: decoded.paymasterAccepted,
			charge: U256::from(decoded.charge.to::<u128>()),
			status: RelayCallStatus::from(decoded.status),
			return_value: decoded.returnValue,
		})
	}

	async fn get_receipt(
		&self,
		hash: TransactionHash,
	) -> Result<Option<TransactionReceipt>, ChainError> {
		let receipt = self
			.bounded(
				"eth_getTransactionReceipt",
				self.provider.get_transaction_receipt(hash.0),
			)
			.await?;

		Ok(receipt.map(|receipt| {
			tracing::debug!(
				tx_hash = %truncate_id(&hash.to_string()),
				block = ?receipt.block_number,
				"Receipt found"
			);
			TransactionReceipt {
				hash: TransactionHash(receipt.transaction_hash),
				block_number: receipt.block_number.unwrap_or(0),
				gas_used: receipt.gas_used,
				success: receipt.status(),
			}
		}))
	}
}
