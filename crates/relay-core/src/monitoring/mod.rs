//! Waiting for relayed transactions to be mined.

use crate::RelayError;
use relay_chain::ChainInterface;
use relay_types::{truncate_id, Confirmation, TransactionHash, TransactionReceipt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Polls the chain for a transaction receipt.
pub struct ConfirmationWaiter {
	chain: Arc<dyn ChainInterface>,
	poll_interval: Duration,
}

impl ConfirmationWaiter {
	pub fn new(chain: Arc<dyn ChainInterface>, poll_interval: Duration) -> Self {
		Self {
			chain,
			poll_interval,
		}
	}

	/// Waits until `hash` is mined or `timeout` elapses.
	pub async fn wait_for_confirmation(
		&self,
		hash: TransactionHash,
		timeout: Duration,
	) -> Result<Confirmation, RelayError> {
		self.wait_for_confirmation_until(hash, timeout, std::future::pending())
			.await
	}

	/// Like [`wait_for_confirmation`](Self::wait_for_confirmation), but
	/// returns [`Confirmation::Cancelled`] as soon as `cancel` resolves.
	///
	/// A mined but reverted transaction is `Mined` with `success == false`.
	#[instrument(skip_all, fields(tx_hash = %truncate_id(&hash.to_string())))]
	pub async fn wait_for_confirmation_until<C>(
		&self,
		hash: TransactionHash,
		timeout: Duration,
		cancel: C,
	) -> Result<Confirmation, RelayError>
	where
		C: Future<Output = ()> + Send,
	{
		tokio::select! {
			biased;
			_ = cancel => {
				tracing::info!("Stopped waiting for confirmation");
				Ok(Confirmation::Cancelled)
			}
			polled = tokio::time::timeout(timeout, self.poll_receipt(hash)) => match polled {
				Ok(Ok(receipt)) => {
					if receipt.success {
						tracing::info!(block = receipt.block_number, gas_used = receipt.gas_used, "Transaction confirmed");
					} else {
						tracing::warn!(block = receipt.block_number, "Transaction mined but reverted");
					}
					Ok(Confirmation::Mined(receipt))
				}
				Ok(Err(e)) => Err(e),
				Err(_) => {
					tracing::warn!(waited_seconds = timeout.as_secs(), "Confirmation timed out");
					Err(RelayError::ConfirmationTimeout {
						hash,
						waited_seconds: timeout.as_secs(),
					})
				}
			}
		}
	}

	async fn poll_receipt(&self, hash: TransactionHash) -> Result<TransactionReceipt, RelayError> {
		loop {
			match self.chain.get_receipt(hash).await {
				Ok(Some(receipt)) => return Ok(receipt),
				Ok(None) => {},
				Err(e) if e.is_retryable() => {
					tracing::debug!(error = %e, "Receipt lookup failed, retrying");
				},
				Err(e) => return Err(e.into()),
			}
			tokio::time::sleep(self.poll_interval).await;
		}
	}
}
