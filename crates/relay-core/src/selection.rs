//! Relay worker selection policies.

use crate::RelayError;
use alloy_primitives::Address;
use async_trait::async_trait;
use relay_transport::RelayServerInterface;
use relay_types::{current_timestamp, PingResponse, RelayInfo, RelayWorkerInfo};
use std::sync::Arc;

/// Picks the worker a request will be relayed through.
///
/// Implementations must return a freshly pinged worker, since the request
/// binds the worker address and the fee band is checked against the ping.
#[async_trait]
pub trait WorkerSelector: Send + Sync {
	async fn select_worker(&self) -> Result<RelayWorkerInfo, RelayError>;
}

fn worker_info(relay_url: &str, ping: PingResponse) -> RelayWorkerInfo {
	let now = current_timestamp();
	RelayWorkerInfo {
		relay_info: RelayInfo {
			last_seen_block_number: 0,
			last_seen_timestamp: now,
			first_seen_block_number: 0,
			first_seen_timestamp: now,
			relay_manager: ping.relay_manager_address,
			relay_url: relay_url.to_string(),
		},
		ping_response: ping,
	}
}

/// Always uses one configured relay.
pub struct PinnedWorker {
	server: Arc<dyn RelayServerInterface>,
	relay_url: String,
	expected_worker: Option<Address>,
}

impl PinnedWorker {
	pub fn new(
		server: Arc<dyn RelayServerInterface>,
		relay_url: impl Into<String>,
		expected_worker: Option<Address>,
	) -> Self {
		Self {
			server,
			relay_url: relay_url.into(),
			expected_worker,
		}
	}
}

#[async_trait]
impl WorkerSelector for PinnedWorker {
	async fn select_worker(&self) -> Result<RelayWorkerInfo, RelayError> {
		let ping = self.server.ping(&self.relay_url).await?;
		if let Some(expected) = self.expected_worker {
			if ping.relay_worker_address != expected {
				return Err(RelayError::NoWorkerAvailable(format!(
					"{} advertises worker {}, expected {}",
					self.relay_url, ping.relay_worker_address, expected
				)));
			}
		}
		// Readiness is left to the submission engine, which refuses locally.
		Ok(worker_info(&self.relay_url, ping))
	}
}

/// Tries a list of relays in order and takes the first usable one.
pub struct PreferredRelays {
	server: Arc<dyn RelayServerInterface>,
	relay_urls: Vec<String>,
	chain_id: u64,
	relay_hub: Address,
}

impl PreferredRelays {
	pub fn new(
		server: Arc<dyn RelayServerInterface>,
		relay_urls: Vec<String>,
		chain_id: u64,
		relay_hub: Address,
	) -> Self {
		Self {
			server,
			relay_urls,
			chain_id,
			relay_hub,
		}
	}

	fn unusable_reason(&self, ping: &PingResponse) -> Option<String> {
		if !ping.ready {
			Some("not ready".to_string())
		} else if ping.chain_id != self.chain_id {
			Some(format!("chain {} instead of {}", ping.chain_id, self.chain_id))
		} else if ping.relay_hub_address != self.relay_hub {
			Some(format!("hub {} instead of {}", ping.relay_hub_address, self.relay_hub))
		} else {
			None
		}
	}
}

#[async_trait]
impl WorkerSelector for PreferredRelays {
	async fn select_worker(&self) -> Result<RelayWorkerInfo, RelayError> {
		for url in &self.relay_urls {
			match self.server.ping(url).await {
				Ok(ping) => match self.unusable_reason(&ping) {
					None => {
						tracing::debug!(relay_url = %url, worker = %ping.relay_worker_address, "Selected relay");
						return Ok(worker_info(url, ping));
					},
					Some(reason) => {
						tracing::debug!(relay_url = %url, reason = %reason, "Skipping relay");
					},
				},
				Err(e) => {
					tracing::warn!(relay_url = %url, error = %e, "Relay ping failed");
				},
			}
		}
		Err(RelayError::NoWorkerAvailable(format!(
			"none of {} preferred relays is usable",
			self.relay_urls.len()
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use relay_transport::{MockRelayServerInterface, TransportError};

	fn ping(ready: bool, chain_id: u64) -> PingResponse {
		PingResponse {
			relay_worker_address: Address::repeat_byte(0x58),
			relay_manager_address: Address::repeat_byte(0x42),
			relay_hub_address: Address::repeat_byte(0x32),
			owner_address: Address::ZERO,
			min_max_priority_fee_per_gas: U256::from(1u64),
			max_max_fee_per_gas: U256::from(1_000u64),
			min_max_fee_per_gas: U256::from(1u64),
			max_acceptance_budget: U256::from(285_252u64),
			chain_id,
			network_id: chain_id,
			ready,
			version: "3.0.0".to_string(),
		}
	}

	#[tokio::test]
	async fn test_pinned_pings_configured_url() {
		let mut server = MockRelayServerInterface::new();
		server
			.expect_ping()
			.withf(|url| url == "https://relay.example/")
			.times(1)
			.returning(|_| Ok(ping(false, 80001)));

		let selector = PinnedWorker::new(Arc::new(server), "https://relay.example/", None);
		let worker = selector.select_worker().await.unwrap();
		assert_eq!(worker.relay_url(), "https://relay.example/");
		assert!(!worker.ping_response.ready);
	}

	#[tokio::test]
	async fn test_pinned_worker_mismatch() {
		let mut server = MockRelayServerInterface::new();
		server.expect_ping().returning(|_| Ok(ping(true, 80001)));

		let selector = PinnedWorker::new(
			Arc::new(server),
			"https://relay.example/",
			Some(Address::repeat_byte(0x99)),
		);
		assert!(matches!(
			selector.select_worker().await,
			Err(RelayError::NoWorkerAvailable(_))
		));
	}

	#[tokio::test]
	async fn test_preferred_skips_unusable() {
		let mut server = MockRelayServerInterface::new();
		server.expect_ping().returning(|url| match url {
			"https://down.example/" => Err(TransportError::Timeout(url.to_string())),
			"https://busy.example/" => Ok(ping(false, 80001)),
			"https://other-chain.example/" => Ok(ping(true, 5)),
			_ => Ok(ping(true, 80001)),
		});

		let selector = PreferredRelays::new(
			Arc::new(server),
			vec![
				"https://down.example/".to_string(),
				"https://busy.example/".to_string(),
				"https://other-chain.example/".to_string(),
				"https://good.example/".to_string(),
			],
			80001,
			Address::repeat_byte(0x32),
		);
		let worker = selector.select_worker().await.unwrap();
		assert_eq!(worker.relay_url(), "https://good.example/");
	}

	#[tokio::test]
	async fn test_preferred_none_usable() {
		let mut server = MockRelayServerInterface::new();
		server.expect_ping().returning(|_| Ok(ping(true, 80001)));

		let selector = PreferredRelays::new(
			Arc::new(server),
			vec!["https://relay.example/".to_string()],
			80001,
			Address::repeat_byte(0x77),
		);
		assert!(matches!(
			selector.select_worker().await,
			Err(RelayError::NoWorkerAvailable(_))
		));
	}
}
