//! HTTP relay server client built on reqwest.

use crate::{RelayServerInterface, TransportError};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use relay_types::{join_url, truncate_id, PingResponse, RelayResponse, RelayTransactionRequest};
use std::time::Duration;

/// Talks to relay servers over HTTP.
///
/// One instance serves any number of relay URLs; the URL is passed per call
/// so worker selection can move between relays.
pub struct HttpRelayServer {
	client: reqwest::Client,
	ping_timeout: Duration,
	relay_timeout: Duration,
}

impl HttpRelayServer {
	pub fn new(ping_timeout: Duration, relay_timeout: Duration) -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.timeout(relay_timeout.max(ping_timeout))
			.build()
			.map_err(|e| TransportError::Connection(format!("Failed to build HTTP client: {}", e)))?;
		Ok(Self {
			client,
			ping_timeout,
			relay_timeout,
		})
	}
}

fn classify(err: reqwest::Error, url: &str) -> TransportError {
	if err.is_timeout() {
		TransportError::Timeout(url.to_string())
	} else if err.is_decode() {
		TransportError::Malformed(err.to_string())
	} else {
		TransportError::Connection(format!("{}: {}", url, err))
	}
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let body = response.text().await.unwrap_or_default();
	Err(TransportError::Status {
		status: status.as_u16(),
		body,
	})
}

#[async_trait]
impl RelayServerInterface for HttpRelayServer {
	async fn ping(&self, relay_url: &str) -> Result<PingResponse, TransportError> {
		let url = join_url(relay_url, "getaddr");
		let response = self
			.client
			.get(&url)
			.timeout(self.ping_timeout)
			.send()
			.await
			.map_err(|e| classify(e, &url))?;

		let ping: PingResponse = ensure_success(response)
			.await?
			.json()
			.await
			.map_err(|e| TransportError::Malformed(format!("Invalid /getaddr response: {}", e)))?;

		tracing::debug!(
			relay_url = %relay_url,
			worker = %ping.relay_worker_address,
			ready = ping.ready,
			"Pinged relay"
		);
		Ok(ping)
	}

	async fn relay(
		&self,
		relay_url: &str,
		request: RelayTransactionRequest,
	) -> Result<Bytes, TransportError> {
		let url = join_url(relay_url, "relay");
		let response = self
			.client
			.post(&url)
			.json(&request)
			.timeout(self.relay_timeout)
			.send()
			.await
			.map_err(|e| classify(e, &url))?;

		let body: RelayResponse = ensure_success(response)
			.await?
			.json()
			.await
			.map_err(|e| TransportError::Malformed(format!("Invalid /relay response: {}", e)))?;

		if let Some(error) = body.error {
			tracing::warn!(relay_url = %relay_url, error = %error, "Relay refused request");
			return Err(TransportError::Rejected(error));
		}

		let signed_tx = body
			.signed_tx
			.ok_or_else(|| TransportError::Malformed("Response has neither signedTx nor error".into()))?;

		if let Some(gap) = body.nonce_gap_filled.as_ref().and_then(|v| v.as_object()) {
			if !gap.is_empty() {
				tracing::debug!(filled = gap.len(), "Relay filled nonce gap");
			}
		}

		tracing::info!(
			relay_url = %relay_url,
			signed_tx = %truncate_id(&signed_tx.to_string()),
			"Relay accepted request"
		);
		Ok(signed_tx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, U256};
	use axum::{routing::get, routing::post, Json, Router};
	use relay_types::{ForwardRequest, RelayData, RelayMetadata, RelayRequestPayload};
	use serde_json::json;

	async fn serve(router: Router) -> String {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}/", addr)
	}

	fn client() -> HttpRelayServer {
		HttpRelayServer::new(Duration::from_secs(2), Duration::from_secs(2)).unwrap()
	}

	fn relay_body() -> RelayTransactionRequest {
		RelayTransactionRequest {
			relay_request: RelayRequestPayload {
				request: ForwardRequest {
					from: Address::repeat_byte(1),
					to: Address::repeat_byte(2),
					value: U256::ZERO,
					gas: U256::from(100_000u64),
					nonce: U256::ZERO,
					data: Bytes::new(),
					valid_until_time: U256::from(1_900_000_000u64),
				},
				relay_data: RelayData {
					max_fee_per_gas: U256::from(30u64),
					max_priority_fee_per_gas: U256::from(20u64),
					transaction_calldata_gas_used: U256::ZERO,
					relay_worker: Address::repeat_byte(3),
					paymaster: Address::repeat_byte(4),
					forwarder: Address::repeat_byte(5),
					paymaster_data: Bytes::new(),
					client_id: U256::from(1u64),
				},
			},
			metadata: RelayMetadata {
				max_acceptance_budget: U256::from(285252u64),
				relay_hub_address: Address::repeat_byte(6),
				signature: Bytes::from(vec![7u8; 65]),
				approval_data: Bytes::new(),
				relay_max_nonce: 4,
				relay_last_known_nonce: 1,
				domain_separator_name: "GSN Relayed Transaction".to_string(),
				relay_request_id: None,
			},
		}
	}

	#[tokio::test]
	async fn test_ping_parses_getaddr() {
		let router = Router::new().route(
			"/getaddr",
			get(|| async {
				Json(json!({
					"relayWorkerAddress": "0x58a4ee5eb91b32d8d525355590cb7dc6c6d978db",
					"relayManagerAddress": "0x4232f78050f6b6005fb658fde988a19997da87ee",
					"relayHubAddress": "0x3232f21A6E08312654270c78A773f00dd61d60f5",
					"ownerAddress": "0x1782aaD1AD8ce3174d8E5B22309D301A2d20A6f2",
					"minMaxPriorityFeePerGas": "2010000002",
					"maxMaxFeePerGas": "500000000000",
					"minMaxFeePerGas": "15",
					"maxAcceptanceBudget": "285252",
					"chainId": "80001",
					"networkId": "80001",
					"ready": true,
					"version": "3.0.0-beta.3"
				}))
			}),
		);
		let url = serve(router).await;
		let ping = client().ping(&url).await.unwrap();
		assert!(ping.ready);
		assert_eq!(ping.chain_id, 80001);
	}

	#[tokio::test]
	async fn test_relay_returns_signed_tx() {
		let router = Router::new().route(
			"/relay",
			post(|Json(body): Json<serde_json::Value>| async move {
				assert_eq!(body["metadata"]["relayMaxNonce"], 4);
				Json(json!({ "signedTx": "0x02f8aa", "nonceGapFilled": {} }))
			}),
		);
		let url = serve(router).await;
		let signed = client().relay(&url, relay_body()).await.unwrap();
		assert_eq!(signed, Bytes::from(vec![0x02, 0xf8, 0xaa]));
	}

	#[tokio::test]
	async fn test_relay_error_is_rejection() {
		let router = Router::new().route(
			"/relay",
			post(|| async { Json(json!({ "error": "paymaster rejected in local view call" })) }),
		);
		let url = serve(router).await;
		let err = client().relay(&url, relay_body()).await.unwrap_err();
		assert!(matches!(err, TransportError::Rejected(_)));
		assert!(!err.is_transient());
	}

	#[tokio::test]
	async fn test_bad_status_and_malformed_body() {
		let router = Router::new()
			.route(
				"/relay",
				post(|| async { (axum::http::StatusCode::BAD_REQUEST, "bad input") }),
			)
			.route("/getaddr", get(|| async { "not json" }));
		let url = serve(router).await;

		let err = client().relay(&url, relay_body()).await.unwrap_err();
		assert!(matches!(err, TransportError::Status { status: 400, .. }));
		assert!(!err.is_transient());

		let err = client().ping(&url).await.unwrap_err();
		assert!(matches!(err, TransportError::Malformed(_)));
		assert!(err.is_transient());
	}

	#[tokio::test]
	async fn test_server_error_status_is_transient() {
		let router = Router::new().route(
			"/relay",
			post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
		);
		let url = serve(router).await;

		let err = client().relay(&url, relay_body()).await.unwrap_err();
		match &err {
			TransportError::Status { status, body } => {
				assert_eq!(*status, 503);
				assert_eq!(body, "upstream down");
			},
			other => panic!("unexpected error {:?}", other),
		}
		assert!(err.is_transient());
	}

	#[tokio::test]
	async fn test_unreachable_relay_is_transient() {
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let url = format!("http://{}/", listener.local_addr().unwrap());
		drop(listener);

		let err = client().ping(&url).await.unwrap_err();
		assert!(err.is_transient());
	}
}
