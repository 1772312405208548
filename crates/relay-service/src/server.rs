//! HTTP server for the relay client API.
//!
//! The API party runs this server. It prepares requests for users, accepts
//! their detached signatures and relays the signed requests.

use crate::apis::error::APIError;
use crate::apis::requests::{
	self, CreateRelayRequest, CreateRelayResponse, SessionView, SignatureView,
	SubmitSignatureRequest, SubmitSignatureResponse,
};
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use relay_config::ApiConfig;
use relay_core::{RelayClient, SessionRegistry};
use relay_types::current_timestamp;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// How often sessions whose request expired unsigned are dropped.
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub client: Arc<RelayClient>,
	pub sessions: Arc<SessionRegistry>,
	/// How long the background watcher waits for a relayed transaction.
	pub confirmation_timeout: Duration,
	/// Longest a signature long-poll is held open.
	pub signature_wait: Duration,
}

impl AppState {
	pub fn new(client: RelayClient, confirmation_timeout: Duration, signature_wait: Duration) -> Self {
		Self {
			client: Arc::new(client),
			sessions: Arc::new(SessionRegistry::new()),
			confirmation_timeout,
			signature_wait,
		}
	}
}

/// Builds the API router.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/requests", post(handle_create_request))
				.route("/requests/{id}", get(handle_get_request))
				.route(
					"/requests/{id}/signature",
					get(handle_wait_for_signature).post(handle_submit_signature),
				),
		)
		.route("/health", get(handle_health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(request_timeout))
				.layer(CorsLayer::permissive()),
		)
		.with_state(state)
}

/// Serves the API until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
	let sessions = state.sessions.clone();
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
		loop {
			interval.tick().await;
			let pruned = sessions.prune_expired(current_timestamp()).await;
			if pruned > 0 {
				tracing::debug!(pruned, "Dropped expired relay sessions");
			}
		}
	});

	let app = router(state, Duration::from_secs(api_config.timeout_seconds));

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Relay client API starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/requests.
async fn handle_create_request(
	State(state): State<AppState>,
	Json(body): Json<CreateRelayRequest>,
) -> Result<(StatusCode, Json<CreateRelayResponse>), APIError> {
	match requests::create_request(&state, body).await {
		Ok(response) => Ok((StatusCode::CREATED, Json(response))),
		Err(e) => {
			tracing::warn!("Request preparation failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/requests/{id}/signature.
async fn handle_submit_signature(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(body): Json<SubmitSignatureRequest>,
) -> Result<Json<SubmitSignatureResponse>, APIError> {
	match requests::submit_signature(&state, &id, body).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Signature submission failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/requests/{id}/signature.
async fn handle_wait_for_signature(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<SignatureView>, APIError> {
	requests::wait_for_signature(&state, &id).await.map(Json)
}

/// Handles GET /api/requests/{id}.
async fn handle_get_request(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<SessionView>, APIError> {
	requests::get_request(&state, &id).await.map(Json)
}

async fn handle_health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"chainId": state.client.settings().chain_id,
		"sessions": state.sessions.len().await,
	}))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Address, Bytes, B256, U256};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use axum::body::Body;
	use axum::http::Request;
	use relay_chain::{
		BlockInfo, ChainError, FeeEstimate, MockChainInterface, RelayCallOutcome, RelayCallStatus,
	};
	use relay_config::Config;
	use relay_core::{PinnedWorker, RelaySettings};
	use relay_transport::{MockRelayServerInterface, RelayServerInterface};
	use relay_types::{GasAndDataLimits, PingResponse};
	use std::str::FromStr;
	use tower::ServiceExt;

	const RELAY_URL: &str = "https://relay.example/gsn1/";
	const WORKER: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");

	const CONFIG: &str = r#"
[relay]
id = "relay-service-test"
chain_id = 80001
request_valid_seconds = 3600

[network]
rpc_url = "http://localhost:8545"
relay_hub = "0x3232f21A6E08312654270c78A773f00dd61d60f5"
forwarder = "0xB2b5841DBeF766d4b521221732F9B618fCf34A87"
paymaster = "0x1111111111111111111111111111111111111111"

[workers]
selection = "pinned"
[workers.pinned]
url = "https://relay.example/gsn1/"

[account]
primary = "deferred"
[account.implementations.deferred]

[api]
enabled = true
"#;

	fn user() -> PrivateKeySigner {
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
			.parse()
			.unwrap()
	}

	fn ping() -> PingResponse {
		PingResponse {
			relay_worker_address: WORKER,
			relay_manager_address: address!("0x4232f78050f6b6005fb658fde988a19997da87ee"),
			relay_hub_address: address!("0x3232f21A6E08312654270c78A773f00dd61d60f5"),
			owner_address: Address::ZERO,
			min_max_priority_fee_per_gas: U256::from(1_000_000_000u64),
			max_max_fee_per_gas: U256::from(500_000_000_000u64),
			min_max_fee_per_gas: U256::from(1u64),
			max_acceptance_budget: U256::from(285_252u64),
			chain_id: 80001,
			network_id: 80001,
			ready: true,
			version: "3.0.0".to_string(),
		}
	}

	fn preparing_chain() -> MockChainInterface {
		let mut chain = MockChainInterface::new();
		chain.expect_estimate_gas().returning(|_, _, _, _| Ok(43_000));
		chain.expect_estimate_eip1559_fees().returning(|| {
			Ok(FeeEstimate {
				max_fee_per_gas: 30_000_000_000,
				max_priority_fee_per_gas: 2_000_000_000,
			})
		});
		chain
			.expect_get_forwarder_nonce()
			.returning(|_, _| Ok(U256::ZERO));
		chain
	}

	fn app(chain: MockChainInterface) -> (Router, AppState) {
		let config = Config::from_str(CONFIG).unwrap();
		let mut server = MockRelayServerInterface::new();
		server.expect_ping().returning(|_| Ok(ping()));
		server.expect_relay().never();
		let server: Arc<dyn RelayServerInterface> = Arc::new(server);
		let selector = Arc::new(PinnedWorker::new(server.clone(), RELAY_URL, None));
		let client = relay_core::RelayClient::new(
			RelaySettings::from_config(&config),
			Arc::new(chain),
			server,
			selector,
		);
		let state = AppState::new(client, Duration::from_secs(30), Duration::from_millis(200));
		(router(state.clone(), Duration::from_secs(10)), state)
	}

	async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let request = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	fn create_body() -> Value {
		json!({
			"call": {
				"from": user().address().to_string(),
				"to": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
				"data": "0xd09de08a",
			}
		})
	}

	#[tokio::test]
	async fn test_health() {
		let (app, _) = app(MockChainInterface::new());
		let (status, body) = send(&app, "GET", "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
		assert_eq!(body["chainId"], 80001);
	}

	#[tokio::test]
	async fn test_create_opens_session() {
		let (app, state) = app(preparing_chain());
		let (status, body) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(
			body["request"]["relayData"]["relayWorker"]
				.as_str()
				.unwrap()
				.to_lowercase(),
			WORKER.to_string().to_lowercase()
		);
		assert!(body["request"].get("signature").is_none());
		assert_eq!(state.sessions.len().await, 1);

		let id = body["id"].as_str().unwrap();
		let (status, view) = send(&app, "GET", &format!("/api/requests/{}", id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(view["status"]["state"], "awaiting_signature");
		assert_eq!(view["signingHash"], body["signingHash"]);
	}

	#[tokio::test]
	async fn test_create_rejects_zero_sender() {
		let mut chain = MockChainInterface::new();
		chain.expect_estimate_gas().never();
		let (app, state) = app(chain);
		let mut body = create_body();
		body["call"]["from"] = json!(Address::ZERO.to_string());

		let (status, error) = send(&app, "POST", "/api/requests", Some(body)).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(error["error"], "INVALID_REQUEST");
		assert!(state.sessions.is_empty().await);
	}

	#[tokio::test]
	async fn test_session_lookup_errors() {
		let (app, _) = app(MockChainInterface::new());

		let (status, body) = send(&app, "GET", "/api/requests/not-a-uuid", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_SESSION_ID");

		let unknown = uuid::Uuid::new_v4();
		let (status, body) = send(&app, "GET", &format!("/api/requests/{}", unknown), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "SESSION_NOT_FOUND");

		let (status, _) = send(
			&app,
			"POST",
			&format!("/api/requests/{}/signature", unknown),
			Some(json!({ "signature": Bytes::from(vec![1u8; 65]).to_string() })),
		)
		.await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_foreign_signature_refused() {
		let (app, state) = app(preparing_chain());
		let (_, created) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		let id = created["id"].as_str().unwrap();
		let hash = B256::from_str(created["signingHash"].as_str().unwrap()).unwrap();

		let stranger: PrivateKeySigner =
			"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
				.parse()
				.unwrap();
		let signature = stranger.sign_hash_sync(&hash).unwrap();
		let (status, body) = send(
			&app,
			"POST",
			&format!("/api/requests/{}/signature", id),
			Some(json!({ "signature": Bytes::from(signature.as_bytes().to_vec()).to_string() })),
		)
		.await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "INVALID_SIGNATURE");
		let session = state
			.sessions
			.get(&uuid::Uuid::parse_str(id).unwrap())
			.await
			.unwrap();
		assert!(!session.request.is_signed());
	}

	#[tokio::test]
	async fn test_dry_run_rejection_fails_session() {
		let mut chain = preparing_chain();
		chain.expect_get_gas_and_data_limits().returning(|_| {
			Ok(GasAndDataLimits {
				acceptance_budget: U256::from(285_252u64),
				pre_relayed_call_gas_limit: U256::from(100_000u64),
				post_relayed_call_gas_limit: U256::from(110_000u64),
				calldata_size_limit: U256::from(10_500u64),
			})
		});
		chain.expect_get_latest_block().returning(|| {
			Ok(BlockInfo {
				number: 1_000,
				timestamp: current_timestamp(),
			})
		});
		chain.expect_simulate_relay_call().returning(|_| {
			Ok(RelayCallOutcome {
				paymaster_accepted: false,
				charge: U256::ZERO,
				status: RelayCallStatus::RejectedByPreRelayed,
				return_value: Bytes::new(),
			})
		});
		chain.expect_get_nonce().never();

		let (app, _) = app(chain);
		let (_, created) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		let id = created["id"].as_str().unwrap();
		let hash = B256::from_str(created["signingHash"].as_str().unwrap()).unwrap();
		let signature = user().sign_hash_sync(&hash).unwrap();

		let (status, body) = send(
			&app,
			"POST",
			&format!("/api/requests/{}/signature", id),
			Some(json!({ "signature": Bytes::from(signature.as_bytes().to_vec()).to_string() })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["outcome"]["outcome"], "dry_run_rejected");
		assert_eq!(body["status"]["state"], "failed");

		let (_, again) = send(
			&app,
			"POST",
			&format!("/api/requests/{}/signature", id),
			Some(json!({ "signature": Bytes::from(signature.as_bytes().to_vec()).to_string() })),
		)
		.await;
		assert_eq!(again["error"], "INVALID_SESSION_STATE");
	}

	fn signature_body(hash: B256) -> Value {
		let signature = user().sign_hash_sync(&hash).unwrap();
		json!({ "signature": Bytes::from(signature.as_bytes().to_vec()).to_string() })
	}

	#[tokio::test]
	async fn test_failure_before_relay_reopens_session() {
		let mut chain = preparing_chain();
		chain
			.expect_get_gas_and_data_limits()
			.times(2)
			.returning(|_| Err(ChainError::Timeout("eth_call".into())));
		chain.expect_get_nonce().never();

		let (app, _) = app(chain);
		let (_, created) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		let id = created["id"].as_str().unwrap();
		let hash = B256::from_str(created["signingHash"].as_str().unwrap()).unwrap();
		let uri = format!("/api/requests/{}/signature", id);

		let (status, body) = send(&app, "POST", &uri, Some(signature_body(hash))).await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(body["error"], "UPSTREAM_UNAVAILABLE");

		let (_, view) = send(&app, "GET", &format!("/api/requests/{}", id), None).await;
		assert_eq!(view["status"]["state"], "awaiting_signature");

		// The relay never saw the request, so the signature may be posted again.
		let (status, _) = send(&app, "POST", &uri, Some(signature_body(hash))).await;
		assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	}

	#[tokio::test]
	async fn test_resubmission_while_relaying_refused() {
		let (app, state) = app(preparing_chain());
		let (_, created) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		let id = uuid::Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();
		let hash = B256::from_str(created["signingHash"].as_str().unwrap()).unwrap();
		let signature = user().sign_hash_sync(&hash).unwrap();

		// Stands in for a handler still relaying, or one dropped by the timeout layer.
		state
			.sessions
			.submit_signature(&id, Bytes::from(signature.as_bytes().to_vec()))
			.await
			.unwrap();

		let (status, body) = send(
			&app,
			"POST",
			&format!("/api/requests/{}/signature", id),
			Some(signature_body(hash)),
		)
		.await;
		assert_eq!(status, StatusCode::CONFLICT);
		assert_eq!(body["error"], "INVALID_SESSION_STATE");

		let (_, view) = send(&app, "GET", &format!("/api/requests/{}", id), None).await;
		assert_eq!(view["status"]["state"], "relaying");
	}

	#[tokio::test]
	async fn test_signature_long_poll() {
		let (app, state) = app(preparing_chain());
		let (_, created) = send(&app, "POST", "/api/requests", Some(create_body())).await;
		let id = uuid::Uuid::parse_str(created["id"].as_str().unwrap()).unwrap();
		let hash = B256::from_str(created["signingHash"].as_str().unwrap()).unwrap();
		let uri = format!("/api/requests/{}/signature", id);

		let (status, body) = send(&app, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["signature"].is_null());
		assert_eq!(body["status"]["state"], "awaiting_signature");

		let signature = Bytes::from(user().sign_hash_sync(&hash).unwrap().as_bytes().to_vec());
		state
			.sessions
			.submit_signature(&id, signature.clone())
			.await
			.unwrap();

		let (status, body) = send(&app, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["signature"], signature.to_string());
		assert_eq!(body["status"]["state"], "relaying");

		let unknown = uuid::Uuid::new_v4();
		let (status, _) = send(&app, "GET", &format!("/api/requests/{}/signature", unknown), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}
}
