//! Handing signed requests to a relay.
//!
//! Everything that can be checked locally is checked before the relay is
//! contacted. The relay's answer is a transaction it signed; before that
//! transaction is reported as ours we check it calls the configured hub
//! with a nonce we allowed.

use crate::RelaySettings;
use alloy_primitives::{Bytes, U256};
use relay_chain::{decode_signed_transaction, relay_request_id, ChainInterface};
use relay_transport::{RelayServerInterface, TransportError};
use relay_types::{
	truncate_id, AttemptError, RelayMetadata, RelayRequest, RelayRequestPayload,
	RelayTransactionRequest, RelayWorkerInfo, RelayedTransaction, RelayingAttemptResult,
};
use std::sync::Arc;
use tracing::instrument;

pub struct RelaySubmitter {
	chain: Arc<dyn ChainInterface>,
	server: Arc<dyn RelayServerInterface>,
	settings: Arc<RelaySettings>,
}

fn attempt_error(err: TransportError) -> AttemptError {
	if err.is_transient() {
		AttemptError::transient(err.to_string())
	} else {
		AttemptError::rejected(err.to_string())
	}
}

impl RelaySubmitter {
	pub fn new(
		chain: Arc<dyn ChainInterface>,
		server: Arc<dyn RelayServerInterface>,
		settings: Arc<RelaySettings>,
	) -> Self {
		Self {
			chain,
			server,
			settings,
		}
	}

	fn check_locally(
		&self,
		worker: &RelayWorkerInfo,
		request: &RelayRequest,
		view_call_gas_limit: u64,
	) -> Result<Bytes, AttemptError> {
		if view_call_gas_limit == 0 {
			return Err(AttemptError::local(
				"no view call gas limit; dry run not performed",
			));
		}
		// The hub charges the inner call and the calldata before any overhead.
		let floor = request
			.request
			.gas
			.saturating_add(request.relay_data.transaction_calldata_gas_used);
		if U256::from(view_call_gas_limit) < floor {
			return Err(AttemptError::local(format!(
				"view call gas limit {} is below the request's gas plus calldata gas {}",
				view_call_gas_limit, floor
			)));
		}
		let ping = &worker.ping_response;
		if !ping.ready {
			return Err(AttemptError::local(format!(
				"worker {} at {} is not ready",
				ping.relay_worker_address,
				worker.relay_url()
			)));
		}
		if request.relay_data.relay_worker != ping.relay_worker_address {
			return Err(AttemptError::local(format!(
				"request names worker {} but {} advertises {}",
				request.relay_data.relay_worker,
				worker.relay_url(),
				ping.relay_worker_address
			)));
		}
		if ping.relay_hub_address != self.settings.relay_hub {
			return Err(AttemptError::local(format!(
				"worker uses hub {}, configured hub is {}",
				ping.relay_hub_address, self.settings.relay_hub
			)));
		}
		if let Err(violation) = ping.check_fee_band(&request.relay_data) {
			return Err(AttemptError::local(violation.to_string()));
		}
		request
			.signature
			.clone()
			.ok_or_else(|| AttemptError::local("request is not signed"))
	}

	/// Makes one attempt to relay `request` through `worker`.
	///
	/// Returns as soon as the relay hands back its signed transaction; the
	/// caller waits for confirmation separately. A failed attempt must not
	/// be resubmitted verbatim.
	#[instrument(skip_all, fields(relay_url = %worker.relay_url(), worker = %worker.worker_address()))]
	pub async fn attempt_relay(
		&self,
		worker: &RelayWorkerInfo,
		request: &RelayRequest,
		view_call_gas_limit: u64,
	) -> RelayingAttemptResult {
		let signature = match self.check_locally(worker, request, view_call_gas_limit) {
			Ok(signature) => signature,
			Err(e) => {
				tracing::warn!(reason = %e.message, "Relay attempt refused locally");
				return RelayingAttemptResult::Error(e);
			},
		};

		let worker_address = worker.worker_address();
		let last_known_nonce = match self.chain.get_nonce(worker_address).await {
			Ok(nonce) => nonce,
			Err(e) => {
				return RelayingAttemptResult::Error(AttemptError::transient(format!(
					"failed to read worker nonce: {}",
					e
				)))
			},
		};
		let relay_max_nonce = last_known_nonce + self.settings.max_relay_nonce_gap;
		let request_id = relay_request_id(request.request.from, request.request.nonce, &signature);

		let body = RelayTransactionRequest {
			relay_request: RelayRequestPayload::from(request),
			metadata: RelayMetadata {
				max_acceptance_budget: worker.ping_response.max_acceptance_budget,
				relay_hub_address: self.settings.relay_hub,
				signature,
				approval_data: Bytes::new(),
				relay_max_nonce,
				relay_last_known_nonce: last_known_nonce,
				domain_separator_name: self.settings.domain_name.clone(),
				relay_request_id: Some(request_id.to_string()),
			},
		};

		tracing::debug!(
			request_id = %truncate_id(&request_id.to_string()),
			view_call_gas_limit,
			relay_max_nonce,
			"Sending request to relay"
		);

		let signed_tx = match self.server.relay(worker.relay_url(), body).await {
			Ok(signed_tx) => signed_tx,
			Err(e) => {
				tracing::warn!(error = %e, "Relay attempt failed");
				return RelayingAttemptResult::Error(attempt_error(e));
			},
		};

		let summary = match decode_signed_transaction(&signed_tx) {
			Ok(summary) => summary,
			Err(e) => {
				return RelayingAttemptResult::Error(AttemptError::transient(format!(
					"relay returned an undecodable transaction: {}",
					e
				)))
			},
		};
		if summary.to != Some(self.settings.relay_hub) {
			return RelayingAttemptResult::Error(AttemptError::rejected(format!(
				"relayed transaction targets {:?}, not hub {}",
				summary.to, self.settings.relay_hub
			)));
		}
		if summary.nonce > relay_max_nonce {
			return RelayingAttemptResult::Error(AttemptError::rejected(format!(
				"relayed transaction nonce {} exceeds relayMaxNonce {}",
				summary.nonce, relay_max_nonce
			)));
		}

		tracing::info!(
			tx_hash = %truncate_id(&summary.hash.to_string()),
			nonce = summary.nonce,
			"Relay submitted transaction"
		);
		RelayingAttemptResult::Transaction(RelayedTransaction {
			hash: summary.hash,
			signed_tx,
			relay_worker: worker_address,
			relay_url: worker.relay_url().to_string(),
		})
	}
}
