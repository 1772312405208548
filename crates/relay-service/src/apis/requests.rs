//! Relay request endpoints.
//!
//! The API party prepares a request and hands back the digest the user has
//! to sign. Once the user posts the signature the request is dry-run and
//! relayed, and a background task follows the transaction to confirmation.
//! A party that did not post the signature itself can long-poll for it.

use crate::apis::error::APIError;
use crate::server::AppState;
use alloy_primitives::{Bytes, B256};
use relay_account::SignerError;
use relay_core::{
	RelayClient, RelayError, RelayOutcome, RelaySession, SessionRegistry, SessionStatus,
};
use relay_types::{
	truncate_id, AttemptErrorKind, CallDetails, Confirmation, FeeTerms, RelayDomain, RelayRequest,
	RelayWorkerInfo, RelayingAttemptResult, TransactionHash,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Body of `POST /api/requests`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRelayRequest {
	pub call: CallDetails,
	/// Explicit fee terms; live fees are used when absent.
	#[serde(default)]
	pub fees: Option<FeeTerms>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRelayResponse {
	pub id: Uuid,
	pub request: RelayRequest,
	/// EIP-712 digest the user must sign.
	pub signing_hash: B256,
	pub domain: RelayDomain,
	pub worker: RelayWorkerInfo,
}

/// Body of `POST /api/requests/{id}/signature`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSignatureRequest {
	pub signature: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSignatureResponse {
	pub id: Uuid,
	pub outcome: RelayOutcome,
	pub status: SessionStatus,
}

/// Body of `GET /api/requests/{id}/signature`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureView {
	pub id: Uuid,
	/// `null` when no signature arrived within the wait.
	pub signature: Option<Bytes>,
	pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
	pub id: Uuid,
	pub request: RelayRequest,
	pub signing_hash: B256,
	pub relay_url: String,
	pub status: SessionStatus,
	pub created_at: u64,
}

impl From<RelaySession> for SessionView {
	fn from(session: RelaySession) -> Self {
		Self {
			id: session.id,
			relay_url: session.worker.relay_url().to_string(),
			request: session.request,
			signing_hash: session.signing_hash,
			status: session.status,
			created_at: session.created_at,
		}
	}
}

fn parse_session_id(id: &str) -> Result<Uuid, APIError> {
	Uuid::parse_str(id).map_err(|_| {
		APIError::bad_request("INVALID_SESSION_ID", format!("'{}' is not a session id", id))
	})
}

/// Selects a worker, prepares the request and opens a signing session.
#[instrument(skip_all, fields(to = %body.call.to))]
pub async fn create_request(
	state: &AppState,
	body: CreateRelayRequest,
) -> Result<CreateRelayResponse, APIError> {
	let worker = state.client.select_worker().await?;
	let request = state
		.client
		.prepare_request(&body.call, body.fees, &worker)
		.await?;
	let signing_hash = state.client.signing_hash(&request);

	let session = state
		.sessions
		.create(request, worker, signing_hash)
		.await;
	info!(
		session = %session.id,
		relay_url = %session.worker.relay_url(),
		"Prepared relay request"
	);

	Ok(CreateRelayResponse {
		id: session.id,
		request: session.request,
		signing_hash,
		domain: state.client.domain(),
		worker: session.worker,
	})
}

/// Injects the user's signature, then dry-runs and relays the request.
#[instrument(skip_all, fields(session = %id))]
pub async fn submit_signature(
	state: &AppState,
	id: &str,
	body: SubmitSignatureRequest,
) -> Result<SubmitSignatureResponse, APIError> {
	let id = parse_session_id(id)?;
	let session = state.sessions.submit_signature(&id, body.signature).await?;

	let worker = match state.client.refresh_worker(&session.worker).await {
		Ok(worker) => worker,
		Err(e) => {
			warn!(error = %e, "Relay ping failed, using the cached worker state");
			session.worker.clone()
		},
	};

	// Errors here come from the dry run; the relay has not seen the request.
	let outcome = match state.client.relay_signed(&session.request, &worker).await {
		Ok(outcome) => outcome,
		Err(e) => {
			state.sessions.reopen(&id).await?;
			return Err(e.into());
		},
	};

	let status = match &outcome {
		RelayOutcome::DryRunRejected(rejection) => {
			warn!(%rejection, "Dry run rejected the request");
			SessionStatus::Failed {
				reason: rejection.to_string(),
			}
		},
		RelayOutcome::Attempted(RelayingAttemptResult::Error(error))
			if error.kind == AttemptErrorKind::Local =>
		{
			warn!(message = %error.message, "Relay attempt refused locally");
			state.sessions.reopen(&id).await?;
			SessionStatus::AwaitingSignature
		},
		RelayOutcome::Attempted(RelayingAttemptResult::Error(error)) => {
			warn!(kind = ?error.kind, message = %error.message, "Relay attempt failed");
			SessionStatus::Failed {
				reason: error.message.clone(),
			}
		},
		RelayOutcome::Attempted(RelayingAttemptResult::Transaction(tx)) => {
			info!(tx_hash = %truncate_id(&tx.hash.to_string()), "Request relayed");
			SessionStatus::Submitted { hash: tx.hash }
		},
	};
	if status != SessionStatus::AwaitingSignature {
		state.sessions.update_status(&id, status.clone()).await?;
	}
	// Started only once `submitted` is recorded so its result is the last write.
	if let RelayOutcome::Attempted(RelayingAttemptResult::Transaction(tx)) = &outcome {
		tokio::spawn(watch_confirmation(
			state.client.clone(),
			state.sessions.clone(),
			id,
			tx.hash,
			state.confirmation_timeout,
		));
	}

	Ok(SubmitSignatureResponse {
		id,
		outcome,
		status,
	})
}

pub async fn get_request(state: &AppState, id: &str) -> Result<SessionView, APIError> {
	let id = parse_session_id(id)?;
	let session = state.sessions.get(&id).await.ok_or_else(|| APIError::NotFound {
		error_type: "SESSION_NOT_FOUND".to_string(),
		message: format!("No relay session {}", id),
	})?;
	Ok(session.into())
}

/// Waits up to the configured signature wait for the user's signature.
#[instrument(skip_all, fields(session = %id))]
pub async fn wait_for_signature(state: &AppState, id: &str) -> Result<SignatureView, APIError> {
	let id = parse_session_id(id)?;
	let signature = match state
		.sessions
		.wait_for_signature(&id, state.signature_wait)
		.await
	{
		Ok(signature) => Some(signature),
		Err(RelayError::Signer(SignerError::Timeout)) => None,
		Err(e) => return Err(e.into()),
	};
	let session = state
		.sessions
		.get(&id)
		.await
		.ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

	Ok(SignatureView {
		id,
		signature,
		status: session.status,
	})
}

/// Follows a relayed transaction and records the final session status.
async fn watch_confirmation(
	client: Arc<RelayClient>,
	sessions: Arc<SessionRegistry>,
	id: Uuid,
	hash: TransactionHash,
	timeout: Duration,
) {
	let status = match client.wait_for_confirmation(hash, timeout).await {
		Ok(Confirmation::Mined(receipt)) if receipt.success => SessionStatus::Confirmed { receipt },
		Ok(Confirmation::Mined(receipt)) => SessionStatus::Failed {
			reason: format!("transaction reverted in block {}", receipt.block_number),
		},
		Ok(Confirmation::Cancelled) => return,
		Err(e) => SessionStatus::Failed {
			reason: e.to_string(),
		},
	};
	if let Err(e) = sessions.update_status(&id, status).await {
		warn!(session = %id, error = %e, "Could not record confirmation");
	}
}
