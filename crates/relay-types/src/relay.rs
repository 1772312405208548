//! Relay server wire types and relaying attempt outcomes.
//!
//! `POST {relayUrl}/relay` takes a [`RelayTransactionRequest`] and answers
//! with a [`RelayResponse`] that carries either the worker's signed
//! transaction or an error string.

use crate::delivery::TransactionHash;
use crate::request::{ForwardRequest, RelayData, RelayRequest};
use crate::utils::serde_helpers::u256_string;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// The signed part of a relay request as sent to the relay; the signature
/// travels in the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequestPayload {
	pub request: ForwardRequest,
	pub relay_data: RelayData,
}

impl From<&RelayRequest> for RelayRequestPayload {
	fn from(request: &RelayRequest) -> Self {
		Self {
			request: request.request.clone(),
			relay_data: request.relay_data.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMetadata {
	#[serde(with = "u256_string")]
	pub max_acceptance_budget: U256,
	pub relay_hub_address: Address,
	pub signature: Bytes,
	pub approval_data: Bytes,
	/// Highest worker nonce the client accepts for the relayed transaction.
	pub relay_max_nonce: u64,
	pub relay_last_known_nonce: u64,
	pub domain_separator_name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relay_request_id: Option<String>,
}

/// Body of `POST /relay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayTransactionRequest {
	pub relay_request: RelayRequestPayload,
	pub metadata: RelayMetadata,
}

/// Response of `POST /relay`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
	#[serde(default)]
	pub signed_tx: Option<Bytes>,
	#[serde(default)]
	pub nonce_gap_filled: Option<serde_json::Value>,
	#[serde(default)]
	pub error: Option<String>,
}

/// A transaction the relay signed and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedTransaction {
	pub hash: TransactionHash,
	pub signed_tx: Bytes,
	pub relay_worker: Address,
	pub relay_url: String,
}

/// Classification of a failed relaying attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
	/// Caught before any network call: worker not ready, worker mismatch,
	/// fees out of band, unsigned request.
	Local,
	/// Timeout, unreachable relay or malformed response. May be retried
	/// against a different worker with a freshly built request.
	Transient,
	/// The relay explicitly refused. Terminal for this worker and request.
	Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?} relay error: {message}")]
pub struct AttemptError {
	pub kind: AttemptErrorKind,
	pub message: String,
}

impl AttemptError {
	pub fn local(message: impl Into<String>) -> Self {
		Self {
			kind: AttemptErrorKind::Local,
			message: message.into(),
		}
	}

	pub fn transient(message: impl Into<String>) -> Self {
		Self {
			kind: AttemptErrorKind::Transient,
			message: message.into(),
		}
	}

	pub fn rejected(message: impl Into<String>) -> Self {
		Self {
			kind: AttemptErrorKind::Rejected,
			message: message.into(),
		}
	}
}

/// Outcome of one submission try; never both a transaction and an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelayingAttemptResult {
	Transaction(RelayedTransaction),
	Error(AttemptError),
}

impl RelayingAttemptResult {
	pub fn transaction(&self) -> Option<&RelayedTransaction> {
		match self {
			RelayingAttemptResult::Transaction(tx) => Some(tx),
			RelayingAttemptResult::Error(_) => None,
		}
	}

	pub fn error(&self) -> Option<&AttemptError> {
		match self {
			RelayingAttemptResult::Transaction(_) => None,
			RelayingAttemptResult::Error(e) => Some(e),
		}
	}
}
