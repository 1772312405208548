//! API error responses.
//!
//! Every failure leaves the server as an [`ErrorResponse`] body with a
//! matching HTTP status. Relay flow errors are mapped here so handlers can
//! propagate them with `?`.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use relay_account::SignerError;
use relay_core::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
	pub retry_after: Option<u64>,
}

/// Structured API error with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest { error_type: String, message: String },
	/// Unknown session (404)
	NotFound { error_type: String, message: String },
	/// The session is not in a state that allows the operation (409)
	Conflict { error_type: String, message: String },
	/// Valid input the relay flow could not act on (422)
	UnprocessableEntity { error_type: String, message: String },
	/// A collaborator is unreachable; the caller may retry (503)
	ServiceUnavailable {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(error_type: &str, message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: error_type.to_string(),
			message: message.into(),
		}
	}

	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::Conflict { .. } => StatusCode::CONFLICT,
			APIError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			APIError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::Conflict {
				error_type,
				message,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message, None),
			APIError::ServiceUnavailable {
				error_type,
				message,
				retry_after,
			} => (error_type, message, *retry_after),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details: None,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{} ({}): {}", self.status_code(), response.error, response.message)
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

impl From<RelayError> for APIError {
	fn from(err: RelayError) -> Self {
		let message = err.to_string();
		let retryable = err.is_retryable();
		match err {
			RelayError::InvalidRequest(_) => APIError::bad_request("INVALID_REQUEST", message),
			RelayError::Signer(SignerError::InvalidSignature(_)) => {
				APIError::bad_request("INVALID_SIGNATURE", message)
			},
			RelayError::Signer(_) => APIError::UnprocessableEntity {
				error_type: "SIGNER_ERROR".to_string(),
				message,
			},
			RelayError::SessionNotFound(_) => APIError::NotFound {
				error_type: "SESSION_NOT_FOUND".to_string(),
				message,
			},
			RelayError::InvalidState(_) => APIError::Conflict {
				error_type: "INVALID_SESSION_STATE".to_string(),
				message,
			},
			RelayError::NoWorkerAvailable(_) => APIError::ServiceUnavailable {
				error_type: "NO_WORKER_AVAILABLE".to_string(),
				message,
				retry_after: Some(10),
			},
			RelayError::Chain(_) | RelayError::Transport(_) if retryable => {
				APIError::ServiceUnavailable {
					error_type: "UPSTREAM_UNAVAILABLE".to_string(),
					message,
					retry_after: Some(5),
				}
			},
			RelayError::Chain(_) | RelayError::Transport(_) => APIError::UnprocessableEntity {
				error_type: "RELAY_FLOW_FAILED".to_string(),
				message,
			},
			RelayError::ConfirmationTimeout { .. } | RelayError::Config(_) => {
				APIError::InternalServerError {
					error_type: "INTERNAL_ERROR".to_string(),
					message,
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relay_chain::ChainError;
	use relay_transport::TransportError;

	#[test]
	fn test_relay_error_mapping() {
		let cases = [
			(
				RelayError::InvalidRequest("bad".into()),
				StatusCode::BAD_REQUEST,
				"INVALID_REQUEST",
			),
			(
				RelayError::Signer(SignerError::InvalidSignature("wrong signer".into())),
				StatusCode::BAD_REQUEST,
				"INVALID_SIGNATURE",
			),
			(
				RelayError::SessionNotFound("x".into()),
				StatusCode::NOT_FOUND,
				"SESSION_NOT_FOUND",
			),
			(
				RelayError::InvalidState("submitted".into()),
				StatusCode::CONFLICT,
				"INVALID_SESSION_STATE",
			),
			(
				RelayError::Chain(ChainError::Timeout("eth_call".into())),
				StatusCode::SERVICE_UNAVAILABLE,
				"UPSTREAM_UNAVAILABLE",
			),
			(
				RelayError::Transport(TransportError::Rejected("no".into())),
				StatusCode::UNPROCESSABLE_ENTITY,
				"RELAY_FLOW_FAILED",
			),
		];

		for (err, status, code) in cases {
			let api = APIError::from(err);
			assert_eq!(api.status_code(), status);
			assert_eq!(api.to_error_response().error, code);
		}
	}

	#[test]
	fn test_retry_after_only_when_unavailable() {
		let api = APIError::from(RelayError::NoWorkerAvailable("all busy".into()));
		assert_eq!(api.to_error_response().retry_after, Some(10));

		let body = serde_json::to_value(
			APIError::bad_request("INVALID_SESSION_ID", "nope").to_error_response(),
		)
		.unwrap();
		assert!(body.get("retryAfter").is_none());
		assert_eq!(body["error"], "INVALID_SESSION_ID");
	}
}
