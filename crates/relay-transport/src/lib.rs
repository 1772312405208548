//! Relay server access.
//!
//! A relay server exposes two endpoints the client uses:
//! `GET {url}/getaddr` for the worker's [`PingResponse`] and
//! `POST {url}/relay` to hand over a signed request.

use alloy_primitives::Bytes;
use async_trait::async_trait;
use relay_types::{PingResponse, RelayTransactionRequest};
use thiserror::Error;

pub mod implementations {
	pub mod http;
}

pub use implementations::http::HttpRelayServer;

/// Errors that can occur while talking to a relay server.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("Relay request timed out: {0}")]
	Timeout(String),
	#[error("Relay unreachable: {0}")]
	Connection(String),
	#[error("Malformed relay response: {0}")]
	Malformed(String),
	#[error("Relay returned status {status}: {body}")]
	Status { status: u16, body: String },
	/// The relay answered and refused the request.
	#[error("Relay rejected request: {0}")]
	Rejected(String),
}

impl TransportError {
	/// Network-level failures and server-side errors where a different
	/// worker may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			TransportError::Timeout(_)
			| TransportError::Connection(_)
			| TransportError::Malformed(_) => true,
			TransportError::Status { status, .. } => *status >= 500,
			TransportError::Rejected(_) => false,
		}
	}
}

/// Network API of a relay server.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait RelayServerInterface: Send + Sync {
	/// Fetches the worker's current capability snapshot.
	async fn ping(&self, relay_url: &str) -> Result<PingResponse, TransportError>;

	/// Submits a signed request; returns the raw transaction the worker signed.
	async fn relay(
		&self,
		relay_url: &str,
		request: RelayTransactionRequest,
	) -> Result<Bytes, TransportError>;
}
