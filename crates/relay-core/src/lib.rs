//! Relay client orchestration.
//!
//! This crate ties the chain, the relay server transport and the signer
//! together into the gasless relay flow:
//!
//! 1. select a worker and build a [`RelayRequest`](relay_types::RelayRequest)
//! 2. sign it, possibly through a separate party
//! 3. dry-run the hub's `relayCall` to predict acceptance
//! 4. hand the request to the relay and check the transaction it signed
//! 5. wait for the transaction to be mined
//!
//! [`RelayClient`] exposes these steps as a flat API.

use relay_account::SignerError;
use relay_chain::ChainError;
use relay_transport::TransportError;
use relay_types::TransactionHash;
use thiserror::Error;

pub mod builder;
pub mod client;
pub mod dry_run;
pub mod fees;
pub mod monitoring;
pub mod selection;
pub mod session;
pub mod settings;
pub mod submission;

pub use builder::{build_request, build_request_at, RequestBuilder};
pub use client::{RelayClient, RelayOutcome};
pub use dry_run::DryRunValidator;
pub use fees::{calldata_gas, FeeOracle};
pub use monitoring::ConfirmationWaiter;
pub use selection::{PinnedWorker, PreferredRelays, WorkerSelector};
pub use session::{RelaySession, SessionRegistry, SessionStatus};
pub use settings::RelaySettings;
pub use submission::RelaySubmitter;

/// Errors that can occur during the relay flow.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The request or its inputs failed local validation.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),
	#[error("Relay transport error: {0}")]
	Transport(#[from] TransportError),
	#[error("Signer error: {0}")]
	Signer(#[from] SignerError),
	#[error("No relay worker available: {0}")]
	NoWorkerAvailable(String),
	#[error("Transaction {hash} not mined within {waited_seconds}s")]
	ConfirmationTimeout {
		hash: TransactionHash,
		waited_seconds: u64,
	},
	#[error("Session not found: {0}")]
	SessionNotFound(String),
	#[error("Invalid session state: {0}")]
	InvalidState(String),
	#[error("Configuration error: {0}")]
	Config(String),
}

impl RelayError {
	/// Whether the flow may succeed if repeated, possibly with another worker.
	pub fn is_retryable(&self) -> bool {
		match self {
			RelayError::Chain(e) => e.is_retryable(),
			RelayError::Transport(e) => e.is_transient(),
			RelayError::NoWorkerAvailable(_) => true,
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retryable_classification() {
		assert!(RelayError::Chain(ChainError::Timeout("eth_call".into())).is_retryable());
		assert!(!RelayError::Chain(ChainError::Reverted("nope".into())).is_retryable());
		assert!(RelayError::Transport(TransportError::Connection("refused".into())).is_retryable());
		assert!(!RelayError::Transport(TransportError::Rejected("no".into())).is_retryable());
		assert!(!RelayError::InvalidRequest("bad".into()).is_retryable());
		assert!(RelayError::NoWorkerAvailable("none ready".into()).is_retryable());
	}
}
