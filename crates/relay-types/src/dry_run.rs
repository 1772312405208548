//! Dry-run outcome types.

use serde::{Deserialize, Serialize};

/// Predicted failure of a relay request.
///
/// Each variant carries a human-readable detail. The variants stay distinct
/// so callers can tell a paymaster refusal from a reverting call or an
/// expired request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DryRunRejection {
	#[error("Request is not signed")]
	Unsigned(String),
	#[error("Request expired: {0}")]
	Expired(String),
	#[error("Fee terms outside worker band: {0}")]
	FeeOutOfBand(String),
	#[error("Data too large: {0}")]
	DataTooLarge(String),
	#[error("Paymaster rejected: {0}")]
	PaymasterRejected(String),
	#[error("Forwarder rejected: {0}")]
	ForwarderRejected(String),
	#[error("Call reverted: {0}")]
	CallReverted(String),
	#[error("Simulation failed: {0}")]
	SimulationFailed(String),
}

/// Result of a dry run.
///
/// `view_call_gas_limit` is the gas ceiling computed for the simulated
/// `relayCall`; it is reused by the submission step. A request with a
/// rejection must not be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DryRunResult {
	pub view_call_gas_limit: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rejection: Option<DryRunRejection>,
}

impl DryRunResult {
	pub fn accepted(view_call_gas_limit: u64) -> Self {
		Self {
			view_call_gas_limit,
			rejection: None,
		}
	}

	pub fn rejected(view_call_gas_limit: u64, rejection: DryRunRejection) -> Self {
		Self {
			view_call_gas_limit,
			rejection: Some(rejection),
		}
	}

	pub fn is_viable(&self) -> bool {
		self.rejection.is_none()
	}
}
