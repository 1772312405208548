//! Relay sessions for the two-party signing flow.
//!
//! A session holds a prepared request while its signature is collected from
//! the user. Each session owns a [`DeferredSigner`]; the signature is
//! injected there and read back through the signer, so the request is only
//! ever completed with a signature that passed the signer's checks.
//!
//! A session moves to `relaying` under the registry lock as soon as its
//! signature is accepted, so a request is handed to a relay at most once.
//! Only a failure that never reached the relay reopens it for signing.
//! Confirmed and failed sessions are final.
//!
//! Sessions live in memory and are lost on restart.

use crate::RelayError;
use alloy_primitives::{Bytes, B256, U256};
use relay_account::{DeferredSigner, RelaySigner};
use relay_types::{
	current_timestamp, RelayRequest, RelayWorkerInfo, TransactionHash, TransactionReceipt,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
	AwaitingSignature,
	/// Signature accepted; the request is being dry-run and relayed.
	Relaying,
	Submitted { hash: TransactionHash },
	Confirmed { receipt: TransactionReceipt },
	Failed { reason: String },
}

impl SessionStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, SessionStatus::Confirmed { .. } | SessionStatus::Failed { .. })
	}
}

#[derive(Debug, Clone)]
pub struct RelaySession {
	pub id: Uuid,
	/// The prepared request; signed once the signature arrives.
	pub request: RelayRequest,
	pub worker: RelayWorkerInfo,
	/// EIP-712 digest the user must sign.
	pub signing_hash: B256,
	pub signer: DeferredSigner,
	pub status: SessionStatus,
	pub created_at: u64,
}

/// In-memory store of relay sessions.
#[derive(Default)]
pub struct SessionRegistry {
	sessions: RwLock<HashMap<Uuid, RelaySession>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a prepared request awaiting the signature of `request.from`.
	pub async fn create(
		&self,
		request: RelayRequest,
		worker: RelayWorkerInfo,
		signing_hash: B256,
	) -> RelaySession {
		let session = RelaySession {
			id: Uuid::new_v4(),
			signer: DeferredSigner::new(Some(request.request.from)),
			request,
			worker,
			signing_hash,
			status: SessionStatus::AwaitingSignature,
			created_at: current_timestamp(),
		};
		self.sessions
			.write()
			.await
			.insert(session.id, session.clone());
		tracing::debug!(session = %session.id, "Created relay session");
		session
	}

	pub async fn get(&self, id: &Uuid) -> Option<RelaySession> {
		self.sessions.read().await.get(id).cloned()
	}

	/// Injects the user's signature and returns the signed session, now
	/// `relaying`.
	///
	/// The signature must recover to the request's `from`; otherwise the
	/// session stays awaiting a signature and its signer is left untouched.
	pub async fn submit_signature(
		&self,
		id: &Uuid,
		signature: Bytes,
	) -> Result<RelaySession, RelayError> {
		let mut sessions = self.sessions.write().await;
		let session = sessions
			.get_mut(id)
			.ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

		if session.status != SessionStatus::AwaitingSignature {
			return Err(RelayError::InvalidState(format!(
				"session {} is not awaiting a signature",
				id
			)));
		}

		// Checked on a scratch signer so a refused signature never reaches
		// the session's signer or its waiters.
		let candidate =
			RelaySigner::deferred(DeferredSigner::new(Some(session.request.request.from)));
		candidate.provide_signature(signature)?;
		let signature = candidate.sign(&session.signing_hash).await?;

		let mut request = session.request.clone();
		request
			.attach_signature(signature.clone())
			.map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
		session.signer.provide_signature(signature)?;
		session.request = request;
		session.status = SessionStatus::Relaying;

		tracing::info!(session = %id, "Signature received");
		Ok(session.clone())
	}

	/// Returns a `relaying` session to `awaiting_signature` after a failure
	/// that happened before the relay was contacted.
	pub async fn reopen(&self, id: &Uuid) -> Result<(), RelayError> {
		let mut sessions = self.sessions.write().await;
		let session = sessions
			.get_mut(id)
			.ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;
		if session.status != SessionStatus::Relaying {
			return Err(RelayError::InvalidState(format!(
				"session {} is not relaying",
				id
			)));
		}
		session.status = SessionStatus::AwaitingSignature;
		tracing::debug!(session = %id, "Session reopened for signing");
		Ok(())
	}

	/// Records the progress of a relayed request.
	///
	/// Terminal statuses are never overwritten, and a session only returns
	/// to `awaiting_signature` through [`SessionRegistry::reopen`].
	pub async fn update_status(&self, id: &Uuid, status: SessionStatus) -> Result<(), RelayError> {
		let mut sessions = self.sessions.write().await;
		let session = sessions
			.get_mut(id)
			.ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;
		if session.status.is_terminal() && session.status != status {
			return Err(RelayError::InvalidState(format!(
				"session {} already finished",
				id
			)));
		}
		if status == SessionStatus::AwaitingSignature {
			return Err(RelayError::InvalidState(format!(
				"session {} can only be reopened from relaying",
				id
			)));
		}
		tracing::debug!(session = %id, status = ?status, "Session status changed");
		session.status = status;
		Ok(())
	}

	/// Waits up to `timeout` for the session's signature to be accepted.
	///
	/// Resolves at once when the session already holds one.
	pub async fn wait_for_signature(
		&self,
		id: &Uuid,
		timeout: Duration,
	) -> Result<Bytes, RelayError> {
		let signer = self
			.sessions
			.read()
			.await
			.get(id)
			.map(|session| session.signer.clone())
			.ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;
		Ok(signer.wait_for_signature(timeout).await?)
	}

	/// Drops sessions still awaiting a signature after their request expired.
	pub async fn prune_expired(&self, now: u64) -> usize {
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();
		sessions.retain(|_, session| {
			session.status != SessionStatus::AwaitingSignature
				|| session.request.request.valid_until_time > U256::from(now)
		});
		before - sessions.len()
	}

	pub async fn len(&self) -> usize {
		self.sessions.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.sessions.read().await.is_empty()
	}
}
