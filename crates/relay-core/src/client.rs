//! The flat relay client API.

use crate::builder::RequestBuilder;
use crate::dry_run::DryRunValidator;
use crate::fees::FeeOracle;
use crate::monitoring::ConfirmationWaiter;
use crate::selection::{PinnedWorker, PreferredRelays, WorkerSelector};
use crate::submission::RelaySubmitter;
use crate::{RelayError, RelaySettings};
use alloy_primitives::B256;
use relay_account::RelaySigner;
use relay_chain::ChainInterface;
use relay_config::{Config, WorkerSelection};
use relay_transport::RelayServerInterface;
use relay_types::{
	CallDetails, Confirmation, DataLengthLimits, DryRunRejection, DryRunResult, FeeTerms,
	GasAndDataLimits, PingResponse, RelayDomain, RelayRequest, RelayWorkerInfo,
	RelayingAttemptResult, TransactionHash,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Result of [`RelayClient::relay_signed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RelayOutcome {
	/// The dry run predicted failure; nothing was sent.
	DryRunRejected(DryRunRejection),
	Attempted(RelayingAttemptResult),
}

/// Relay client over a chain, a relay transport and a worker selector.
pub struct RelayClient {
	settings: Arc<RelaySettings>,
	server: Arc<dyn RelayServerInterface>,
	selector: Arc<dyn WorkerSelector>,
	fees: Arc<FeeOracle>,
	builder: RequestBuilder,
	dry_run: DryRunValidator,
	submitter: RelaySubmitter,
	waiter: ConfirmationWaiter,
}

impl RelayClient {
	pub fn new(
		settings: RelaySettings,
		chain: Arc<dyn ChainInterface>,
		server: Arc<dyn RelayServerInterface>,
		selector: Arc<dyn WorkerSelector>,
	) -> Self {
		let settings = Arc::new(settings);
		let fees = Arc::new(FeeOracle::new(chain.clone(), settings.clone()));
		Self {
			builder: RequestBuilder::new(chain.clone(), fees.clone(), settings.clone()),
			dry_run: DryRunValidator::new(chain.clone(), settings.clone()),
			submitter: RelaySubmitter::new(chain.clone(), server.clone(), settings.clone()),
			waiter: ConfirmationWaiter::new(chain, settings.poll_interval),
			fees,
			selector,
			server,
			settings,
		}
	}

	/// Builds a client with the worker selection policy named in `config`.
	pub fn from_config(
		config: &Config,
		chain: Arc<dyn ChainInterface>,
		server: Arc<dyn RelayServerInterface>,
	) -> Result<Self, RelayError> {
		let settings = RelaySettings::from_config(config);
		let selector: Arc<dyn WorkerSelector> = match config.workers.selection {
			WorkerSelection::Pinned => {
				let pinned = config.workers.pinned.as_ref().ok_or_else(|| {
					RelayError::Config("pinned selection without [workers.pinned]".into())
				})?;
				Arc::new(PinnedWorker::new(server.clone(), pinned.url.clone(), pinned.worker))
			},
			WorkerSelection::Preferred => Arc::new(PreferredRelays::new(
				server.clone(),
				config.workers.preferred_relays.clone(),
				settings.chain_id,
				settings.relay_hub,
			)),
		};
		Ok(Self::new(settings, chain, server, selector))
	}

	pub fn settings(&self) -> &RelaySettings {
		&self.settings
	}

	pub fn domain(&self) -> RelayDomain {
		self.settings.domain()
	}

	pub fn signing_hash(&self, request: &RelayRequest) -> B256 {
		request.signing_hash(&self.settings.domain())
	}

	pub async fn select_worker(&self) -> Result<RelayWorkerInfo, RelayError> {
		self.selector.select_worker().await
	}

	/// Re-pings the relay behind `worker`.
	pub async fn refresh_worker(
		&self,
		worker: &RelayWorkerInfo,
	) -> Result<RelayWorkerInfo, RelayError> {
		let ping = self.server.ping(worker.relay_url()).await?;
		let mut refreshed = worker.clone();
		refreshed.ping_response = ping;
		Ok(refreshed)
	}

	pub async fn prepare_request(
		&self,
		call: &CallDetails,
		fees: Option<FeeTerms>,
		worker: &RelayWorkerInfo,
	) -> Result<RelayRequest, RelayError> {
		self.builder.prepare_request(call, fees, worker).await
	}

	pub fn estimate_calldata_cost(&self, request: &RelayRequest, limits: DataLengthLimits) -> u64 {
		self.fees.estimate_calldata_cost(request, limits)
	}

	/// Limits of the configured paymaster.
	pub async fn get_gas_and_data_limits(&self) -> Result<GasAndDataLimits, RelayError> {
		self.fees
			.get_gas_and_data_limits(self.settings.paymaster)
			.await
	}

	pub async fn verify_dry_run(
		&self,
		request: &RelayRequest,
		limits: &GasAndDataLimits,
		worker: Option<&PingResponse>,
	) -> Result<DryRunResult, RelayError> {
		self.dry_run.verify_dry_run(request, limits, worker).await
	}

	pub async fn attempt_relay(
		&self,
		worker: &RelayWorkerInfo,
		request: &RelayRequest,
		view_call_gas_limit: u64,
	) -> RelayingAttemptResult {
		self.submitter
			.attempt_relay(worker, request, view_call_gas_limit)
			.await
	}

	pub async fn wait_for_confirmation(
		&self,
		hash: TransactionHash,
		timeout: Duration,
	) -> Result<Confirmation, RelayError> {
		self.waiter.wait_for_confirmation(hash, timeout).await
	}

	pub async fn wait_for_confirmation_until<C>(
		&self,
		hash: TransactionHash,
		timeout: Duration,
		cancel: C,
	) -> Result<Confirmation, RelayError>
	where
		C: Future<Output = ()> + Send,
	{
		self.waiter
			.wait_for_confirmation_until(hash, timeout, cancel)
			.await
	}

	/// Signs `request` with `signer` and checks the signature recovers to
	/// `request.from`.
	///
	/// A deferred signer only succeeds once its signature has been provided.
	#[instrument(skip_all, fields(from = %request.request.from))]
	pub async fn sign_request(
		&self,
		request: &mut RelayRequest,
		signer: &RelaySigner,
	) -> Result<(), RelayError> {
		let hash = self.signing_hash(request);
		let signature = signer.sign(&hash).await?;

		let mut signed = request.clone();
		signed
			.attach_signature(signature)
			.map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
		signed
			.verify_signature(&self.settings.domain())
			.map_err(|e| RelayError::InvalidRequest(e.to_string()))?;

		*request = signed;
		tracing::debug!("Request signed");
		Ok(())
	}

	/// Dry-runs a signed request and, if viable, makes one relay attempt.
	#[instrument(skip_all, fields(relay_url = %worker.relay_url()))]
	pub async fn relay_signed(
		&self,
		request: &RelayRequest,
		worker: &RelayWorkerInfo,
	) -> Result<RelayOutcome, RelayError> {
		let limits = self.get_gas_and_data_limits().await?;
		let dry_run = self
			.verify_dry_run(request, &limits, Some(&worker.ping_response))
			.await?;
		if let Some(rejection) = dry_run.rejection {
			return Ok(RelayOutcome::DryRunRejected(rejection));
		}

		let attempt = self
			.attempt_relay(worker, request, dry_run.view_call_gas_limit)
			.await;
		Ok(RelayOutcome::Attempted(attempt))
	}
}
