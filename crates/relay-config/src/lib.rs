//! Configuration for the gasless relay client.
//!
//! Configuration is read from TOML. String values may reference environment
//! variables with `${VAR}` or `${VAR:-default}`, which keeps signing keys
//! out of the files themselves.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["network.toml", "workers.toml"]` in the main file
//! - Each top-level section must be unique across all files

mod loader;

use alloy_primitives::{Address, Bytes};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Client identity and request policy.
	pub relay: RelayConfig,
	/// Chain endpoint and protocol contracts.
	pub network: NetworkConfig,
	/// How relay workers are chosen.
	pub workers: WorkersConfig,
	#[serde(default)]
	pub timeouts: TimeoutsConfig,
	/// Signer implementations.
	pub account: AccountConfig,
	/// HTTP API for the submitting party.
	pub api: Option<ApiConfig>,
}

/// Client identity and request policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	pub id: String,
	pub chain_id: u64,
	/// EIP-712 domain name the forwarder was registered with.
	#[serde(default = "default_domain_separator_name")]
	pub domain_separator_name: String,
	#[serde(default = "default_domain_version")]
	pub domain_version: String,
	/// Seconds a freshly built request stays valid.
	#[serde(default = "default_request_valid_seconds")]
	pub request_valid_seconds: u64,
	/// Paymaster data length budgeted for when pricing calldata.
	#[serde(default)]
	pub max_paymaster_data_length: usize,
	/// Approval data length budgeted for when pricing calldata.
	#[serde(default)]
	pub max_approval_data_length: usize,
	/// Markup applied to the network fee estimate, in percent.
	#[serde(default = "default_gas_price_factor_percent")]
	pub gas_price_factor_percent: u64,
	/// Floor for the priority fee, in wei.
	#[serde(default = "default_min_max_priority_fee_per_gas")]
	pub min_max_priority_fee_per_gas: u64,
	/// Largest gap between the worker's current nonce and the nonce of the
	/// relayed transaction the client accepts.
	#[serde(default = "default_max_relay_nonce_gap")]
	pub max_relay_nonce_gap: u64,
	/// Gas the relay hub spends around the relayed call.
	#[serde(default = "default_relay_hub_gas_overhead")]
	pub relay_hub_gas_overhead: u64,
	#[serde(default = "default_client_id")]
	pub client_id: u64,
	/// Token the paymaster charges fees in, if any.
	pub fee_token: Option<FeeTokenConfig>,
}

/// Token-charging paymaster settings used by the dry run allowance check.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeeTokenConfig {
	pub address: Address,
	/// Minimum allowance from the user to the paymaster, in token base units.
	pub min_allowance: u64,
}

fn default_domain_separator_name() -> String {
	"GSN Relayed Transaction".to_string()
}

fn default_domain_version() -> String {
	"3".to_string()
}

fn default_request_valid_seconds() -> u64 {
	60 * 60 * 24
}

fn default_gas_price_factor_percent() -> u64 {
	20
}

fn default_min_max_priority_fee_per_gas() -> u64 {
	1_000_000_000
}

fn default_max_relay_nonce_gap() -> u64 {
	3
}

fn default_relay_hub_gas_overhead() -> u64 {
	50_000
}

fn default_client_id() -> u64 {
	1
}

/// Chain endpoint and protocol contract addresses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub rpc_url: String,
	pub relay_hub: Address,
	pub forwarder: Address,
	pub paymaster: Address,
	/// Opaque data passed to the paymaster, hex encoded.
	#[serde(default)]
	pub paymaster_data: Bytes,
}

/// Worker selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerSelection {
	/// Always use the configured worker.
	Pinned,
	/// Ping the preferred relays in order and take the first usable one.
	Preferred,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
	pub selection: WorkerSelection,
	pub pinned: Option<PinnedWorkerConfig>,
	#[serde(default)]
	pub preferred_relays: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinnedWorkerConfig {
	pub url: String,
	/// Worker address the relay is expected to advertise.
	pub worker: Option<Address>,
}

/// Network timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutsConfig {
	#[serde(default = "default_http_seconds")]
	pub http_seconds: u64,
	#[serde(default = "default_ping_seconds")]
	pub ping_seconds: u64,
	#[serde(default = "default_confirmation_seconds")]
	pub confirmation_seconds: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// How long `GET /api/requests/{id}/signature` is held open; must fit
	/// within `api.timeout_seconds`.
	#[serde(default = "default_signature_wait_seconds")]
	pub signature_wait_seconds: u64,
}

impl Default for TimeoutsConfig {
	fn default() -> Self {
		Self {
			http_seconds: default_http_seconds(),
			ping_seconds: default_ping_seconds(),
			confirmation_seconds: default_confirmation_seconds(),
			poll_interval_ms: default_poll_interval_ms(),
			signature_wait_seconds: default_signature_wait_seconds(),
		}
	}
}

impl TimeoutsConfig {
	pub fn http(&self) -> Duration {
		Duration::from_secs(self.http_seconds)
	}

	pub fn ping(&self) -> Duration {
		Duration::from_secs(self.ping_seconds)
	}

	pub fn confirmation(&self) -> Duration {
		Duration::from_secs(self.confirmation_seconds)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn signature_wait(&self) -> Duration {
		Duration::from_secs(self.signature_wait_seconds)
	}
}

fn default_http_seconds() -> u64 {
	30
}

fn default_ping_seconds() -> u64 {
	10
}

fn default_confirmation_seconds() -> u64 {
	300
}

fn default_poll_interval_ms() -> u64 {
	2_000
}

fn default_signature_wait_seconds() -> u64 {
	20
}

/// Signer implementations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Implementation name to its raw TOML configuration.
	pub implementations: HashMap<String, toml::Value>,
}

/// HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Upper bound on request handling time, in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// Resolves `${VAR}` and `${VAR:-default}` references.
///
/// Input is limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					name.as_str()
				)))
			},
		};
		resolved.push_str(&input[last..whole.start()]);
		resolved.push_str(&value);
		last = whole.end();
	}
	resolved.push_str(&input[last..]);

	Ok(resolved)
}

fn require_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
	if url.starts_with("http://") || url.starts_with("https://") {
		Ok(())
	} else {
		Err(ConfigError::Validation(format!(
			"{} '{}' must be an http(s) URL",
			field, url
		)))
	}
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let relay = &self.relay;
		if relay.id.trim().is_empty() {
			return Err(ConfigError::Validation("Relay client id cannot be empty".into()));
		}
		if relay.chain_id == 0 {
			return Err(ConfigError::Validation("relay.chain_id must be non-zero".into()));
		}
		if relay.domain_separator_name.is_empty() || relay.domain_version.is_empty() {
			return Err(ConfigError::Validation(
				"EIP-712 domain name and version cannot be empty".into(),
			));
		}
		if relay.request_valid_seconds == 0 {
			return Err(ConfigError::Validation(
				"request_valid_seconds must be greater than 0".into(),
			));
		}
		if relay.gas_price_factor_percent > 1_000 {
			return Err(ConfigError::Validation(
				"gas_price_factor_percent cannot exceed 1000".into(),
			));
		}
		if relay.max_relay_nonce_gap == 0 {
			return Err(ConfigError::Validation(
				"max_relay_nonce_gap must be at least 1".into(),
			));
		}

		require_http_url("network.rpc_url", &self.network.rpc_url)?;
		if self.network.paymaster_data.len() > relay.max_paymaster_data_length {
			return Err(ConfigError::Validation(format!(
				"network.paymaster_data is {} bytes but max_paymaster_data_length is {}",
				self.network.paymaster_data.len(),
				relay.max_paymaster_data_length
			)));
		}

		match self.workers.selection {
			WorkerSelection::Pinned => {
				let pinned = self.workers.pinned.as_ref().ok_or_else(|| {
					ConfigError::Validation(
						"workers.selection = \"pinned\" requires a [workers.pinned] section".into(),
					)
				})?;
				require_http_url("workers.pinned.url", &pinned.url)?;
			},
			WorkerSelection::Preferred => {
				if self.workers.preferred_relays.is_empty() {
					return Err(ConfigError::Validation(
						"workers.selection = \"preferred\" requires preferred_relays".into(),
					));
				}
				for url in &self.workers.preferred_relays {
					require_http_url("workers.preferred_relays", url)?;
				}
			},
		}

		let timeouts = &self.timeouts;
		if timeouts.http_seconds == 0
			|| timeouts.ping_seconds == 0
			|| timeouts.confirmation_seconds == 0
			|| timeouts.poll_interval_ms == 0
			|| timeouts.signature_wait_seconds == 0
		{
			return Err(ConfigError::Validation("Timeouts must be greater than 0".into()));
		}
		if timeouts.poll_interval() >= timeouts.confirmation() {
			return Err(ConfigError::Validation(
				"poll_interval_ms must be shorter than confirmation_seconds".into(),
			));
		}
		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if timeouts.signature_wait_seconds >= api.timeout_seconds {
				return Err(ConfigError::Validation(format!(
					"timeouts.signature_wait_seconds ({}) must be shorter than api.timeout_seconds ({})",
					timeouts.signature_wait_seconds, api.timeout_seconds
				)));
			}
		}

		if self.account.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one account implementation required".into(),
			));
		}
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		Ok(())
	}
}

/// Parses TOML, resolving environment variables first and validating after.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
