//! Factory registry for signer implementations and client wiring.
//!
//! Signers are chosen by name from `[account.implementations]`; the chain
//! and relay collaborators are built from `[network]` and `[timeouts]`.

use relay_account::{RelaySigner, SignerFactory};
use relay_chain::{AlloyChain, ChainInterface};
use relay_config::Config;
use relay_core::RelayClient;
use relay_transport::HttpRelayServer;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Global registry of implementation factories.
pub struct FactoryRegistry {
	pub signers: HashMap<String, SignerFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			signers: HashMap::new(),
		}
	}

	pub fn register_signer(&mut self, name: impl Into<String>, factory: SignerFactory) {
		self.signers.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Initialize the global registry with all available implementations
pub fn initialize_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in relay_account::get_all_implementations() {
			tracing::debug!("Registering signer implementation: {}", name);
			registry.register_signer(name, factory);
		}

		registry
	})
}

/// Builds the primary signer named in `[account]`.
pub fn build_signer(config: &Config) -> Result<RelaySigner, Box<dyn std::error::Error>> {
	let registry = initialize_registry();
	let name = &config.account.primary;

	let factory = registry.signers.get(name).ok_or_else(|| {
		let mut available: Vec<_> = registry.signers.keys().cloned().collect();
		available.sort();
		format!(
			"Unknown signer implementation '{}'. Available: [{}]",
			name,
			available.join(", ")
		)
	})?;
	let table = config
		.account
		.implementations
		.get(name)
		.ok_or_else(|| format!("Missing [account.implementations.{}] section", name))?;

	Ok(factory(table)?)
}

/// Connects to the configured chain and relay servers.
///
/// Fails when the RPC endpoint serves a different chain than `relay.chain_id`.
pub async fn build_client(config: &Config) -> Result<RelayClient, Box<dyn std::error::Error>> {
	let chain = AlloyChain::new(&config.network.rpc_url, config.timeouts.http())?;
	let chain_id = chain.chain_id().await?;
	if chain_id != config.relay.chain_id {
		return Err(format!(
			"RPC endpoint serves chain {} but relay.chain_id is {}",
			chain_id, config.relay.chain_id
		)
		.into());
	}

	let server = HttpRelayServer::new(config.timeouts.ping(), config.timeouts.http())?;
	tracing::info!(
		chain_id,
		relay_hub = %config.network.relay_hub,
		selection = ?config.workers.selection,
		"Connected relay client"
	);

	Ok(RelayClient::from_config(
		config,
		Arc::new(chain),
		Arc::new(server),
	)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use std::str::FromStr;

	const CONFIG: &str = r#"
[relay]
id = "relay-service-test"
chain_id = 80001

[network]
rpc_url = "http://localhost:8545"
relay_hub = "0x3232f21A6E08312654270c78A773f00dd61d60f5"
forwarder = "0xB2b5841DBeF766d4b521221732F9B618fCf34A87"
paymaster = "0x1111111111111111111111111111111111111111"

[workers]
selection = "preferred"
preferred_relays = ["https://relay.example/gsn1/"]

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
[account.implementations.deferred]
"#;

	#[test]
	fn test_registry_holds_all_signers() {
		let registry = initialize_registry();
		assert!(registry.signers.contains_key("local"));
		assert!(registry.signers.contains_key("deferred"));
	}

	#[tokio::test]
	async fn test_build_primary_signer() {
		let mut config = Config::from_str(CONFIG).unwrap();
		let signer = build_signer(&config).unwrap();
		assert!(!signer.is_deferred());
		assert_eq!(
			signer.address().await.unwrap(),
			Some(address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
		);

		config.account.primary = "deferred".to_string();
		assert!(build_signer(&config).unwrap().is_deferred());
	}

	#[test]
	fn test_unknown_signer_lists_available() {
		let mut config = Config::from_str(CONFIG).unwrap();
		config.account.primary = "kms".to_string();
		config
			.account
			.implementations
			.insert("kms".to_string(), toml::Value::Table(toml::map::Map::new()));

		let err = build_signer(&config).unwrap_err().to_string();
		assert!(err.contains("Unknown signer implementation 'kms'"));
		assert!(err.contains("deferred, local"));
	}
}
