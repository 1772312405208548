//! Main entry point for the gasless relay client.
//!
//! `serve` runs the HTTP API used by the party that prepares and relays
//! requests. `sign` is the user's side of the detached signing flow, and
//! `send` relays one call end to end with a locally held key.

use alloy_primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};
use relay_account::{LocalSigner, SignerInterface};
use relay_config::Config;
use relay_core::RelayOutcome;
use relay_types::{
	CallDetails, Confirmation, RelayDomain, RelayRequest, RelayingAttemptResult, SecretString,
};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the relay client.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run the HTTP API (default)
	Serve,
	/// Relay a single call signed by the configured live signer
	Send {
		/// Target contract
		#[arg(long)]
		to: Address,
		/// Calldata as 0x-prefixed hex
		#[arg(long, default_value = "0x")]
		data: String,
		/// Gas for the inner call; estimated when omitted
		#[arg(long)]
		gas: Option<u64>,
		/// Return after the relay accepts the request
		#[arg(long)]
		no_wait: bool,
	},
	/// Sign a prepared request as its sender
	Sign {
		/// JSON file holding the prepared `request` and its `domain`
		#[arg(long)]
		request: PathBuf,
		/// Key of the request's sender
		#[arg(long, env = "RELAY_USER_PRIVATE_KEY", hide_env_values = true)]
		private_key: SecretString,
	},
}

/// The parts of a prepared request the user needs to sign it.
#[derive(Debug, Deserialize)]
struct PreparedRequest {
	request: RelayRequest,
	domain: RelayDomain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	match args.command.unwrap_or(Command::Serve) {
		Command::Serve => serve(&args.config).await,
		Command::Send {
			to,
			data,
			gas,
			no_wait,
		} => {
			let data: Bytes = data
				.parse()
				.map_err(|e| format!("Invalid calldata '{}': {}", data, e))?;
			send(&args.config, to, data, gas, no_wait).await
		},
		Command::Sign {
			request,
			private_key,
		} => sign(&request, &private_key).await,
	}
}

async fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
	let path = path
		.to_str()
		.ok_or_else(|| format!("Config path {:?} is not valid UTF-8", path))?;
	let config = Config::from_file(path).await?;
	tracing::info!("Loaded configuration [{}]", config.relay.id);
	Ok(config)
}

async fn serve(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(config_path).await?;
	let api_config = config
		.api
		.clone()
		.filter(|api| api.enabled)
		.ok_or("The API is disabled; set [api] enabled = true to serve")?;

	let client = factory_registry::build_client(&config).await?;
	let state = server::AppState::new(
		client,
		config.timeouts.confirmation(),
		config.timeouts.signature_wait(),
	);

	tokio::select! {
		result = server::start_server(api_config, state) => {
			tracing::info!("API server finished");
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Shutting down");
		}
	}
	Ok(())
}

async fn send(
	config_path: &Path,
	to: Address,
	data: Bytes,
	gas: Option<u64>,
	no_wait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let config = load_config(config_path).await?;
	let signer = factory_registry::build_signer(&config)?;
	if signer.is_deferred() {
		return Err("send needs a live signer; use the API for detached signing".into());
	}
	let from = signer
		.address()
		.await?
		.ok_or("The configured signer has no address")?;

	let client = factory_registry::build_client(&config).await?;
	let call = CallDetails {
		from: from.to_string(),
		to: to.to_string(),
		data,
		value: None,
		gas: gas.map(U256::from),
	};

	let worker = client.select_worker().await?;
	let mut request = client.prepare_request(&call, None, &worker).await?;
	client.sign_request(&mut request, &signer).await?;
	let outcome = client.relay_signed(&request, &worker).await?;
	println!("{}", serde_json::to_string_pretty(&outcome)?);

	let tx = match outcome {
		RelayOutcome::Attempted(RelayingAttemptResult::Transaction(tx)) => tx,
		RelayOutcome::Attempted(RelayingAttemptResult::Error(e)) => {
			return Err(format!("Relay attempt failed: {}", e.message).into())
		},
		RelayOutcome::DryRunRejected(rejection) => {
			return Err(format!("Dry run rejected the request: {}", rejection).into())
		},
	};
	if no_wait {
		return Ok(());
	}

	let cancel = async {
		let _ = tokio::signal::ctrl_c().await;
	};
	match client
		.wait_for_confirmation_until(tx.hash, config.timeouts.confirmation(), cancel)
		.await?
	{
		Confirmation::Mined(receipt) => {
			println!("{}", serde_json::to_string_pretty(&receipt)?);
			if !receipt.success {
				return Err(format!("Transaction {} reverted", receipt.hash).into());
			}
		},
		Confirmation::Cancelled => {
			tracing::warn!(tx_hash = %tx.hash, "Stopped waiting; the transaction may still be mined");
		},
	}
	Ok(())
}

/// Signs a prepared request file and prints the body for the signature
/// endpoint.
async fn sign(
	request_path: &Path,
	private_key: &SecretString,
) -> Result<(), Box<dyn std::error::Error>> {
	let contents = tokio::fs::read_to_string(request_path).await?;
	let prepared: PreparedRequest = serde_json::from_str(&contents)?;
	let signer = LocalSigner::new(private_key)?;

	if signer.signer_address() != prepared.request.request.from {
		return Err(format!(
			"Key belongs to {} but the request is from {}",
			signer.signer_address(),
			prepared.request.request.from
		)
		.into());
	}

	let hash = prepared.request.signing_hash(&prepared.domain);
	let signature = signer.sign_hash(&hash).await?;
	println!(
		"{}",
		serde_json::to_string_pretty(&json!({
			"signature": signature,
			"signer": signer.signer_address(),
		}))?
	);
	Ok(())
}
