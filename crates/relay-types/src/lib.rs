//! Common types for the gasless relay client.
//!
//! This crate defines the data model shared by every other crate in the
//! workspace: the relay request that the user signs, the worker and
//! paymaster snapshots used to validate it, and the outcomes of the dry run,
//! the relay attempt and confirmation tracking.

/// Transaction hashes, receipts and confirmation outcomes.
pub mod delivery;
/// Dry-run outcome types.
pub mod dry_run;
/// Paymaster gas and data limits.
pub mod limits;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Relay wire types and relaying attempt outcomes.
pub mod relay;
/// The relay request model and its EIP-712 signing hash.
pub mod request;
/// Secret string wrapper for private keys.
pub mod secret_string;
/// Utility functions for formatting, hashing and serialization.
pub mod utils;
/// Configuration validation types.
pub mod validation;
/// Relay worker snapshots.
pub mod worker;

pub use delivery::*;
pub use dry_run::*;
pub use limits::*;
pub use registry::ImplementationRegistry;
pub use relay::*;
pub use request::*;
pub use secret_string::SecretString;
pub use utils::{current_timestamp, join_url, truncate_id, with_0x_prefix};
pub use validation::*;
pub use worker::*;
