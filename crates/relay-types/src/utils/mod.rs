//! Utility functions shared across the relay client.

pub mod eip712;
pub mod formatting;
pub mod helpers;
pub mod serde_helpers;

pub use eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DOMAIN_TYPE, RELAY_DATA_TYPE,
	RELAY_REQUEST_TYPE,
};
pub use formatting::{join_url, truncate_id, with_0x_prefix};
pub use helpers::current_timestamp;
