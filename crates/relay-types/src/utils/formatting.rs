//! String formatting helpers for hashes and addresses in logs.

/// Shortens a hex identifier for log output.
///
/// Keeps the first 8 characters and appends ".." to anything longer.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Ensures a hex string carries a "0x" prefix.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Joins a relay server base URL with an endpoint path.
///
/// Relay URLs are frequently advertised with a trailing slash
/// (`https://relay.example/`), so the base is trimmed before joining.
pub fn join_url(base: &str, path: &str) -> String {
	format!(
		"{}/{}",
		base.trim_end_matches('/'),
		path.trim_start_matches('/')
	)
}
