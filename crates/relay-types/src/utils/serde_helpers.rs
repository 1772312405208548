//! Serde adapters for the relay server wire format.
//!
//! Relay servers exchange every numeric field as a decimal string
//! (`"2010000002"`), including values that fit comfortably in a `u64`.
//! Hex strings (`"0x..."`) are accepted on input for robustness against
//! servers that emit quantities the JSON-RPC way.

use alloy_primitives::U256;
use serde::de::Error;

fn parse_u256(s: &str) -> Result<U256, String> {
	let trimmed = s.trim();
	if let Some(hex) = trimmed
		.strip_prefix("0x")
		.or_else(|| trimmed.strip_prefix("0X"))
	{
		U256::from_str_radix(hex, 16).map_err(|e| format!("invalid hex quantity '{}': {}", s, e))
	} else {
		U256::from_str_radix(trimmed, 10)
			.map_err(|e| format!("invalid decimal quantity '{}': {}", s, e))
	}
}

/// `U256` as a decimal string.
pub mod u256_string {
	use super::*;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		parse_u256(&s).map_err(D::Error::custom)
	}
}

/// `u128` as a decimal string. Used for fee values.
pub mod u128_string {
	use super::*;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		let value = parse_u256(&s).map_err(D::Error::custom)?;
		u128::try_from(value).map_err(|_| D::Error::custom(format!("'{}' overflows u128", s)))
	}
}

/// `u64` accepting either a JSON number or a decimal string.
pub mod u64_flexible {
	use super::*;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum NumberOrString {
		Number(u64),
		String(String),
	}

	pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
	where
		D: Deserializer<'de>,
	{
		match NumberOrString::deserialize(deserializer)? {
			NumberOrString::Number(n) => Ok(n),
			NumberOrString::String(s) => {
				let value = parse_u256(&s).map_err(D::Error::custom)?;
				u64::try_from(value).map_err(|_| D::Error::custom(format!("'{}' overflows u64", s)))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::{Deserialize, Serialize};

	#[derive(Serialize, Deserialize, Debug, PartialEq)]
	struct Sample {
		#[serde(with = "u256_string")]
		big: U256,
		#[serde(with = "u128_string")]
		fee: u128,
		#[serde(with = "u64_flexible")]
		id: u64,
	}

	#[test]
	fn test_decimal_strings_on_the_wire() {
		let sample = Sample {
			big: U256::from(285252u64),
			fee: 2_010_000_002,
			id: 80001,
		};
		let json = serde_json::to_value(&sample).unwrap();
		assert_eq!(json["big"], "285252");
		assert_eq!(json["fee"], "2010000002");
		assert_eq!(json["id"], "80001");
	}

	#[test]
	fn test_accepts_hex_and_numbers() {
		let parsed: Sample =
			serde_json::from_str(r#"{"big":"0x10","fee":"15","id":80001}"#).unwrap();
		assert_eq!(parsed.big, U256::from(16u64));
		assert_eq!(parsed.fee, 15);
		assert_eq!(parsed.id, 80001);
	}

	#[test]
	fn test_rejects_garbage() {
		let result: Result<Sample, _> =
			serde_json::from_str(r#"{"big":"ten","fee":"15","id":"1"}"#);
		assert!(result.is_err());
	}
}
