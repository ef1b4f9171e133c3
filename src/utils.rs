//! Utility functions shared by the tools and handlers

use ethers::types::U256;
use ethers::utils::{format_ether, format_units};
use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};

use crate::jsonrpc::protocol::RpcError;
use crate::tools::ToolError;

/// Extracts a required argument from a tool's JSON arguments.
pub fn required_arg<T: DeserializeOwned>(args: &Value, key: &str) -> Result<T, ToolError> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null))
        .map_err(|_| ToolError::Failed(format!("Missing or invalid required argument: '{}'", key)))
}

/// Extracts an optional argument, treating `null` and empty strings as absent.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Parses a hex quantity (`"0x1a"`) returned by the node.
pub fn quantity_u256(value: &Value) -> Result<U256, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::internal(format!("Expected hex quantity, got {}", value)))?;
    U256::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| RpcError::internal(format!("Invalid hex quantity: {}", s)))
}

pub fn quantity_u64(value: &Value) -> Result<u64, RpcError> {
    let n = quantity_u256(value)?;
    if n > U256::from(u64::MAX) {
        return Err(RpcError::internal(format!("Quantity out of range: {}", n)));
    }
    Ok(n.as_u64())
}

/// Formats wei as ETH without trailing zeros, e.g. `1.5` or `0.0`.
pub fn format_eth(wei: U256) -> String {
    trim_decimals(format_ether(wei))
}

/// Formats wei as Gwei with two decimals.
pub fn format_gwei(wei: U256) -> String {
    let gwei = format_units(wei, "gwei").unwrap_or_else(|_| "0".to_string());
    let value: f64 = gwei.parse().unwrap_or_default();
    format!("{:.2}", value)
}

fn trim_decimals(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Human-readable name for well-known chain ids.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        1 => "Ethereum Mainnet".to_string(),
        137 => "Polygon".to_string(),
        10 => "Optimism".to_string(),
        42161 => "Arbitrum One".to_string(),
        other => format!("Chain {}", other),
    }
}

/// Renders a JSON value the way tool results are shown to the model.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_ether_compactly() {
        let one_and_half = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_eth(one_and_half), "1.5");
        assert_eq!(format_eth(U256::zero()), "0.0");
    }

    #[test]
    fn formats_gwei_with_two_decimals() {
        assert_eq!(format_gwei(U256::from(12_345_678_900u64)), "12.35");
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(quantity_u64(&json!("0x10")).unwrap(), 16);
        assert!(quantity_u64(&json!(16)).is_err());
        assert!(quantity_u256(&json!("0xzz")).is_err());
    }

    #[test]
    fn names_known_chains() {
        assert_eq!(chain_name(42161), "Arbitrum One");
        assert_eq!(chain_name(8453), "Chain 8453");
    }

    #[test]
    fn required_arg_reports_key() {
        let err = required_arg::<String>(&json!({}), "address").unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid required argument: 'address'");
    }
}
