//! Canonical string forms for hashes, addresses and quantities.
//!
//! Every cache key and every whitelist comparison goes through these functions, so two
//! spellings of the same value (`0xABC`, `abc`) always land on the same key.

/// Normalizes a hash or address: strips a `0x`/`0X` prefix, lower-cases, re-adds `0x`.
///
/// ```
/// use keel_core::utils::hex::normalize_hash;
///
/// assert_eq!(normalize_hash("0xABcd"), "0xabcd");
/// assert_eq!(normalize_hash("ABcd"), "0xabcd");
/// ```
#[must_use]
pub fn normalize_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    let body = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")).unwrap_or(trimmed);
    format!("0x{}", body.to_ascii_lowercase())
}

/// Formats a block number as a minimal lower-case hex quantity.
///
/// ```
/// use keel_core::utils::hex::normalize_number;
///
/// assert_eq!(normalize_number(0), "0x0");
/// assert_eq!(normalize_number(2500), "0x9c4");
/// ```
#[must_use]
pub fn normalize_number(number: u64) -> String {
    format!("0x{number:x}")
}

/// Parses a quantity written as `0x`-prefixed hex or plain decimal.
#[must_use]
pub fn parse_quantity(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => u64::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => value.parse().ok(),
    }
}

/// Parses a quantity out of a JSON value: a quantity string or a non-negative integer.
#[must_use]
pub fn quantity_from_json(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => parse_quantity(s),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
