//! Block references in request params.
//!
//! Clients send block references as tags (`"latest"`), hex quantities (`"0x64"`), decimal
//! strings or bare JSON numbers. Everything that reads a block reference out of params goes
//! through [`BlockRef::from_param`].

use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid block quantity: {0}")]
    InvalidQuantity(String),
    #[error("Unsupported block reference: {0}")]
    Unsupported(String),
}

/// A block named either by number or by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Number(u64),
    Tag(BlockTag),
}

/// Named blocks. Only [`BlockTag::Latest`] can ever be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
}

impl FromStr for BlockRef {
    type Err = ParseError;

    /// ```
    /// use keel_core::utils::block_param::{BlockRef, BlockTag};
    ///
    /// assert_eq!("latest".parse(), Ok(BlockRef::Tag(BlockTag::Latest)));
    /// assert_eq!("0x10".parse(), Ok(BlockRef::Number(16)));
    /// assert_eq!("100".parse(), Ok(BlockRef::Number(100)));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "latest" => BlockTag::Latest,
            "earliest" => BlockTag::Earliest,
            "pending" => BlockTag::Pending,
            "safe" => BlockTag::Safe,
            "finalized" => BlockTag::Finalized,
            quantity => {
                let number = match quantity.strip_prefix("0x").or_else(|| quantity.strip_prefix("0X")) {
                    Some(digits) => u64::from_str_radix(digits, 16),
                    None => quantity.parse(),
                };
                return number
                    .map(Self::Number)
                    .map_err(|_| ParseError::InvalidQuantity(quantity.to_string()));
            }
        };
        Ok(Self::Tag(tag))
    }
}

impl BlockRef {
    /// Reads a block reference from one JSON param: a string as accepted by [`FromStr`], or a
    /// non-negative integer.
    ///
    /// # Errors
    /// Returns [`ParseError`] for malformed strings, negative or fractional numbers, and any
    /// other JSON shape.
    pub fn from_param(value: &Value) -> Result<Self, ParseError> {
        match value {
            Value::String(s) => s.parse(),
            Value::Number(n) => {
                n.as_u64().map(Self::Number).ok_or_else(|| ParseError::InvalidQuantity(n.to_string()))
            }
            other => Err(ParseError::Unsupported(other.to_string())),
        }
    }

    #[must_use]
    pub fn number(self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Tag(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tags() {
        for (raw, tag) in [
            ("latest", BlockTag::Latest),
            ("earliest", BlockTag::Earliest),
            ("pending", BlockTag::Pending),
            ("safe", BlockTag::Safe),
            ("finalized", BlockTag::Finalized),
        ] {
            assert_eq!(raw.parse::<BlockRef>(), Ok(BlockRef::Tag(tag)));
        }
    }

    #[test]
    fn test_quantities() {
        assert_eq!("0x0".parse::<BlockRef>(), Ok(BlockRef::Number(0)));
        assert_eq!("0X3E8".parse::<BlockRef>(), Ok(BlockRef::Number(1000)));
        assert_eq!("1000".parse::<BlockRef>(), Ok(BlockRef::Number(1000)));
        assert!(matches!("0xzz".parse::<BlockRef>(), Err(ParseError::InvalidQuantity(_))));
        assert!("".parse::<BlockRef>().is_err());
        assert!("Latest".parse::<BlockRef>().is_err());
    }

    #[test]
    fn test_param_shapes() {
        assert_eq!(BlockRef::from_param(&json!(150)), Ok(BlockRef::Number(150)));
        assert_eq!(BlockRef::from_param(&json!("0x96")).map(BlockRef::number), Ok(Some(150)));
        assert!(matches!(BlockRef::from_param(&json!(-1)), Err(ParseError::InvalidQuantity(_))));
        assert!(matches!(BlockRef::from_param(&json!(1.5)), Err(ParseError::InvalidQuantity(_))));
        assert!(matches!(BlockRef::from_param(&json!(null)), Err(ParseError::Unsupported(_))));
        assert_eq!(BlockRef::from_param(&json!("pending")).map(BlockRef::number), Ok(None));
    }
}
