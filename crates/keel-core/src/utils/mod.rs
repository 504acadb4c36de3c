//! Shared parsing and formatting helpers.
//!
//! ## Hex Normalization (`hex`)
//! - Canonical forms for hashes, addresses and block quantities used in cache keys
//!
//! ## Block Parameter Parsing (`block_param`)
//! - Parsing of "latest", "earliest", hex and decimal block references from request params

pub mod block_param;
pub mod hex;

pub use block_param::{BlockRef, BlockTag, ParseError as BlockParseError};
pub use hex::{normalize_hash, normalize_number, parse_quantity, quantity_from_json};
