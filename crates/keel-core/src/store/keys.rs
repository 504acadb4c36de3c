//! Key layout of a network partition.
//!
//! | key | value |
//! |---|---|
//! | `tx_<hash>` | serialized transaction |
//! | `block_<number>` / `block_<number>_full` | serialized block, shallow / full transactions |
//! | `logs_<address>_earliest` / `logs_<address>_latest` | hex bound markers |
//! | `log_<address>` | ordered set of serialized logs scored by block number |
//!
//! Hashes and addresses are normalized, numbers are minimal lower-case hex.

use crate::utils::hex::{normalize_hash, normalize_number};

#[must_use]
pub fn transaction(hash: &str) -> String {
    format!("tx_{}", normalize_hash(hash))
}

#[must_use]
pub fn block(number: u64, full: bool) -> String {
    if full {
        format!("block_{}_full", normalize_number(number))
    } else {
        format!("block_{}", normalize_number(number))
    }
}

#[must_use]
pub fn logs_earliest(address: &str) -> String {
    format!("logs_{}_earliest", normalize_hash(address))
}

#[must_use]
pub fn logs_latest(address: &str) -> String {
    format!("logs_{}_latest", normalize_hash(address))
}

#[must_use]
pub fn log_set(address: &str) -> String {
    format!("log_{}", normalize_hash(address))
}
