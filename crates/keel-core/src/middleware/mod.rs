//! Request validation.
//!
//! Every request is checked before any cache or upstream access:
//!
//! ```text
//!   Incoming Request
//!        │
//!        ▼
//!   ┌──────────────────────────┐
//!   │  RequestValidator        │  - JSON-RPC 2.0
//!   │                          │  - method whitelist
//!   │                          │  - params shape
//!   │                          │  - address whitelist
//!   └──────────────────────────┘
//!        │ ValidationError?
//!        ├─> rejected (HTTP 400 / 405 / 401)
//!        ▼
//!   NetworkContext::handle
//! ```
//!
//! A network's address whitelist is its `allowed_addresses` plus its contract addresses.
//! `eth_call` and `eth_estimateGas` pass if either `to` or `from` is whitelisted; `eth_getLogs`
//! requires every filter address to be.

pub mod validation;

pub use validation::{RequestValidator, ValidationError};
