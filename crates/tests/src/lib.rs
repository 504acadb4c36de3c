//! Integration Tests for keel
//!
//! Each module drives a fully connected network against a mockito upstream:
//!
//! - `sync_tests`: initial scan, tail advance and cache coverage of `eth_getLogs`
//! - `head_tests`: new-head handling, from sync through latest-block publication
//! - `http_tests`: requests through the HTTP router, host routing and status codes
//! - `websocket_tests`: requests through the WebSocket reply path
//! - `mock_infrastructure`: reusable upstream mocks and fixtures
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```

pub mod mock_infrastructure;

#[cfg(test)]
mod head_tests;
#[cfg(test)]
mod http_tests;
#[cfg(test)]
mod sync_tests;
#[cfg(test)]
mod websocket_tests;
