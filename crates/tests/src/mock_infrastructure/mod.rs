//! Mock Infrastructure for Testing keel
//!
//! Reusable mocks for testing upstream interactions without real network connections.
//!
//! - `RpcMockBuilder`: wraps mockito to provide Ethereum-specific RPC mocking
//! - test helpers for logs, blocks and configuration
//!
//! ```ignore
//! use tests::mock_infrastructure::{create_test_block, RpcMockBuilder};
//!
//! let mut mock = RpcMockBuilder::new().await;
//! mock.mock_chain_id(1).await;
//! mock.mock_latest_block(&create_test_block(2500)).await;
//!
//! // Use mock.url() as the network's upstream_url
//! ```

pub mod rpc_mock;
pub mod test_helpers;

pub use rpc_mock::RpcMockBuilder;
pub use test_helpers::*;
