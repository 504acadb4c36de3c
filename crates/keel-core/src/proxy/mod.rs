//! Per-network request handling.
//!
//! # Request Processing Flow
//!
//! ```text
//! Client Request (Host: <network>.…)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ NetworkRegistry │ ─── unknown ──► ProxyError::UnknownNetwork
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ RequestValidator│ ─── invalid ──► ProxyError::Validation
//! └────────┬────────┘
//!          ▼
//! ┌──────────────────┐
//! │ CacheCoordinator │ ─── hit ──► cached response
//! └────────┬─────────┘
//!          │ miss
//!          ▼
//! ┌────────────────────┐
//! │ UpstreamDispatcher │ ──► upstream response, persisted in the background
//! └────────────────────┘
//! ```
//!
//! | Method | Cache read | Cache write |
//! |--------|------------|-------------|
//! | `eth_chainId` | chain id resolved at startup | - |
//! | `eth_blockNumber` | published latest block | - |
//! | `eth_getBlockByNumber("latest", false)` | published latest block | - |
//! | `eth_getBlockByNumber(n, full)` | `block_<n>[_full]` | after upstream |
//! | `eth_getTransactionByHash` | `tx_<hash>` | after upstream |
//! | `eth_getLogs` | synchronized log sets, if fully covered | - |
//! | others | - | - |

pub mod context;
pub mod errors;
pub mod registry;

pub use context::NetworkContext;
pub use errors::ProxyError;
pub use registry::NetworkRegistry;
