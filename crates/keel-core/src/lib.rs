//! # Keel Core
//!
//! Core library for the keel caching reverse proxy for Ethereum JSON-RPC.
//!
//! This crate provides the foundational components for:
//!
//! - **[`cache`]**: The range bound tracker, the topic matcher and the cache coordinator that
//!   decides per method whether a request can be answered locally.
//!
//! - **[`sync`]**: The per-network log synchronizer that backfills and tails event logs for the
//!   configured contracts.
//!
//! - **[`proxy`]**: Per-network request handling ([`proxy::NetworkContext`]) and the registry
//!   that resolves a host name to its network.
//!
//! - **[`upstream`]**: One-shot JSON-RPC dispatch over HTTP or WebSocket and the `newHeads`
//!   subscription that drives the synchronizer.
//!
//! - **[`store`]**: The network-partitioned persistent key space (`SQLite` or in-memory).
//!
//! - **[`middleware`]**: Request validation against the method and address whitelists.
//!
//! - **[`metrics`]**: Prometheus metrics for cache and synchronizer activity.
//!
//! ## Request Flow
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Validation │ ─── Invalid ──► Error Response
//! └──────┬──────┘
//!        │ Valid
//!        ▼
//! ┌──────────────────┐
//! │ CacheCoordinator │ ─── Hit ──► Cached Response
//! └──────┬───────────┘
//!        │ Miss
//!        ▼
//! ┌────────────────────┐
//! │ UpstreamDispatcher │
//! └────────┬───────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Persist (async) │
//! └────────┬────────┘
//!          │
//!          ▼
//!   Response to Client
//! ```
//!
//! Independently, every new chain head announced by the [`upstream::HeadSubscriber`] triggers a
//! [`sync::LogSynchronizer`] pass that extends the scanned range of every configured contract.

pub mod cache;
pub mod chain;
pub mod config;
pub mod metrics;
pub mod middleware;
pub mod proxy;
pub mod store;
pub mod sync;
pub mod types;
pub mod upstream;
pub mod utils;
