//! Read-through cache of one network.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    CacheCoordinator                      │
//! │  (classifies the request, reads or persists per method)  │
//! └──────────────────────────────────────────────────────────┘
//!        │                     │                     │
//! ┌──────▼────────┐   ┌────────▼─────────┐   ┌───────▼───────┐
//! │   ChainHead   │   │ RangeBoundTracker│   │  TopicFilter  │
//! │ chain id,     │   │ per-address      │   │ positional    │
//! │ latest block  │   │ scanned range    │   │ topic match   │
//! └───────────────┘   └────────┬─────────┘   └───────────────┘
//!                              │
//!                     ┌────────▼─────────┐
//!                     │ PartitionedStore │
//!                     └──────────────────┘
//! ```
//!
//! # Log coverage
//!
//! A cached `eth_getLogs` answer is only trusted when every queried address has been scanned
//! over the whole (clamped) range. Partially covered queries are misses; a subset of the logs
//! would be silently wrong.

pub mod bounds;
pub mod coordinator;
pub mod query;
pub mod topics;

pub use bounds::{AddressBounds, RangeBoundTracker};
pub use coordinator::CacheCoordinator;
pub use query::{BlockBound, CacheQuery, LogQuery};
pub use topics::{InvalidTopics, TopicFilter};
