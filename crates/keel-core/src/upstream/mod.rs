//! Communication with a network's upstream node.
//!
//! - [`UpstreamDispatcher`]: one JSON-RPC call over HTTP (`POST`) or a streaming socket (connect,
//!   send, await one message, close; bounded by [`SOCKET_CALL_TIMEOUT`])
//! - [`HeadSubscriber`]: `newHeads` subscription, or `eth_blockNumber` polling when the network
//!   has no socket endpoint
//!
//! Nothing here retries. Failures are surfaced as [`UpstreamError`] and never touch the cache.

pub mod dispatcher;
pub mod endpoint;
pub mod errors;
pub mod http_client;
pub mod subscription;
pub mod websocket;

pub use dispatcher::UpstreamDispatcher;
pub use endpoint::Endpoint;
pub use errors::UpstreamError;
pub use http_client::HttpClient;
pub use subscription::{HeadListener, HeadSource, HeadSubscriber};
pub use websocket::SOCKET_CALL_TIMEOUT;
