//! HTTP and WebSocket front end of keel.
//!
//! - [`router`]: `POST /` JSON-RPC, `/health`, `/metrics`, `/request-count`
//! - [`ws`]: one JSON-RPC request per WebSocket text message
//! - [`request_log`]: rolling 24 hour count of served requests

pub mod request_log;
pub mod router;
pub mod ws;
