//! Core type definitions for JSON-RPC and cached chain data.
//!
//! # Type Categories
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: Protocol conformance
//! - [`CacheStatus`]: Keel-specific extension indicating whether the cache answered
//!
//! ## Method Dispatch
//! - [`RpcMethod`]: The closed set of methods the proxy knows how to serve
//!
//! ## Chain Data
//! - [`LogEntry`]: An event log as returned by `eth_getLogs` and persisted by the synchronizer

use crate::utils::hex::{normalize_hash, parse_quantity};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr, sync::Arc};

/// JSON-RPC protocol version constant to avoid repeated allocations.
/// Use `JSONRPC_VERSION_COW` for constructing requests/responses without allocation.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for JSON-RPC version - zero allocation for static usage.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Every JSON-RPC method keel can serve.
///
/// Which of these a deployment actually exposes is decided by the configured whitelist; a
/// method outside this set can never be whitelisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    ChainId,
    Syncing,
    Call,
    NetVersion,
    GetBlockByNumber,
    GetLogs,
    GetTransactionByHash,
    BlockNumber,
    EstimateGas,
    GetTransactionCount,
    GasPrice,
    SendRawTransaction,
    SendTransaction,
    GetCode,
    GetBalance,
}

impl RpcMethod {
    /// All supported methods, in the order of the default whitelist.
    pub const ALL: [RpcMethod; 15] = [
        Self::ChainId,
        Self::Syncing,
        Self::Call,
        Self::NetVersion,
        Self::GetBlockByNumber,
        Self::GetLogs,
        Self::GetTransactionByHash,
        Self::BlockNumber,
        Self::EstimateGas,
        Self::GetTransactionCount,
        Self::GasPrice,
        Self::SendRawTransaction,
        Self::SendTransaction,
        Self::GetCode,
        Self::GetBalance,
    ];

    /// Returns the wire name of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChainId => "eth_chainId",
            Self::Syncing => "eth_syncing",
            Self::Call => "eth_call",
            Self::NetVersion => "net_version",
            Self::GetBlockByNumber => "eth_getBlockByNumber",
            Self::GetLogs => "eth_getLogs",
            Self::GetTransactionByHash => "eth_getTransactionByHash",
            Self::BlockNumber => "eth_blockNumber",
            Self::EstimateGas => "eth_estimateGas",
            Self::GetTransactionCount => "eth_getTransactionCount",
            Self::GasPrice => "eth_gasPrice",
            Self::SendRawTransaction => "eth_sendRawTransaction",
            Self::SendTransaction => "eth_sendTransaction",
            Self::GetCode => "eth_getCode",
            Self::GetBalance => "eth_getBalance",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not part of [`RpcMethod`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported method: {0}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for RpcMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|method| method.as_str() == s)
            .copied()
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

/// Describes how a request was served.
///
/// # Example
///
/// ```
/// use keel_core::types::CacheStatus;
///
/// assert_eq!(CacheStatus::Full.to_string(), "FULL");
/// assert_eq!(CacheStatus::Miss.to_string(), "MISS");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheStatus {
    /// The whole result came from the local cache; upstream was not contacted.
    Full,
    /// The result was fetched from upstream.
    Miss,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Full => write!(f, "FULL"),
            CacheStatus::Miss => write!(f, "MISS"),
        }
    }
}

/// JSON-RPC 2.0 request structure.
///
/// - `jsonrpc`: Uses `Cow<'static, str>` to avoid allocation when constructing with the static
///   version string "2.0". The value is not checked on deserialization; validation rejects
///   anything other than "2.0".
/// - `id`: Uses `Arc<serde_json::Value>` so it can be echoed into responses cheaply.
///
/// # Example
///
/// ```
/// use keel_core::types::JsonRpcRequest;
/// use serde_json::json;
///
/// let request = JsonRpcRequest::new("eth_blockNumber", None, json!(1));
///
/// assert_eq!(request.method, "eth_blockNumber");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Creates a new JSON-RPC request with zero allocation for the version string.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }

    /// Returns the positional parameters, treating absent params as an empty list.
    ///
    /// Non-array params also yield an empty slice; validation rejects them before this is used.
    #[must_use]
    pub fn positional_params(&self) -> &[serde_json::Value] {
        self.params.as_ref().and_then(serde_json::Value::as_array).map_or(&[], Vec::as_slice)
    }
}

/// JSON-RPC 2.0 response structure.
///
/// A response carries either a `result` or an `error`. `result` is always serialized (a `null`
/// result is meaningful, e.g. an unknown transaction), `error` only when present.
///
/// # Example
///
/// ```
/// use keel_core::types::JsonRpcResponse;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let response = JsonRpcResponse::success(json!("0x1234"), Arc::new(json!(1)));
/// assert!(response.result.is_some());
/// assert!(response.error.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Arc<serde_json::Value>,
    #[serde(skip)]
    pub cache_status: Option<CacheStatus>,
}

impl JsonRpcResponse {
    /// Creates a successful JSON-RPC response.
    #[must_use]
    pub fn success(result: serde_json::Value, id: Arc<serde_json::Value>) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, result: Some(result), error: None, id, cache_status: None }
    }

    /// Creates a response answered from the local cache.
    #[must_use]
    pub fn cached(result: serde_json::Value, id: Arc<serde_json::Value>) -> Self {
        Self { cache_status: Some(CacheStatus::Full), ..Self::success(result, id) }
    }

    /// Creates an error JSON-RPC response.
    #[must_use]
    pub fn error(code: i32, message: String, id: Arc<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION_COW,
            result: None,
            error: Some(JsonRpcError { code, message, data: None }),
            id,
            cache_status: None,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// An event log entry as returned by `eth_getLogs`.
///
/// Quantities stay in their hex wire form so a cached entry serializes back exactly as the
/// upstream node produced it. Field order is fixed, so serialization is deterministic and a
/// rescan overwrites an entry with an identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub transaction_index: Option<String>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

impl LogEntry {
    /// Block number of the entry; `None` for pending logs.
    #[must_use]
    pub fn block(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_quantity)
    }

    /// Position of the log within its block.
    #[must_use]
    pub fn index(&self) -> Option<u64> {
        self.log_index.as_deref().and_then(parse_quantity)
    }

    /// Identity of the entry inside its address's ordered log set: `"<blockNumber>:<logIndex>"`.
    ///
    /// Entries without a log index fall back to the transaction hash so distinct logs of the
    /// same block never collide. Pending entries have no identity.
    #[must_use]
    pub fn member_id(&self) -> Option<String> {
        let block = self.block()?;
        match self.index() {
            Some(index) => Some(format!("{block}:{index}")),
            None => Some(format!(
                "{block}:{}",
                self.transaction_hash.as_deref().map(normalize_hash).unwrap_or_default()
            )),
        }
    }
}
