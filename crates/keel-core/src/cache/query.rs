use super::topics::TopicFilter;
use crate::{
    types::RpcMethod,
    utils::{
        block_param::{BlockRef, BlockTag},
        hex::normalize_hash,
    },
};
use serde_json::Value;

/// What a request asks the cache for, decided once per request from its method and params.
///
/// Every variant has exactly one read policy in the
/// [`CacheCoordinator`](super::CacheCoordinator); adding a cacheable method means adding a
/// variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheQuery {
    /// `eth_chainId`, answered from memory.
    ChainId,
    /// `eth_blockNumber`, derived from the in-memory latest header.
    BlockNumber,
    /// `eth_getBlockByNumber("latest", false)`, the in-memory latest header.
    LatestBlock,
    /// `eth_getBlockByNumber(n, full)`, persisted by number and form.
    BlockByNumber { number: u64, full: bool },
    /// `eth_getTransactionByHash(hash)`, persisted by normalized hash.
    TransactionByHash { hash: String },
    /// `eth_getLogs(filter)` over a range the synchronizer may have covered.
    Logs(LogQuery),
    /// Never read from nor written to the cache.
    Uncached,
}

/// One end of a log query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockBound {
    Number(u64),
    Latest,
}

impl BlockBound {
    fn from_json(value: &Value) -> Option<Self> {
        match BlockRef::from_param(value).ok()? {
            BlockRef::Number(n) => Some(Self::Number(n)),
            BlockRef::Tag(BlockTag::Latest) => Some(Self::Latest),
            BlockRef::Tag(_) => None,
        }
    }

    /// Resolves `latest` to the latest known block. Numbers are taken as given.
    #[must_use]
    pub fn resolve(self, latest: u64) -> u64 {
        match self {
            Self::Number(n) => n,
            Self::Latest => latest,
        }
    }
}

/// A cacheable `eth_getLogs` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    /// Normalized, deduplicated, in request order.
    pub addresses: Vec<String>,
    pub from: BlockBound,
    pub to: BlockBound,
    pub topics: TopicFilter,
}

impl LogQuery {
    fn from_filter(filter: &Value) -> Option<Self> {
        let filter = filter.as_object()?;
        if filter.contains_key("blockHash") {
            return None;
        }

        let from = BlockBound::from_json(filter.get("fromBlock")?)?;
        let to = BlockBound::from_json(filter.get("toBlock")?)?;

        let addresses = match filter.get("address")? {
            Value::String(address) => vec![normalize_hash(address)],
            Value::Array(list) => {
                let mut addresses: Vec<String> = Vec::with_capacity(list.len());
                for address in list {
                    let address = normalize_hash(address.as_str()?);
                    if !addresses.contains(&address) {
                        addresses.push(address);
                    }
                }
                addresses
            }
            _ => return None,
        };
        if addresses.is_empty() {
            return None;
        }

        let topics = TopicFilter::from_json(filter.get("topics")).ok()?;
        Some(Self { addresses, from, to, topics })
    }
}

impl CacheQuery {
    /// Classifies a validated request.
    #[must_use]
    pub fn classify(method: RpcMethod, params: &[Value]) -> Self {
        let classified = match method {
            RpcMethod::ChainId => Some(Self::ChainId),
            RpcMethod::BlockNumber => Some(Self::BlockNumber),
            RpcMethod::GetBlockByNumber => Self::block_by_number(params),
            RpcMethod::GetTransactionByHash => params
                .first()
                .and_then(Value::as_str)
                .map(|hash| Self::TransactionByHash { hash: normalize_hash(hash) }),
            RpcMethod::GetLogs => params.first().and_then(LogQuery::from_filter).map(Self::Logs),
            _ => None,
        };
        classified.unwrap_or(Self::Uncached)
    }

    fn block_by_number(params: &[Value]) -> Option<Self> {
        let full = params.get(1).and_then(Value::as_bool).unwrap_or(false);
        match BlockRef::from_param(params.first()?).ok()? {
            BlockRef::Number(number) => Some(Self::BlockByNumber { number, full }),
            // only the shallow form of the latest block is kept in memory
            BlockRef::Tag(BlockTag::Latest) if params.get(1) == Some(&Value::Bool(false)) => {
                Some(Self::LatestBlock)
            }
            BlockRef::Tag(_) => None,
        }
    }

    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::Uncached)
    }
}
