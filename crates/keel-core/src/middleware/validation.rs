use crate::{
    config::NetworkConfig,
    types::{JsonRpcRequest, RpcMethod},
    utils::hex::normalize_hash,
};
use serde_json::Value;
use std::collections::HashSet;

/// Errors that occur during JSON-RPC request validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// JSON-RPC version is not "2.0".
    #[error("jsonrpc version 2.0 required")]
    InvalidVersion(String),

    /// Method is unsupported or not in the network's whitelist.
    #[error("Method {0} is not allowed")]
    MethodNotAllowed(String),

    #[error("Invalid params argument")]
    InvalidParams,

    /// Neither side of a call object is whitelisted.
    #[error("Neither {to} or {from} are whitelisted for {method}")]
    CallNotWhitelisted { method: &'static str, to: String, from: String },

    #[error("Address {address} is not whitelisted for {method}")]
    AddressNotWhitelisted { method: &'static str, address: String },
}

/// Checks requests against one network's method and address whitelists before any cache or
/// upstream access.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    methods: HashSet<RpcMethod>,
    addresses: HashSet<String>,
}

impl RequestValidator {
    /// `addresses` are normalized on construction.
    #[must_use]
    pub fn new<I, S>(methods: HashSet<RpcMethod>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            methods,
            addresses: addresses.into_iter().map(|a| normalize_hash(a.as_ref())).collect(),
        }
    }

    /// Validator for `network`: its allowed addresses plus its contract addresses.
    #[must_use]
    pub fn for_network(methods: HashSet<RpcMethod>, network: &NetworkConfig) -> Self {
        Self { methods, addresses: network.address_whitelist() }
    }

    /// Validates a request and returns the method it resolves to.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidVersion`] if not JSON-RPC 2.0
    /// - [`ValidationError::MethodNotAllowed`] if the method is unsupported or not whitelisted
    /// - [`ValidationError::InvalidParams`] if `params` is present and not an array
    /// - [`ValidationError::CallNotWhitelisted`] / [`ValidationError::AddressNotWhitelisted`]
    ///   if the addresses a call or log filter touches are not whitelisted
    pub fn validate(&self, request: &JsonRpcRequest) -> Result<RpcMethod, ValidationError> {
        if request.jsonrpc != "2.0" {
            return Err(ValidationError::InvalidVersion(request.jsonrpc.to_string()));
        }

        let method = request
            .method
            .parse::<RpcMethod>()
            .ok()
            .filter(|m| self.methods.contains(m))
            .ok_or_else(|| ValidationError::MethodNotAllowed(request.method.clone()))?;

        if request.params.as_ref().is_some_and(|p| !p.is_array()) {
            return Err(ValidationError::InvalidParams);
        }

        let first = request.positional_params().first();
        match method {
            RpcMethod::Call | RpcMethod::EstimateGas => self.check_call(method, first)?,
            RpcMethod::GetLogs => self.check_log_filter(method, first)?,
            _ => {}
        }

        Ok(method)
    }

    fn is_allowed(&self, address: Option<&str>) -> bool {
        address.is_some_and(|a| self.addresses.contains(&normalize_hash(a)))
    }

    fn check_call(&self, method: RpcMethod, call: Option<&Value>) -> Result<(), ValidationError> {
        let call = call.and_then(Value::as_object).ok_or(ValidationError::InvalidParams)?;
        let to = call.get("to").and_then(Value::as_str);
        let from = call.get("from").and_then(Value::as_str);

        if self.is_allowed(to) || self.is_allowed(from) {
            return Ok(());
        }
        Err(ValidationError::CallNotWhitelisted {
            method: method.as_str(),
            to: to.unwrap_or("null").to_string(),
            from: from.unwrap_or("null").to_string(),
        })
    }

    fn check_log_filter(&self, method: RpcMethod, filter: Option<&Value>) -> Result<(), ValidationError> {
        let filter = filter.and_then(Value::as_object).ok_or(ValidationError::InvalidParams)?;
        let rejected = |address: &Value| ValidationError::AddressNotWhitelisted {
            method: method.as_str(),
            address: address.as_str().map_or_else(|| address.to_string(), str::to_string),
        };

        match filter.get("address") {
            Some(Value::Array(addresses)) => {
                match addresses.iter().find(|a| !self.is_allowed(a.as_str())) {
                    Some(address) => Err(rejected(address)),
                    None => Ok(()),
                }
            }
            Some(address) if self.is_allowed(address.as_str()) => Ok(()),
            Some(address) => Err(rejected(address)),
            None => Err(rejected(&Value::Null)),
        }
    }
}
