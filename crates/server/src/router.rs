use crate::request_log::RequestLog;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use keel_core::{
    metrics::MetricsCollector,
    middleware::ValidationError,
    proxy::{NetworkRegistry, ProxyError},
    types::JsonRpcRequest,
};
use serde_json::json;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::debug;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared by the HTTP and WebSocket surfaces.
#[derive(Debug)]
pub struct AppState {
    pub registry: NetworkRegistry,
    pub metrics: MetricsCollector,
    pub requests: RequestLog,
}

impl AppState {
    #[must_use]
    pub fn new(registry: NetworkRegistry, metrics: MetricsCollector) -> Self {
        Self { registry, metrics, requests: RequestLog::new() }
    }
}

/// HTTP status for a failed request.
#[must_use]
pub fn status_for(error: &ProxyError) -> StatusCode {
    match error {
        ProxyError::UnknownNetwork(_) => StatusCode::NOT_FOUND,
        ProxyError::Validation(ValidationError::InvalidVersion(_)) => StatusCode::BAD_REQUEST,
        ProxyError::Validation(ValidationError::MethodNotAllowed(_)) => StatusCode::METHOD_NOT_ALLOWED,
        ProxyError::Validation(_) => StatusCode::UNAUTHORIZED,
        ProxyError::Upstream(_) | ProxyError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Value of the `Host` header, or the empty string.
pub(crate) fn host(headers: &HeaderMap) -> &str {
    headers.get(header::HOST).and_then(|h| h.to_str().ok()).unwrap_or_default()
}

/// Handles one JSON-RPC request; the network is named by the first label of `Host`.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Parse error: {e}")),
    };
    let method = request.method.clone();

    match state.registry.handle(host(&headers), request).await {
        Ok(response) => {
            state.requests.record(&method);
            let cache_status = response
                .cache_status
                .as_ref()
                .map_or_else(|| "MISS".to_string(), ToString::to_string);
            (StatusCode::OK, [("x-cache-status", cache_status)], Json(response)).into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            debug!(method = %method, status = status.as_u16(), error = %e, "request rejected");
            error_response(status, e.to_string())
        }
    }
}

pub async fn handle_health() -> &'static str {
    "ok"
}

pub async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.get_prometheus_metrics(),
    )
}

pub async fn handle_request_count(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "count": state.requests.count() }))
}

/// `Access-Control-Allow-Origin: *` for `POST, GET, OPTIONS`.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
        ])
}

/// The HTTP surface: `POST /` plus the operational endpoints.
pub fn create_router(state: Arc<AppState>, max_concurrent_requests: usize) -> Router {
    let rpc = Router::new()
        .route("/", post(handle_rpc))
        .with_state(Arc::clone(&state))
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let public = Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/request-count", get(handle_request_count))
        .with_state(state);

    public.merge(rpc).layer(cors_layer())
}
