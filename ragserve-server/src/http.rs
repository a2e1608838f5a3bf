//! MCP-over-HTTP transport.
//!
//! `POST /mcp` carries `{tool, arguments}` with credentials in headers.
//! Health endpoints are unauthenticated. The REST facade for browser clients
//! lives outside this crate and proxies the same dispatcher.

use crate::dispatcher::Dispatcher;
use crate::middleware::AuthMaterial;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ragserve_core::RagError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state behind the router
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Wire shape of one tool call
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Build the axum router for the MCP endpoint and health routes
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_call))
        .route("/health", get(health))
        .route("/health/ready", get(health_ready))
        .route("/health/{service}", get(health_service))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn material_from_headers(headers: &HeaderMap) -> AuthMaterial {
    let bearer_token = header_string(headers, "authorization")
        .and_then(|v| v.strip_prefix("Bearer ").map(ToString::to_string));
    let tenant_header =
        header_string(headers, "x-tenant-id").and_then(|v| v.parse().ok());
    AuthMaterial {
        api_key: header_string(headers, "x-api-key"),
        bearer_token,
        tenant_header,
        session_id: header_string(headers, "x-session-id"),
        ip_address: header_string(headers, "x-forwarded-for")
            .map(|v| v.split(',').next().unwrap_or_default().trim().to_string()),
    }
}

fn error_response(err: &RagError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::to_value(err.envelope()).unwrap_or(Value::Null))).into_response()
}

async fn mcp_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<McpRequest>,
) -> Response {
    let material = material_from_headers(&headers);
    match state
        .dispatcher
        .dispatch(&request.tool, request.arguments, material)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn health() -> Response {
    (StatusCode::OK, Json(json!({ "status": "healthy" }))).into_response()
}

async fn health_ready(State(state): State<AppState>) -> Response {
    let ready = !state.dispatcher.registry().is_empty();
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    };
    (status, Json(json!({ "status": label }))).into_response()
}

async fn health_service(Path(service): Path<String>) -> Response {
    const KNOWN: &[&str] = &["postgresql", "faiss", "minio", "meilisearch", "cache"];
    if KNOWN.contains(&service.as_str()) {
        (
            StatusCode::OK,
            Json(json!({ "service": service, "status": "healthy" })),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "service": service, "status": "unknown" })),
        )
            .into_response()
    }
}
