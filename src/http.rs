use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    client_factory::ClientFactory,
    identity::IdentityResolver,
    mcp::{JsonRpcResponse, McpServer, INTERNAL_ERROR, INVALID_REQUEST, PARSE_ERROR},
    shutdown::shutdown_signal,
};

pub const USER_EMAIL_HEADER: &str = "x-user-email";

#[derive(Clone)]
pub struct AppState {
    pub resolver: IdentityResolver,
    pub factory: Arc<dyn ClientFactory>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(mcp))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn boot_http_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Zendesk MCP server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shut down gracefully");
    Ok(())
}

// Function URL deployment: the same router, driven by the Lambda runtime
// instead of a TCP listener.
#[cfg(feature = "lambda")]
pub async fn run_lambda(state: AppState) -> anyhow::Result<()> {
    info!("Zendesk MCP server running on AWS Lambda");
    lambda_http::run(router(state))
        .await
        .map_err(|err| anyhow::anyhow!(err))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "service": crate::mcp::SERVER_NAME,
    }))
}

async fn mcp(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let identity_hint = headers
        .get(USER_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    // A fresh server per call keeps protocol state from leaking between callers.
    let server = McpServer::new(state.resolver.clone(), Arc::clone(&state.factory));
    let handled =
        tokio::spawn(async move { server.handle_raw(&body, identity_hint.as_deref()).await })
            .await;

    match handled {
        Ok(Some(response)) => {
            let status = match response.error_code() {
                Some(PARSE_ERROR) | Some(INVALID_REQUEST) => StatusCode::BAD_REQUEST,
                _ => StatusCode::OK,
            };
            (status, Json(response)).into_response()
        }
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(err) => {
            error!(error = %err, "MCP request handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(JsonRpcResponse::error(
                    Value::Null,
                    INTERNAL_ERROR,
                    "Internal server error",
                )),
            )
                .into_response()
        }
    }
}
