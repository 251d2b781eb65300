//! HTTP endpoints
//!
//! - `GET /health`: liveness for load balancers
//! - `POST /hooks/:hook_id`: external event notification turned into a
//!   correlated bulk edit of every message tagged with the event id

use super::config::HooksConfig;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use switchboard_channels::WebhookContext;
use switchboard_core::{EventEdit, MessageEngine, RemoteMessenger, RequestContext};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state of the HTTP endpoints
#[derive(Clone)]
pub struct HookState {
    pub engine: Arc<MessageEngine>,
    pub remote: Arc<dyn RemoteMessenger>,
    pub bot_id: i64,
    pub hooks: HooksConfig,
}

/// Body of a hook call
#[derive(Debug, Deserialize)]
pub struct HookRequest {
    pub event_id: String,
    #[serde(flatten)]
    pub edit: EventEdit,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Constant-time comparison of the SHA-256 digests
fn secret_matches(provided: Option<&str>, secret: &str) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(secret.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_hook(
    State(state): State<HookState>,
    Path(hook_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let hook = WebhookContext::new(hook_id, headers, body);

    let Some(secret) = state.hooks.secret.as_deref() else {
        warn!(hook_id = %hook.hook_id(), "Hook called but no secret is configured");
        return error(StatusCode::FORBIDDEN, "hooks are disabled");
    };
    if !secret_matches(hook.header(&state.hooks.secret_header), secret) {
        warn!(hook_id = %hook.hook_id(), request_id = %hook.request_id(), "Hook secret mismatch");
        return error(StatusCode::UNAUTHORIZED, "invalid hook secret");
    }

    let request: HookRequest = match hook.json() {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let ctx = RequestContext::new("hooks", state.bot_id, state.remote.clone());
    info!(
        parent: ctx.span(),
        hook_id = %hook.hook_id(),
        hook_request_id = %hook.request_id(),
        event_id = %request.event_id,
        "Hook received"
    );

    match state
        .engine
        .edit_all_with_event_id(&ctx, state.bot_id, &request.event_id, &request.edit)
        .await
    {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!(parent: ctx.span(), error = %e, "Hook edit failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Router with all endpoints
pub fn router(state: HookState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/hooks/:hook_id", post(handle_hook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
