//! HTTP surface: the webhook POST and a health probe.

use std::sync::Arc;

use {
    axum::{
        extract::State,
        http::StatusCode,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    },
    tracing::{debug, error},
};

use crate::{
    process::Gateway,
    types::{parse_events, WebhookPayload},
};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(AppState { gateway })
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// One POST per upstream delivery, possibly batching several messages.
///
/// Drop-class failures (malformed senders) still answer 200 so the
/// transport does not redeliver something we will never accept; only
/// retry-class failures surface as 500.
async fn webhook_handler(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> impl IntoResponse {
    let events = parse_events(payload);
    for event in events {
        match state.gateway.process_event(&event).await {
            Ok(outcome) => {
                debug!(message_id = %event.message_id, ?outcome, "event processed");
            },
            Err(err) if err.is_retryable() => {
                error!(
                    message_id = %event.message_id,
                    error = %err,
                    "transient failure, asking transport to redeliver"
                );
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "status": "retry" })),
                );
            },
            Err(err) => {
                debug!(
                    message_id = %event.message_id,
                    error = %err,
                    "dropping event"
                );
            },
        }
    }
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
