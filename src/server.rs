//! Webhook HTTP server.
//!
//! Three endpoints: `GET /health` for probes, `GET /webhooks` for the
//! gateway's verification handshake, and `POST /webhooks` for deliveries.
//! Deliveries are acknowledged immediately and processed in the background;
//! the intake claim makes the gateway's retries harmless.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use giro_core::config::WhatsAppConfig;
use giro_channels::payload::{self, WebhookPayload};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::journey::Journey;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct AppState {
    pub journey: Arc<Journey>,
    pub whatsapp: WhatsAppConfig,
    pub started: Instant,
}

/// Query parameters of the gateway's verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// `GET /health` — liveness probe.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

/// `GET /webhooks` — echo the challenge when the verify token matches.
async fn verify(
    Query(params): Query<VerifyParams>,
    State(state): State<AppState>,
) -> Result<String, StatusCode> {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.whatsapp.verify_token.as_str())
        && !state.whatsapp.verify_token.is_empty();

    if mode_ok && token_ok {
        info!("webhook verification handshake accepted");
        return Ok(params.challenge.unwrap_or_default());
    }
    warn!("webhook verification rejected");
    Err(StatusCode::FORBIDDEN)
}

/// `POST /webhooks` — accept a delivery and process its messages.
///
/// Always answers 200: the gateway redelivers on anything else, and a
/// payload we cannot use now will not improve on the third try.
async fn receive(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let payload: WebhookPayload = match serde_json::from_value(body) {
        Ok(p) => p,
        Err(e) => {
            warn!("unparseable webhook payload: {e}");
            return Json(json!({ "status": "ignored" }));
        }
    };

    let messages = payload::extract_messages(&payload, &state.whatsapp);
    for msg in messages {
        let journey = state.journey.clone();
        tokio::spawn(async move {
            journey.handle_message(msg).await;
        });
    }

    Json(json!({ "status": "received" }))
}

/// Build the webhook router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks", get(verify).post(receive))
        .with_state(state)
}
