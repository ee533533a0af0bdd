use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use cmdbot_relay::Relay;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    relay: Arc<Relay>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub relay: HealthCheck,
    pub checked_at: String,
}

pub fn router(relay: Arc<Relay>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { relay })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let relay = relay_check(&state.relay).await;
    let ready = relay.status != "degraded";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} webhook accepting callbacks", state.relay.bot_name()),
        },
        relay,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

/// A relay that was never configured is healthy; a configured one must answer.
async fn relay_check(relay: &Relay) -> HealthCheck {
    let Some(channel) = relay.channel() else {
        return HealthCheck { status: "disabled", detail: "no relay channel configured".to_owned() };
    };

    match relay.ping().await {
        Ok(()) => HealthCheck { status: "ready", detail: format!("relay channel `{channel}`") },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("relay channel `{channel}` unreachable: {error}"),
        },
    }
}
