use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use cmdbot_viber::{parse_event, verify_signature, Acknowledgement, Dispatcher, SIGNATURE_HEADER};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::health;

/// Webhook callback route plus `/health`.
pub fn router(dispatcher: Dispatcher) -> Router {
    let relay = dispatcher.context().relay.clone();
    Router::new()
        .route("/", post(callback))
        .with_state(dispatcher)
        .merge(health::router(relay))
}

pub async fn spawn(bind_address: &str, port: u16, dispatcher: Dispatcher) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.webhook.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "webhook endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(dispatcher)).await {
            error!(
                event_name = "system.webhook.error",
                correlation_id = "bootstrap",
                error = %error,
                "webhook server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Verifies and decodes one Viber callback, then hands it to the dispatcher.
/// Command jobs keep running after the response is sent.
pub async fn callback(
    State(dispatcher): State<Dispatcher>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    debug!(event_name = "ingress.webhook.received", bytes = body.len(), "received callback");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let token = dispatcher.context().viber.authentication_token.expose_secret();
    if !verify_signature(&body, signature, token) {
        warn!(event_name = "ingress.webhook.bad_signature", "rejecting unsigned callback");
        return StatusCode::FORBIDDEN;
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(parse_error) => {
            warn!(
                event_name = "ingress.webhook.undecodable",
                error = %parse_error,
                "rejecting undecodable callback"
            );
            return StatusCode::BAD_REQUEST;
        }
    };

    match dispatcher.handle(event).await.acknowledgement {
        Acknowledgement::Ok => StatusCode::OK,
        Acknowledgement::Forbidden => StatusCode::FORBIDDEN,
    }
}
