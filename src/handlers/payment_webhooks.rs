use crate::{
    payments::{signature, WebhookEvent},
    AppState,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, error, warn};

// POST /api/v1/payments/webhook
//
// Response contract: signature and configuration problems are the only
// non-200 outcomes, because they mean the endpoint itself is broken and
// redelivery after a fix is wanted. Once the signature verifies, the event
// is always acknowledged with 200 `{"received": true}`. Decode and
// persistence failures are logged, never surfaced, since redelivery cannot
// fix them and a non-200 would cause a retry storm.
//
// The body must be the raw, unparsed payload; verification runs over the
// exact bytes the processor signed.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing or invalid signature"),
        (status = 500, description = "Webhook secret not configured")
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let secret = match &state.config.payment.webhook_secret {
        Some(secret) => secret.clone(),
        None => {
            // Deployment error, not a payload error: the endpoint should
            // not be treated as functioning at all.
            error!("Webhook received but no webhook secret is configured");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Webhook not configured" })),
            )
                .into_response();
        }
    };

    let header = match headers
        .get(signature::SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(header) => header,
        None => {
            warn!("Webhook rejected: missing signature header");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing signature" })),
            )
                .into_response();
        }
    };

    if let Err(e) = signature::verify(
        &body,
        header,
        &secret,
        state.config.payment.webhook_tolerance_secs,
    ) {
        warn!(error = %e, "Webhook rejected: signature verification failed");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid signature" })),
        )
            .into_response();
    }

    // From here on the event is authentic and always acknowledged.
    match serde_json::from_slice::<WebhookEvent>(&body) {
        Ok(event) => match state.services.reconciliation.process_event(event).await {
            Ok(outcome) => debug!(?outcome, "Webhook processed"),
            Err(e) => error!(error = %e, "Webhook reconciliation failed; acknowledging anyway"),
        },
        Err(e) => error!(error = %e, "Authentic webhook with unreadable payload; acknowledging"),
    }

    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}
