use crate::{
    errors::ServiceError,
    services::{
        cart_validation::{CartItemInput, ValidatedCart},
        checkout::{CheckoutRequest, PaymentIntentOutcome},
    },
    AppState,
};
use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCartRequest {
    pub items: Vec<CartItemInput>,
}

// POST /api/v1/checkout/cart/validate
//
// Validation failures are data, not errors: a tampered or stale cart comes
// back 200 with `is_valid: false` and user-facing error strings.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/cart/validate",
    request_body = ValidateCartRequest,
    responses(
        (status = 200, description = "Cart re-derived from the catalog", body = ValidatedCart),
        (status = 500, description = "Catalog store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn validate_cart(
    State(state): State<AppState>,
    Json(request): Json<ValidateCartRequest>,
) -> Result<Json<ValidatedCart>, ServiceError> {
    let cart = state
        .services
        .cart_validation
        .validate_cart(&request.items)
        .await?;
    Ok(Json(cart))
}

// POST /api/v1/checkout/payment-intent
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payment-intent",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment intent created with tax resolved", body = PaymentIntentOutcome),
        (status = 400, description = "Cart failed validation", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment processor error", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<PaymentIntentOutcome>, ServiceError> {
    let outcome = state.services.checkout.create_payment_intent(request).await?;
    Ok(Json(outcome))
}
