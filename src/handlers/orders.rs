use crate::{
    entities::order::{Model as OrderModel, OrderStatus},
    errors::ServiceError,
    services::orders::OrderWithItems,
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub session_id: String,
}

// GET /api/v1/orders/lookup?session_id=...
//
// Three-way contract for the confirmation-page poller: 200 with the order,
// 404 while the webhook is still in flight, 500 only for store failures.
// The poller treats 404 as "retry" and anything else non-200 as terminal,
// so the distinction must stay exact.
#[utoipa::path(
    get,
    path = "/api/v1/orders/lookup",
    params(("session_id" = String, Query, description = "Checkout session correlation token")),
    responses(
        (status = 200, description = "Order found"),
        (status = 404, description = "No order for this session yet"),
        (status = 500, description = "Order store unavailable")
    ),
    tag = "Orders"
)]
pub async fn lookup_order(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Response {
    match state
        .services
        .orders
        .find_by_checkout_session(&query.session_id)
        .await
    {
        Ok(Some(order)) => (StatusCode::OK, Json(json!({ "order": order }))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Order lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to look up order" })),
            )
                .into_response()
        }
    }
}

// GET /api/v1/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with line items"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderWithItems>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// PUT /api/v1/orders/:id/status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Unknown status value", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let status = OrderStatus::from_str(&request.status)
        .map_err(|_| ServiceError::InvalidInput(format!("Unknown status '{}'", request.status)))?;

    let order = state.services.orders.update_status(id, status).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddNoteRequest {
    pub note: String,
}

// POST /api/v1/orders/:id/notes
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/notes",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AddNoteRequest,
    responses(
        (status = 200, description = "Note appended"),
        (status = 400, description = "Empty note", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn add_order_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddNoteRequest>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let order = state.services.orders.add_admin_note(id, &request.note).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetTrackingRequest {
    pub tracking_number: String,
}

// PUT /api/v1/orders/:id/tracking
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/tracking",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = SetTrackingRequest,
    responses(
        (status = 200, description = "Tracking number set"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn set_tracking_number(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetTrackingRequest>,
) -> Result<Json<ApiResponse<OrderModel>>, ServiceError> {
    let order = state
        .services
        .orders
        .set_tracking_number(id, &request.tracking_number)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
