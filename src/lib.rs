//! Atelier Storefront API Library
//!
//! Checkout, payment reconciliation, and order lookup for the Atelier
//! art storefront.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod confirmation;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod payments;
pub mod services;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

// Common response wrapper for admin mutations
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let checkout = Router::new()
        .route(
            "/checkout/cart/validate",
            post(handlers::checkout::validate_cart),
        )
        .route(
            "/checkout/payment-intent",
            post(handlers::checkout::create_payment_intent),
        );

    let payments = Router::new().route(
        "/payments/webhook",
        post(handlers::payment_webhooks::payment_webhook),
    );

    let orders = Router::new()
        .route("/orders/lookup", get(handlers::orders::lookup_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/:id/notes", post(handlers::orders::add_order_note))
        .route(
            "/orders/:id/tracking",
            put(handlers::orders::set_tracking_number),
        );

    Router::new().merge(checkout).merge(payments).merge(orders)
}

/// Builds the complete application router for the given state.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api_v1_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_healthy = db::check_connection(&state.db).await.is_ok();
    Json(json!({
        "status": if db_healthy { "ok" } else { "degraded" },
        "database": if db_healthy { "up" } else { "down" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn openapi_json() -> Json<Value> {
    Json(serde_json::to_value(openapi::ApiDoc::openapi()).unwrap_or_else(|_| json!({})))
}
