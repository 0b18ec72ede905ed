use crate::{
    config::AppConfig,
    db::DbPool,
    entities::{artwork, Artwork},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Client-supplied cart line. Untrusted: every field except the id and
/// quantity is re-derived from the catalog before money moves.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemInput {
    pub artwork_id: Uuid,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub slug: String,
}

/// A cart line that survived validation, re-priced from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidatedCartItem {
    pub artwork_id: Uuid,
    pub title: String,
    pub slug: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_subtotal: Decimal,
}

/// Result of validating a cart against live inventory and pricing.
/// Invariants: `total == subtotal + shipping_cost + tax_amount` to the cent,
/// and `is_valid == errors.is_empty()`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidatedCart {
    pub is_valid: bool,
    pub items: Vec<ValidatedCartItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub errors: Vec<String>,
}

/// Validates client carts against the catalog: authoritative pricing,
/// availability, and publication state.
#[derive(Clone)]
pub struct CartValidationService {
    db: Arc<DbPool>,
    config: Arc<AppConfig>,
}

impl CartValidationService {
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Re-derives the cart from the catalog. Tampered prices, unpublished
    /// works, and over-inventory quantities accumulate as user-facing
    /// errors and exclude the line; only store failures are `Err`.
    ///
    /// Tax is deferred to the payment step and always zero here.
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn validate_cart(
        &self,
        items: &[CartItemInput],
    ) -> Result<ValidatedCart, ServiceError> {
        // An empty cart is invalid before any catalog lookup happens.
        if items.is_empty() {
            return Ok(ValidatedCart {
                is_valid: false,
                items: vec![],
                subtotal: Decimal::ZERO,
                shipping_cost: Decimal::ZERO,
                tax_amount: Decimal::ZERO,
                total: Decimal::ZERO,
                errors: vec!["Cart is empty".to_string()],
            });
        }

        let ids: Vec<Uuid> = items.iter().map(|i| i.artwork_id).collect();
        let records: HashMap<Uuid, artwork::Model> = Artwork::find()
            .filter(artwork::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut errors = Vec::new();
        let mut validated = Vec::new();

        for item in items {
            let record = match records.get(&item.artwork_id) {
                Some(r) => r,
                None => {
                    errors.push(format!("\"{}\" is no longer available", item.title));
                    continue;
                }
            };

            if !record.is_published {
                errors.push(format!("\"{}\" is no longer available", record.title));
                continue;
            }

            if item.quantity < 1 {
                errors.push(format!("Invalid quantity for \"{}\"", record.title));
                continue;
            }

            // Compare as decimals, not strings: "50.00" and "50.0000" are
            // the same price.
            if item.unit_price != record.price {
                errors.push(format!(
                    "The price of \"{}\" has changed, please refresh your cart",
                    record.title
                ));
                continue;
            }

            if item.quantity > record.inventory_count {
                errors.push(format!(
                    "Only {} of \"{}\" available",
                    record.inventory_count, record.title
                ));
                continue;
            }

            let line_subtotal = (record.price * Decimal::from(item.quantity)).round_dp(2);
            validated.push(ValidatedCartItem {
                artwork_id: record.id,
                title: record.title.clone(),
                slug: record.slug.clone(),
                unit_price: record.price,
                quantity: item.quantity,
                line_subtotal,
            });
        }

        // Subtotal comes strictly from validated lines at catalog prices;
        // the client's arithmetic is never consulted.
        let subtotal: Decimal = validated
            .iter()
            .map(|i| i.line_subtotal)
            .sum::<Decimal>()
            .round_dp(2);
        let shipping_cost = self.config.checkout.shipping_flat_fee;
        let tax_amount = Decimal::ZERO;
        let total = (subtotal + shipping_cost + tax_amount).round_dp(2);

        let is_valid = errors.is_empty();
        if !is_valid {
            info!(error_count = errors.len(), "Cart failed validation");
        }

        Ok(ValidatedCart {
            is_valid,
            items: validated,
            subtotal,
            shipping_cost,
            tax_amount,
            total,
            errors,
        })
    }
}
