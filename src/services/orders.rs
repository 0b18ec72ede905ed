use crate::{
    config::AppConfig,
    db::DbPool,
    entities::{
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus, PaymentStatus},
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Attempts at drawing an unused random order-number suffix before failing.
const ORDER_NUMBER_ATTEMPTS: u32 = 10;

/// Everything needed to materialize an order from a succeeded payment.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub billing_address: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub payment_intent_id: String,
    pub checkout_session_id: String,
    pub order_notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub artwork_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

/// Result of an order materialization attempt.
#[derive(Debug)]
pub enum MaterializeOutcome {
    /// A new order row was committed
    Created(OrderModel),
    /// An order for this payment intent already existed; nothing was written
    AlreadyExists(OrderModel),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Order persistence: materialization, lookups, and admin mutations.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Materializes an order and its line items in one transaction.
    ///
    /// Idempotent per payment intent: a pre-check and the unique constraint
    /// on `payment_intent_id` together guarantee at most one order per
    /// authorization even under concurrent redelivery. A failed item insert
    /// rolls the header back, so no order ever exists with zero items.
    #[instrument(skip(self, new_order), fields(payment_intent_id = %new_order.payment_intent_id))]
    pub async fn materialize_order(
        &self,
        new_order: NewOrder,
    ) -> Result<MaterializeOutcome, ServiceError> {
        if let Some(existing) = self
            .find_by_payment_intent(&new_order.payment_intent_id)
            .await?
        {
            info!(
                order_id = %existing.id,
                "Order already materialized for this payment intent; skipping"
            );
            return Ok(MaterializeOutcome::AlreadyExists(existing));
        }

        let order_id = Uuid::new_v4();
        let order_number = self.generate_order_number().await?;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let header = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_name: Set(new_order.customer_name),
            customer_email: Set(new_order.customer_email),
            shipping_address: Set(new_order.shipping_address),
            billing_address: Set(new_order.billing_address),
            subtotal: Set(new_order.subtotal),
            shipping_cost: Set(new_order.shipping_cost),
            tax_amount: Set(new_order.tax_amount),
            total: Set(new_order.total),
            status: Set(OrderStatus::Paid),
            payment_intent_id: Set(new_order.payment_intent_id.clone()),
            checkout_session_id: Set(new_order.checkout_session_id),
            payment_status: Set(PaymentStatus::Succeeded),
            tracking_number: Set(None),
            admin_notes: Set(new_order.order_notes.map(|n| prefix_note(&n))),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let header = match header.insert(&txn).await {
            Ok(model) => model,
            Err(e) => {
                // A unique violation here means a concurrent delivery won
                // the race; that is a benign no-op, not a failure.
                let _ = txn.rollback().await;
                if let Some(existing) = self
                    .find_by_payment_intent(&new_order.payment_intent_id)
                    .await?
                {
                    warn!(
                        order_id = %existing.id,
                        "Concurrent webhook delivery already materialized this order"
                    );
                    return Ok(MaterializeOutcome::AlreadyExists(existing));
                }
                error!(error = %e, "Failed to insert order header");
                return Err(ServiceError::DatabaseError(e));
            }
        };

        let item_rows: Vec<order_item::ActiveModel> = new_order
            .items
            .into_iter()
            .map(|item| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                artwork_id: Set(item.artwork_id),
                quantity: Set(item.quantity),
                price_at_purchase: Set(item.price_at_purchase),
                line_subtotal: Set(
                    (item.price_at_purchase * Decimal::from(item.quantity)).round_dp(2)
                ),
                created_at: Set(now),
            })
            .collect();

        if let Err(e) = OrderItemEntity::insert_many(item_rows).exec(&txn).await {
            // Rolling back removes the just-inserted header with it.
            error!(error = %e, order_id = %order_id, "Failed to insert order items, rolling back");
            txn.rollback().await?;
            return Err(ServiceError::DatabaseError(e));
        }

        txn.commit().await?;

        info!(order_id = %order_id, order_number = %header.order_number, "Order materialized");

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        Ok(MaterializeOutcome::Created(header))
    }

    /// Finds an order by the idempotency key.
    pub async fn find_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::PaymentIntentId.eq(payment_intent_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Finds an order by the client-held checkout session correlation token.
    pub async fn find_by_checkout_session(
        &self,
        checkout_session_id: &str,
    ) -> Result<Option<OrderWithItems>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::CheckoutSessionId.eq(checkout_session_id))
            .one(&*self.db)
            .await?;

        match order {
            Some(order) => {
                let items = self.items_for(order.id).await?;
                Ok(Some(OrderWithItems { order, items }))
            }
            None => Ok(None),
        }
    }

    /// Retrieves an order with its line items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderWithItems>, ServiceError> {
        let order = OrderEntity::find_by_id(order_id).one(&*self.db).await?;
        match order {
            Some(order) => {
                let items = self.items_for(order.id).await?;
                Ok(Some(OrderWithItems { order, items }))
            }
            None => Ok(None),
        }
    }

    /// Updates the fulfillment status of an order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.require_order(order_id).await?;
        let old_status = order.status;

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status).to_lowercase(),
                new_status: format!("{:?}", new_status).to_lowercase(),
            })
            .await;

        info!(?old_status, ?new_status, "Order status updated");
        Ok(updated)
    }

    /// Appends a timestamp-prefixed entry to the order's admin notes.
    #[instrument(skip(self, note), fields(order_id = %order_id))]
    pub async fn add_admin_note(
        &self,
        order_id: Uuid,
        note: &str,
    ) -> Result<OrderModel, ServiceError> {
        if note.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Note cannot be empty".into()));
        }

        let order = self.require_order(order_id).await?;
        let entry = prefix_note(note.trim());
        let notes = match &order.admin_notes {
            Some(existing) => format!("{}\n{}", existing, entry),
            None => entry,
        };

        let mut active: order::ActiveModel = order.into();
        active.admin_notes = Set(Some(notes));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Sets the tracking number on an order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn set_tracking_number(
        &self,
        order_id: Uuid,
        tracking_number: &str,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.require_order(order_id).await?;

        let mut active: order::ActiveModel = order.into();
        active.tracking_number = Set(Some(tracking_number.to_string()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderTrackingUpdated(order_id))
            .await;

        Ok(updated)
    }

    async fn require_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Generates a globally unique order number `PFX-YYYYMMDD-NNNN` by
    /// drawing random 4-digit suffixes until one is free.
    async fn generate_order_number(&self) -> Result<String, ServiceError> {
        let prefix = &self.config.checkout.order_number_prefix;
        let date = Utc::now().format("%Y%m%d");

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
            let candidate = format!("{}-{}-{:04}", prefix, date, suffix);

            let taken = OrderEntity::find()
                .filter(order::Column::OrderNumber.eq(&candidate))
                .count(&*self.db)
                .await?;
            if taken == 0 {
                return Ok(candidate);
            }
        }

        Err(ServiceError::InternalError(
            "Exhausted order number candidates".to_string(),
        ))
    }
}

/// Formats a note entry as `[RFC3339 timestamp] text`.
fn prefix_note(note: &str) -> String {
    format!("[{}] {}", Utc::now().to_rfc3339(), note)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_entries_are_timestamp_prefixed() {
        let entry = prefix_note("customer asked for gift wrap");
        assert!(entry.starts_with('['));
        assert!(entry.ends_with("] customer asked for gift wrap"));
        let ts = &entry[1..entry.find(']').unwrap()];
        chrono::DateTime::parse_from_rfc3339(ts).expect("timestamp should parse");
    }
}
