use crate::{
    entities::order::Model as OrderModel,
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{PaymentIntent, WebhookEvent, EVENT_PAYMENT_FAILED, EVENT_PAYMENT_SUCCEEDED},
    services::{
        checkout::{metadata_keys, MetadataItem},
        notifications::NotificationService,
        orders::{MaterializeOutcome, NewOrder, NewOrderItem, OrderService},
    },
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Terminal states of processing one verified webhook event.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// A success event materialized a new order
    Committed(OrderModel),
    /// A redelivery for an already-materialized payment intent
    AlreadyProcessed(OrderModel),
    /// A failure event; logged, no order produced
    PaymentFailed,
    /// An event type without business effects
    Ignored,
}

/// Order payload decoded from intent metadata plus the intent itself.
#[derive(Debug)]
struct OrderDraft {
    customer_name: String,
    customer_email: String,
    shipping_address: String,
    billing_address: String,
    items: Vec<NewOrderItem>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax_amount: Decimal,
    order_notes: Option<String>,
}

/// Turns verified webhook events into orders.
///
/// Runs per-request with no shared mutable state; correctness under
/// concurrent deliveries for the same intent rests on the store-level
/// unique constraint, not application locking.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: Arc<OrderService>,
    notifications: Arc<NotificationService>,
    event_sender: Arc<EventSender>,
}

impl ReconciliationService {
    pub fn new(
        orders: Arc<OrderService>,
        notifications: Arc<NotificationService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            orders,
            notifications,
            event_sender,
        }
    }

    /// Processes one signature-verified webhook event.
    ///
    /// Errors returned here are internal; the HTTP boundary logs them and
    /// still acknowledges the event, because redelivery cannot fix a
    /// malformed payload or a persistent store failure.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn process_event(
        &self,
        event: WebhookEvent,
    ) -> Result<ReconcileOutcome, ServiceError> {
        match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => self.handle_payment_succeeded(event.data.object).await,
            EVENT_PAYMENT_FAILED => {
                let intent = event.data.object;
                warn!(payment_intent_id = %intent.id, "Payment failed; no order will be created");
                self.event_sender
                    .send_or_log(Event::PaymentFailed {
                        payment_intent_id: intent.id,
                    })
                    .await;
                Ok(ReconcileOutcome::PaymentFailed)
            }
            other => {
                // Never reject an unknown event type; the processor would
                // retry it forever.
                info!(event_type = %other, "Ignoring webhook event without business effects");
                self.event_sender
                    .send_or_log(Event::WebhookIgnored {
                        event_type: other.to_string(),
                    })
                    .await;
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn handle_payment_succeeded(
        &self,
        intent: PaymentIntent,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let draft = decode_intent(&intent)?;

        // The metadata total is never trusted; it is recomputed from the
        // parts plus the tax read off the authorization itself.
        let total = (draft.subtotal + draft.shipping_cost + draft.tax_amount).round_dp(2);

        let outcome = self
            .orders
            .materialize_order(NewOrder {
                customer_name: draft.customer_name,
                customer_email: draft.customer_email,
                shipping_address: draft.shipping_address,
                billing_address: draft.billing_address,
                subtotal: draft.subtotal,
                shipping_cost: draft.shipping_cost,
                tax_amount: draft.tax_amount,
                total,
                payment_intent_id: intent.id.clone(),
                checkout_session_id: intent.session_correlation_id(),
                order_notes: draft.order_notes,
                items: draft.items,
            })
            .await?;

        match outcome {
            MaterializeOutcome::Created(order) => {
                self.event_sender
                    .send_or_log(Event::PaymentSucceeded {
                        payment_intent_id: intent.id,
                    })
                    .await;
                self.dispatch_notifications(&order);
                Ok(ReconcileOutcome::Committed(order))
            }
            MaterializeOutcome::AlreadyExists(order) => {
                Ok(ReconcileOutcome::AlreadyProcessed(order))
            }
        }
    }

    /// Emails are fire-and-forget: spawned off the request, failures logged,
    /// never allowed to block or fail reconciliation.
    fn dispatch_notifications(&self, order: &OrderModel) {
        let notifications = self.notifications.clone();
        let order = order.clone();
        tokio::spawn(async move {
            if let Err(e) = notifications.send_order_confirmation(&order).await {
                error!(error = %e, order_id = %order.id, "Order confirmation email failed");
            }
            if let Err(e) = notifications.send_admin_notification(&order).await {
                error!(error = %e, order_id = %order.id, "Admin notification email failed");
            }
        });
    }
}

/// Decodes the order payload out of an intent's string-only metadata.
///
/// Addresses and items arrive JSON-encoded, monetary fields as decimal
/// strings. Tax comes from the authorization's tax sub-object (minor units,
/// zero when absent, for authorizations created before tax support).
fn decode_intent(intent: &PaymentIntent) -> Result<OrderDraft, ServiceError> {
    let meta = &intent.metadata;

    if let Some(version) = meta.get(metadata_keys::VERSION) {
        if version != crate::payments::METADATA_VERSION {
            return Err(ServiceError::SerializationError(format!(
                "unsupported metadata version {} on intent {}",
                version, intent.id
            )));
        }
    }

    let require = |key: &str| -> Result<&String, ServiceError> {
        meta.get(key).ok_or_else(|| {
            ServiceError::SerializationError(format!(
                "intent {} metadata missing key {}",
                intent.id, key
            ))
        })
    };

    let decimal = |key: &str| -> Result<Decimal, ServiceError> {
        Decimal::from_str(require(key)?).map_err(|e| {
            ServiceError::SerializationError(format!(
                "intent {} metadata key {} is not a decimal: {}",
                intent.id, key, e
            ))
        })
    };

    // Addresses are validated as JSON but stored in their serialized form.
    let shipping_address = require(metadata_keys::SHIPPING_ADDRESS)?.clone();
    let billing_address = require(metadata_keys::BILLING_ADDRESS)?.clone();
    for (key, raw) in [
        (metadata_keys::SHIPPING_ADDRESS, &shipping_address),
        (metadata_keys::BILLING_ADDRESS, &billing_address),
    ] {
        serde_json::from_str::<serde_json::Value>(raw).map_err(|e| {
            ServiceError::SerializationError(format!(
                "intent {} metadata key {} is not valid JSON: {}",
                intent.id, key, e
            ))
        })?;
    }

    let items: Vec<MetadataItem> =
        serde_json::from_str(require(metadata_keys::ITEMS)?).map_err(|e| {
            ServiceError::SerializationError(format!(
                "intent {} metadata items are malformed: {}",
                intent.id, e
            ))
        })?;
    if items.is_empty() {
        return Err(ServiceError::SerializationError(format!(
            "intent {} metadata items are empty",
            intent.id
        )));
    }

    let items = items
        .into_iter()
        .map(|i| NewOrderItem {
            artwork_id: i.artwork_id,
            quantity: i.quantity,
            price_at_purchase: i.price,
        })
        .collect();

    Ok(OrderDraft {
        customer_name: require(metadata_keys::CUSTOMER_NAME)?.clone(),
        customer_email: require(metadata_keys::CUSTOMER_EMAIL)?.clone(),
        shipping_address,
        billing_address,
        items,
        subtotal: decimal(metadata_keys::SUBTOTAL)?,
        shipping_cost: decimal(metadata_keys::SHIPPING_COST)?,
        tax_amount: intent.tax_amount(),
        order_notes: meta.get(metadata_keys::ORDER_NOTES).cloned(),
    })
}
