use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{
        to_minor_units, AutomaticTaxParams, CreateIntentRequest, PaymentProcessor, ShippingParams,
        METADATA_VERSION,
    },
    services::cart_validation::{CartItemInput, CartValidationService},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Metadata keys carried on the processor-side authorization object. The
/// intent's metadata bag is the only durable store between intent creation
/// and webhook delivery, so the full order payload rides on these keys,
/// every value pre-serialized to a string.
pub mod metadata_keys {
    pub const VERSION: &str = "metadata_version";
    pub const CUSTOMER_NAME: &str = "customer_name";
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    pub const SHIPPING_ADDRESS: &str = "shipping_address";
    pub const BILLING_ADDRESS: &str = "billing_address";
    pub const ITEMS: &str = "items";
    pub const SUBTOTAL: &str = "subtotal";
    pub const SHIPPING_COST: &str = "shipping_cost";
    pub const TAX_AMOUNT: &str = "tax_amount";
    pub const TOTAL: &str = "total";
    pub const ORDER_NOTES: &str = "order_notes";
}

/// One purchased line as serialized into intent metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub artwork_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Checkout submission: the cart plus everything the order will need once
/// the webhook lands.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub items: Vec<CartItemInput>,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    #[serde(default)]
    pub order_notes: Option<String>,
}

/// What the storefront needs to hand the customer to the processor's
/// payment page, plus the tax-resolved totals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentIntentOutcome {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub checkout_session_id: String,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Builds tax-aware payment intents from validated carts.
#[derive(Clone)]
pub struct CheckoutService {
    cart_validation: Arc<CartValidationService>,
    processor: Arc<dyn PaymentProcessor>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        cart_validation: Arc<CartValidationService>,
        processor: Arc<dyn PaymentProcessor>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            cart_validation,
            processor,
            event_sender,
            config,
        }
    }

    /// Validates the cart and creates a payment authorization with automatic
    /// tax enabled, the shipping address attached for jurisdiction
    /// resolution, and the order payload embedded as string metadata.
    ///
    /// The returned tax amount is read back from the created intent's tax
    /// sub-object; authorizations without one resolve to zero tax.
    #[instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_payment_intent(
        &self,
        request: CheckoutRequest,
    ) -> Result<PaymentIntentOutcome, ServiceError> {
        let cart = self.cart_validation.validate_cart(&request.items).await?;
        if !cart.is_valid {
            return Err(ServiceError::ValidationError(cart.errors.join("; ")));
        }

        let amount = to_minor_units(cart.subtotal + cart.shipping_cost)?;

        let items: Vec<MetadataItem> = cart
            .items
            .iter()
            .map(|i| MetadataItem {
                artwork_id: i.artwork_id,
                quantity: i.quantity,
                price: i.unit_price,
            })
            .collect();

        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::VERSION.into(), METADATA_VERSION.to_string());
        metadata.insert(
            metadata_keys::CUSTOMER_NAME.into(),
            request.customer_name.clone(),
        );
        metadata.insert(
            metadata_keys::CUSTOMER_EMAIL.into(),
            request.customer_email.clone(),
        );
        metadata.insert(
            metadata_keys::SHIPPING_ADDRESS.into(),
            request.shipping_address.to_string(),
        );
        metadata.insert(
            metadata_keys::BILLING_ADDRESS.into(),
            request.billing_address.to_string(),
        );
        metadata.insert(
            metadata_keys::ITEMS.into(),
            serde_json::to_string(&items)
                .map_err(|e| ServiceError::SerializationError(e.to_string()))?,
        );
        metadata.insert(metadata_keys::SUBTOTAL.into(), cart.subtotal.to_string());
        metadata.insert(
            metadata_keys::SHIPPING_COST.into(),
            cart.shipping_cost.to_string(),
        );
        metadata.insert(
            metadata_keys::TAX_AMOUNT.into(),
            cart.tax_amount.to_string(),
        );
        metadata.insert(metadata_keys::TOTAL.into(), cart.total.to_string());
        if let Some(notes) = &request.order_notes {
            metadata.insert(metadata_keys::ORDER_NOTES.into(), notes.clone());
        }

        let intent = self
            .processor
            .create_payment_intent(CreateIntentRequest {
                amount,
                currency: self.config.checkout.currency.clone(),
                metadata,
                automatic_tax: AutomaticTaxParams { enabled: true },
                shipping: Some(ShippingParams {
                    name: request.customer_name.clone(),
                    address: request.shipping_address.clone(),
                }),
            })
            .await?;

        let tax_amount = intent.tax_amount();
        let total = (cart.subtotal + cart.shipping_cost + tax_amount).round_dp(2);

        self.event_sender
            .send_or_log(Event::PaymentIntentCreated {
                payment_intent_id: intent.id.clone(),
            })
            .await;

        info!(
            payment_intent_id = %intent.id,
            amount_minor = amount,
            %tax_amount,
            "Payment intent created"
        );

        Ok(PaymentIntentOutcome {
            checkout_session_id: intent.session_correlation_id(),
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
            subtotal: cart.subtotal,
            shipping_cost: cart.shipping_cost,
            tax_amount,
            total,
        })
    }
}
